use std::collections::BTreeMap;

use crate::{
    foundation::core::{Point, is_finite_point, weighted_sum},
    rules::store::{Rule, RuleSet},
};

/// A `(source, destination)` control-point pair in frame pixel coordinates.
///
/// `source` is where the landmark is now, `destination` is where its pixels
/// should end up.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlPair {
    /// Current landmark position.
    pub source: Point,
    /// Intensity-scaled target position.
    pub destination: Point,
}

impl ControlPair {
    /// A pair whose destination equals its source.
    pub fn identity(p: Point) -> Self {
        Self {
            source: p,
            destination: p,
        }
    }

    /// `true` when the pair does not move anything.
    pub fn is_identity(&self) -> bool {
        self.source == self.destination
    }
}

/// Non-empty set of control pairs sharing one rule group.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlGroup {
    /// Sequential id after compaction (0, 1, 2, ...).
    pub id: usize,
    /// Group id as written in the rule file.
    pub rule_group: i32,
    /// Control pairs in rule order. Never empty.
    pub pairs: Vec<ControlPair>,
}

impl ControlGroup {
    /// Source positions in pair order.
    pub fn sources(&self) -> impl Iterator<Item = Point> + '_ {
        self.pairs.iter().map(|p| p.source)
    }

    /// Destination positions in pair order.
    pub fn destinations(&self) -> impl Iterator<Item = Point> + '_ {
        self.pairs.iter().map(|p| p.destination)
    }

    /// Every source and destination position.
    pub fn all_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.pairs
            .iter()
            .flat_map(|p| [p.source, p.destination])
    }
}

/// Total number of control pairs across groups.
pub fn total_pairs(groups: &[ControlGroup]) -> usize {
    groups.iter().map(|g| g.pairs.len()).sum()
}

/// Evaluate `rules` against one frame's landmarks (pixel coordinates).
///
/// Rules referencing an index outside `landmarks` are skipped, which covers a rule
/// file authored for a different landmark topology. `intensity` scales the move:
/// `destination = source + intensity * (target - source)`; `0` yields identity
/// pairs, negative values push away from the target.
///
/// Groups left empty are dropped and the rest renumbered in ascending rule-group
/// order. An empty result means nothing matched the landmark topology.
pub fn build_groups(rules: &RuleSet, landmarks: &[Point], intensity: f64) -> Vec<ControlGroup> {
    let mut by_group: BTreeMap<i32, Vec<ControlPair>> = BTreeMap::new();
    let mut skipped = 0usize;

    for rule in rules {
        match evaluate_rule(rule, landmarks, intensity) {
            Some(pair) => by_group.entry(rule.group).or_default().push(pair),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::trace!(
            skipped,
            landmarks = landmarks.len(),
            "rules skipped for out-of-range landmark indices"
        );
    }

    by_group
        .into_iter()
        .filter(|(_, pairs)| !pairs.is_empty())
        .enumerate()
        .map(|(id, (rule_group, pairs))| ControlGroup {
            id,
            rule_group,
            pairs,
        })
        .collect()
}

/// Evaluate a single rule, or `None` if it references a missing landmark.
pub fn evaluate_rule(rule: &Rule, landmarks: &[Point], intensity: f64) -> Option<ControlPair> {
    let current = landmark(landmarks, rule.controlled)?;
    let tri = [
        landmark(landmarks, rule.anchors[0])?,
        landmark(landmarks, rule.anchors[1])?,
        landmark(landmarks, rule.anchors[2])?,
    ];
    let target = weighted_sum(&tri, &rule.weights);
    let destination = current + (target - current) * intensity;
    if !is_finite_point(current) || !is_finite_point(destination) {
        return None;
    }
    Some(ControlPair {
        source: current,
        destination,
    })
}

fn landmark(landmarks: &[Point], idx: i32) -> Option<Point> {
    usize::try_from(idx)
        .ok()
        .and_then(|i| landmarks.get(i))
        .copied()
}

#[cfg(test)]
#[path = "../../tests/unit/rules/groups.rs"]
mod tests;
