//! Deformation rule files.
//!
//! A rule file is UTF-8 text with one rule per line:
//!
//! ```text
//! # group, controlled, t0, t1, t2, a, b, c
//! 0, 61, 61, 40, 37, 0.6, 0.2, 0.2
//! 1; 291; 291; 270; 267; 0.6; 0.2; 0.2   # ';' works as a separator too
//! ```
//!
//! Everything after `#` is a comment. Blank lines and lines that do not parse into
//! exactly eight fields are skipped; a malformed line never aborts the load.

use std::path::Path;

use crate::foundation::error::{WarpError, WarpResult};

/// Number of fields in a rule line.
pub const RULE_FIELDS: usize = 8;

/// One deformation rule.
///
/// The landmark at `controlled` is pulled toward
/// `weights[0]·L[anchors[0]] + weights[1]·L[anchors[1]] + weights[2]·L[anchors[2]]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rule {
    /// Warp group the rule belongs to.
    pub group: i32,
    /// Landmark index that moves.
    pub controlled: i32,
    /// Landmark indices of the target triangle.
    pub anchors: [i32; 3],
    /// Weights of the target combination (not normalized).
    pub weights: [f64; 3],
}

/// Ordered, immutable collection of rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
    skipped_lines: usize,
}

impl RuleSet {
    /// Build a rule set from already-parsed rules.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            skipped_lines: 0,
        }
    }

    /// Parse rule text. Never fails: unparseable lines are counted and skipped.
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        let mut skipped_lines = 0usize;
        for (lineno, raw) in text.lines().enumerate() {
            let line = strip_line(raw);
            if line.is_empty() {
                continue;
            }
            match parse_rule_line(line) {
                Some(rule) => rules.push(rule),
                None => {
                    skipped_lines += 1;
                    tracing::debug!(line = lineno + 1, "skipping malformed rule line");
                }
            }
        }
        Self {
            rules,
            skipped_lines,
        }
    }

    /// Load and parse a rule file.
    ///
    /// A file with zero valid rules is returned as an empty set, not an error.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> WarpResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                WarpError::RuleFileNotFound(path.to_path_buf())
            } else {
                WarpError::RuleFileUnreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let set = Self::parse(&text);
        tracing::info!(
            rules = set.len(),
            skipped = set.skipped_lines,
            groups = set.group_ids().len(),
            "loaded rule file"
        );
        Ok(set)
    }

    /// Rules in file order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Iterate rules in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Number of valid rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// `true` when no valid rule was loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Non-blank, non-comment lines that failed to parse.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Distinct group ids, ascending.
    pub fn group_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.rules.iter().map(|r| r.group).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Largest landmark index referenced by any rule, if any.
    pub fn max_landmark_index(&self) -> Option<i32> {
        self.rules
            .iter()
            .flat_map(|r| std::iter::once(r.controlled).chain(r.anchors))
            .max()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn strip_line(raw: &str) -> &str {
    let line = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    line.trim_matches(|c: char| c.is_whitespace() || c == '\r')
}

/// Parse one comment-free, trimmed line into a [`Rule`].
///
/// Fields are separated by `,` or `;`. A single trailing separator is tolerated.
pub fn parse_rule_line(line: &str) -> Option<Rule> {
    let mut fields: Vec<&str> = line.split([',', ';']).map(str::trim).collect();
    if fields.len() == RULE_FIELDS + 1 && fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    if fields.len() != RULE_FIELDS {
        return None;
    }

    let int = |s: &str| s.parse::<i32>().ok();
    let float = |s: &str| s.parse::<f64>().ok().filter(|v| v.is_finite());

    Some(Rule {
        group: int(fields[0])?,
        controlled: int(fields[1])?,
        anchors: [int(fields[2])?, int(fields[3])?, int(fields[4])?],
        weights: [float(fields[5])?, float(fields[6])?, float(fields[7])?],
    })
}

#[cfg(test)]
#[path = "../../tests/unit/rules/store.rs"]
mod tests;
