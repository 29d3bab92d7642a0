use crate::{
    engine::config::{EngineConfig, RegionMode},
    foundation::{
        core::{Point, to_local},
        error::{WarpError, WarpResult},
    },
    landmarks::source::LandmarkSource,
    mls::{
        diagnostics::{NoDiagnostics, WarpDiagnostics},
        solver::{DisplacementField, RigidMls},
    },
    region::{
        anchors::add_identity_anchors,
        roi::{Region, min_side_for_grid, region_for},
    },
    render::{
        composite::{composite, extract_into},
        frame::{FrameMut, Patch, PixelFormat},
        resample::resample_into,
    },
    rules::{
        groups::{ControlGroup, build_groups, total_pairs},
        store::RuleSet,
    },
};

/// Why a frame was left unmodified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No rule file was loaded, or it held no valid rules.
    NoRules,
    /// The landmark source found no face.
    NoFace,
    /// The landmark source returned an error.
    DetectorFailed,
    /// No rule could be evaluated against the landmark array.
    TopologyMismatch,
    /// Every warp region was empty after clamping to the frame.
    RegionOutOfBounds,
}

/// Summary of a warped frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct FrameReport {
    /// Control groups in frame coordinates. Filled only when an overlay was
    /// requested in the config; drawing is up to the host.
    pub groups: Vec<ControlGroup>,
    /// Regions that were solved and written back, in processing order.
    pub regions: Vec<Region>,
    /// Rule-driven control pairs, anchors excluded.
    pub control_points: usize,
}

/// Result of processing one frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOutcome {
    /// The frame was deformed in place.
    Warped(FrameReport),
    /// The frame was left untouched.
    PassThrough(SkipReason),
    /// No face was found and the config asks the host to drop the frame.
    Drop,
}

impl FrameOutcome {
    /// `true` if the frame was deformed.
    pub fn is_warped(&self) -> bool {
        matches!(self, Self::Warped(_))
    }

    /// Report of a warped frame.
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            Self::Warped(r) => Some(r),
            _ => None,
        }
    }
}

/// Per-frame deformation engine.
///
/// Holds the rule set, solver settings and scratch buffers; everything derived
/// from a frame's landmarks lives only for that frame. One engine serves one
/// stream of frames on one thread.
pub struct DeformEngine {
    config: EngineConfig,
    rules: Option<RuleSet>,
    solver: RigidMls,
    diagnostics: Box<dyn WarpDiagnostics>,
    field: DisplacementField,
    original: Patch,
    warped: Patch,
    src: Vec<Point>,
    dst: Vec<Point>,
    frames: u64,
}

impl std::fmt::Debug for DeformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeformEngine")
            .field("config", &self.config)
            .field("rules", &self.rules.as_ref().map(RuleSet::len))
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl DeformEngine {
    /// Validate `config` and load its rule file.
    ///
    /// Without `strict_rules`, a missing, unreadable or empty rule file is logged
    /// and the engine passes every frame through.
    pub fn new(config: EngineConfig, diagnostics: Box<dyn WarpDiagnostics>) -> WarpResult<Self> {
        config.validate()?;
        let rules = match &config.rules_path {
            None => {
                tracing::info!("no rule file configured; running without deformation");
                None
            }
            Some(path) => match RuleSet::load(path) {
                Ok(set) if set.is_empty() => {
                    if config.strict_rules {
                        return Err(WarpError::RuleFileUnparseable(path.clone()));
                    }
                    tracing::warn!(path = %path.display(), "rule file has no valid rules; running without deformation");
                    Some(set)
                }
                Ok(set) => Some(set),
                Err(err) if config.strict_rules => return Err(err),
                Err(err) => {
                    tracing::warn!(error = %err, "running without deformation");
                    None
                }
            },
        };
        Ok(Self::assemble(config, rules, diagnostics))
    }

    /// Engine over an in-memory rule set; `rules_path` is ignored.
    pub fn with_rules(
        config: EngineConfig,
        rules: RuleSet,
        diagnostics: Box<dyn WarpDiagnostics>,
    ) -> WarpResult<Self> {
        config.validate()?;
        if config.strict_rules && rules.is_empty() {
            return Err(WarpError::validation("rule set has no valid rules"));
        }
        Ok(Self::assemble(config, Some(rules), diagnostics))
    }

    /// [`DeformEngine::with_rules`] without diagnostics.
    pub fn from_rules(config: EngineConfig, rules: RuleSet) -> WarpResult<Self> {
        Self::with_rules(config, rules, Box::new(NoDiagnostics))
    }

    fn assemble(
        config: EngineConfig,
        rules: Option<RuleSet>,
        diagnostics: Box<dyn WarpDiagnostics>,
    ) -> Self {
        Self {
            solver: RigidMls::new(config.solver),
            config,
            rules,
            diagnostics,
            field: DisplacementField::default(),
            original: Patch::new(0, 0, PixelFormat::Rgba8),
            warped: Patch::new(0, 0, PixelFormat::Rgba8),
            src: Vec::new(),
            dst: Vec::new(),
            frames: 0,
        }
    }

    /// Validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loaded rules, if any.
    pub fn rules(&self) -> Option<&RuleSet> {
        self.rules.as_ref()
    }

    /// Frames seen so far through either entry point.
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Hand the configured `model_path`, if any, to `source`.
    ///
    /// Call once before the first [`DeformEngine::process_frame`]. Model load
    /// failures are returned as-is.
    pub fn prepare_source(&self, source: &mut dyn LandmarkSource) -> WarpResult<()> {
        if let Some(path) = &self.config.model_path {
            tracing::info!(model = %path.display(), "loading landmark model");
            source.load_model(path)?;
        }
        Ok(())
    }

    /// Detect landmarks on `frame` with `source` and deform it in place.
    ///
    /// Only the first face is used. Detector errors are logged and the frame
    /// passes through; they are not returned.
    #[tracing::instrument(level = "trace", skip_all, fields(ts = timestamp_us))]
    pub fn process_frame(
        &mut self,
        frame: &mut FrameMut<'_>,
        timestamp_us: i64,
        source: &mut dyn LandmarkSource,
    ) -> WarpResult<FrameOutcome> {
        self.frames += 1;
        let ts = if self.config.ignore_timestamps {
            0
        } else {
            timestamp_us
        };
        let faces = match source.detect(&frame.as_view(), ts) {
            Ok(faces) => faces,
            Err(err) => {
                tracing::warn!(frame = self.frames, error = %err, "landmark detection failed");
                return Ok(FrameOutcome::PassThrough(SkipReason::DetectorFailed));
            }
        };
        let Some(face) = faces.first() else {
            if self.should_log() {
                tracing::debug!(frame = self.frames, "no face detected");
            }
            return Ok(if self.config.drop_when_no_face {
                FrameOutcome::Drop
            } else {
                FrameOutcome::PassThrough(SkipReason::NoFace)
            });
        };
        let landmarks = face.to_pixels(frame.width(), frame.height());
        self.deform(frame, &landmarks)
    }

    /// Deform `frame` in place given landmarks already in pixel coordinates.
    #[tracing::instrument(level = "trace", skip_all, fields(landmarks = landmarks.len()))]
    pub fn process_landmarks(
        &mut self,
        frame: &mut FrameMut<'_>,
        landmarks: &[Point],
    ) -> WarpResult<FrameOutcome> {
        self.frames += 1;
        self.deform(frame, landmarks)
    }

    fn deform(&mut self, frame: &mut FrameMut<'_>, landmarks: &[Point]) -> WarpResult<FrameOutcome> {
        let log = self.should_log();
        let groups = match self.rules.as_ref() {
            Some(rules) if !rules.is_empty() => {
                let groups = build_groups(rules, landmarks, self.config.intensity);
                if groups.is_empty() {
                    tracing::warn!(
                        frame = self.frames,
                        landmarks = landmarks.len(),
                        max_rule_index = rules.max_landmark_index(),
                        "rule file does not match landmark topology; frame passed through"
                    );
                    return Ok(FrameOutcome::PassThrough(SkipReason::TopologyMismatch));
                }
                groups
            }
            _ => return Ok(FrameOutcome::PassThrough(SkipReason::NoRules)),
        };

        let mut regions = Vec::new();
        match self.config.region.mode {
            RegionMode::Combined => {
                regions.extend(self.warp_region(frame, &groups)?);
            }
            RegionMode::PerGroup => {
                for group in &groups {
                    regions.extend(self.warp_region(frame, std::slice::from_ref(group))?);
                }
            }
        }
        if regions.is_empty() {
            tracing::debug!(frame = self.frames, "warp region empty after clamping");
            return Ok(FrameOutcome::PassThrough(SkipReason::RegionOutOfBounds));
        }

        let control_points = total_pairs(&groups);
        if log {
            tracing::info!(
                frame = self.frames,
                groups = groups.len(),
                control_points,
                regions = regions.len(),
                "warped frame"
            );
        }
        Ok(FrameOutcome::Warped(FrameReport {
            groups: if self.config.wants_overlay() {
                groups
            } else {
                Vec::new()
            },
            regions,
            control_points,
        }))
    }

    /// Solve and apply one warp covering `groups`. Returns the region written,
    /// or `None` when it clamps away to nothing.
    fn warp_region(
        &mut self,
        frame: &mut FrameMut<'_>,
        groups: &[ControlGroup],
    ) -> WarpResult<Option<Region>> {
        let grid = self.config.solver.grid_size;
        let Some(region) = region_for(
            groups,
            frame.width(),
            frame.height(),
            self.config.region.pad,
            min_side_for_grid(grid),
        ) else {
            return Ok(None);
        };

        self.src.clear();
        self.dst.clear();
        for pair in groups.iter().flat_map(|g| &g.pairs) {
            self.src.push(to_local(pair.source, region.x, region.y));
            self.dst.push(to_local(pair.destination, region.x, region.y));
        }
        add_identity_anchors(
            &region,
            &mut self.src,
            &mut self.dst,
            self.config.region.anchors,
            grid,
            0,
        );
        self.diagnostics.on_controls(&region, &self.src, &self.dst);

        self.solver.solve_into(
            &self.src,
            &self.dst,
            region.width,
            region.height,
            &mut self.field,
        )?;
        self.diagnostics.on_field(&self.field);
        if self.field.is_identity() {
            return Ok(Some(region));
        }

        extract_into(&frame.as_view(), &region, &mut self.original)?;
        resample_into(&self.original, &self.field, &mut self.warped)?;
        self.diagnostics.on_patch(&region, &self.original, &self.warped);
        composite(frame, &self.warped, &region)?;
        Ok(Some(region))
    }

    fn should_log(&self) -> bool {
        log_due(self.frames, self.config.log_every)
    }
}

/// `true` on frames `1, 1 + every, 1 + 2 * every, ...`; never when `every == 0`.
pub(crate) fn log_due(frame: u64, every: u32) -> bool {
    every != 0 && frame > 0 && (frame - 1) % u64::from(every) == 0
}

#[cfg(test)]
#[path = "../../tests/unit/engine/pipeline.rs"]
mod tests;
