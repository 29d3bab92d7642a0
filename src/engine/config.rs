use std::path::{Path, PathBuf};

use crate::{
    foundation::error::{WarpError, WarpResult},
    mls::solver::SolverConfig,
    region::anchors::AnchorStrategy,
};

/// Largest accepted `|intensity|`.
pub const MAX_INTENSITY: f64 = 10.0;

/// Whether all groups share one warp region or each group is warped on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionMode {
    /// One region covering every group; a single solve per frame.
    #[default]
    Combined,
    /// One region and solve per group, applied in group order.
    PerGroup,
}

/// Region and boundary-anchor settings.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Pixels added around the control points on each side.
    pub pad: u32,
    /// Identity anchors laid along each region border.
    pub anchors: AnchorStrategy,
    /// Combined or per-group regions.
    pub mode: RegionMode,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            pad: 18,
            anchors: AnchorStrategy::default(),
            mode: RegionMode::Combined,
        }
    }
}

/// Engine configuration, fixed for the lifetime of a [`DeformEngine`](crate::DeformEngine).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rule file to load at construction.
    pub rules_path: Option<PathBuf>,
    /// Detector model path, handed to the landmark source by
    /// [`DeformEngine::prepare_source`](crate::DeformEngine::prepare_source). The engine never opens it.
    pub model_path: Option<PathBuf>,
    /// Deformation strength; negative values invert the effect.
    pub intensity: f64,
    /// Report [`FrameOutcome::Drop`](crate::FrameOutcome::Drop) when no face is found.
    pub drop_when_no_face: bool,
    /// Keep control groups in the frame report for a host-drawn overlay.
    pub debug_overlay: bool,
    /// Same as `debug_overlay`, for hosts that only draw landmark dots.
    pub show_landmarks: bool,
    /// Make rule-file problems fatal at construction.
    pub strict_rules: bool,
    /// Hand timestamp 0 to the landmark source instead of the frame timestamp.
    pub ignore_timestamps: bool,
    /// Log a per-frame summary every N frames; 0 disables it.
    pub log_every: u32,
    /// Warp region and anchor settings.
    pub region: RegionConfig,
    /// Rigid MLS solver settings.
    pub solver: SolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            model_path: None,
            intensity: 1.0,
            drop_when_no_face: false,
            debug_overlay: false,
            show_landmarks: false,
            strict_rules: false,
            ignore_timestamps: false,
            log_every: 60,
            region: RegionConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate value ranges.
    pub fn validate(&self) -> WarpResult<()> {
        if !self.intensity.is_finite() || self.intensity.abs() > MAX_INTENSITY {
            return Err(WarpError::validation(format!(
                "intensity must be finite and within +/-{MAX_INTENSITY}"
            )));
        }
        if let AnchorStrategy::Ring { step: Some(0) } = self.region.anchors {
            return Err(WarpError::validation("ring anchor step must be > 0"));
        }
        self.solver.validate()
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> WarpResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WarpError::Other(
                anyhow::Error::new(e).context(format!("read config '{}'", path.display())),
            )
        })?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| WarpError::validation(format!("config json parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `true` when control groups should be kept for an overlay.
    pub fn wants_overlay(&self) -> bool {
        self.debug_overlay || self.show_landmarks
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/config.rs"]
mod tests;
