use std::path::PathBuf;

/// Convenience result type used across facewarp.
pub type WarpResult<T> = Result<T, WarpError>;

/// Errors surfaced by the deformation engine.
///
/// Only load-time and contract failures are errors. Conditions that occur on the
/// per-frame path (no face, topology mismatch, degenerate controls, empty region)
/// are reported through [`FrameOutcome`](crate::FrameOutcome) instead.
#[derive(thiserror::Error, Debug)]
pub enum WarpError {
    /// The rule file does not exist.
    #[error("rule file not found: {}", .0.display())]
    RuleFileNotFound(PathBuf),

    /// The rule file exists but could not be read.
    #[error("rule file unreadable: {}", .path.display())]
    RuleFileUnreadable {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The rule file contained no valid rule (only raised under strict validation).
    #[error("rule file has no valid rules: {}", .0.display())]
    RuleFileUnparseable(PathBuf),

    /// Invalid configuration or caller-provided data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Frame buffer geometry or layout violates the buffer contract.
    #[error("frame error: {0}")]
    Frame(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WarpError {
    /// Build a [`WarpError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`WarpError::Frame`] value.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::Frame(msg.into())
    }

    /// `true` for failures that happen while loading the rule file.
    pub fn is_rule_load_error(&self) -> bool {
        matches!(
            self,
            Self::RuleFileNotFound(_) | Self::RuleFileUnreadable { .. } | Self::RuleFileUnparseable(_)
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
