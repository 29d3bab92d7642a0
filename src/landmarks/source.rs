use std::path::Path;

use crate::{
    foundation::{
        core::Point,
        error::{WarpError, WarpResult},
    },
    render::frame::FrameView,
};

/// One detector landmark in normalized image coordinates (`[0, 1]` on both axes).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormalizedLandmark {
    /// Horizontal position, `0` at the left edge.
    pub x: f64,
    /// Vertical position, `0` at the top edge.
    pub y: f64,
    /// Relative depth; unused by the 2-D warp.
    #[serde(default)]
    pub z: f64,
}

/// Landmarks of one detected face, in detector order.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Face {
    /// Landmarks in detector index order; rule indices point into this.
    pub landmarks: Vec<NormalizedLandmark>,
}

impl Face {
    /// Landmarks scaled to a `width x height` frame.
    pub fn to_pixels(&self, width: u32, height: u32) -> Vec<Point> {
        let (w, h) = (f64::from(width), f64::from(height));
        self.landmarks
            .iter()
            .map(|lm| Point::new(lm.x * w, lm.y * h))
            .collect()
    }

    /// Number of landmarks.
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// `true` if the face has no landmarks.
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

/// Face landmark detector driven by the engine once per frame.
///
/// Implementations wrap whatever model runtime the host uses. Returning an empty
/// list means no face was found; an `Err` is logged by the engine and the frame
/// passes through untouched.
pub trait LandmarkSource {
    /// Faces found on `frame`, most prominent first.
    fn detect(&mut self, frame: &FrameView<'_>, timestamp_us: i64) -> WarpResult<Vec<Face>>;

    /// Load the detector model at `path`.
    ///
    /// Called through [`DeformEngine::prepare_source`](crate::DeformEngine::prepare_source)
    /// when the config names a model. Sources without a model ignore it.
    fn load_model(&mut self, path: &Path) -> WarpResult<()> {
        let _ = path;
        Ok(())
    }
}

/// Source that reports the same faces for every frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StaticLandmarks {
    /// Faces returned on every call.
    pub faces: Vec<Face>,
}

impl StaticLandmarks {
    /// Source over `faces`.
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    /// Parse `{"faces": [[{"x": .., "y": .., "z": ..}, ...], ...]}`.
    pub fn from_json_str(s: &str) -> WarpResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| WarpError::validation(format!("landmark json parse: {e}")))
    }

    /// Read and parse a landmark JSON file.
    pub fn from_json_file(path: &Path) -> WarpResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WarpError::Other(anyhow::Error::new(e).context(format!(
                "read landmarks '{}'",
                path.display()
            )))
        })?;
        Self::from_json_str(&text)
    }
}

impl LandmarkSource for StaticLandmarks {
    fn detect(&mut self, _frame: &FrameView<'_>, _timestamp_us: i64) -> WarpResult<Vec<Face>> {
        Ok(self.faces.clone())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/landmarks/source.rs"]
mod tests;
