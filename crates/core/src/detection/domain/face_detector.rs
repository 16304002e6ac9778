use crate::shared::bounding_box::DetectionSet;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Detectors are built once per pipeline and shared by reference across
/// jobs, hence `&self`. Per-stream state such as result caching lives in
/// wrappers like `SkipFrameDetector`.
pub trait FaceDetector: Send + Sync {
    /// `scale` in (0, 1) searches a downscaled copy; boxes are always
    /// returned in `frame` coordinates.
    fn detect(&self, frame: &Frame, scale: f64) -> Result<DetectionSet, Box<dyn std::error::Error>>;
}
