use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Domain interface for destructively obscuring face boxes within a frame.
///
/// Implementations modify the frame in place and leave it untouched when
/// `boxes` is empty. They are shared across jobs, so they hold no per-call state.
pub trait FrameAnonymizer: Send + Sync {
    fn apply(&self, frame: &mut Frame, boxes: &[BoundingBox])
        -> Result<(), Box<dyn std::error::Error>>;
}
