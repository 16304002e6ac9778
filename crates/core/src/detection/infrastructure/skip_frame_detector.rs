use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::DetectionSet;
use crate::shared::frame::Frame;

/// Per-stream decorator that runs detection every N frames and reuses the
/// most recent result in between.
///
/// Holds mutable stream state, so each video gets its own instance while the
/// wrapped detector is shared.
pub struct SkipFrameDetector<'a> {
    inner: &'a dyn FaceDetector,
    skip_interval: usize,
    scale: f64,
    frame_count: usize,
    last_boxes: DetectionSet,
}

impl<'a> SkipFrameDetector<'a> {
    pub fn new(
        inner: &'a dyn FaceDetector,
        skip_interval: usize,
        scale: f64,
    ) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            inner,
            skip_interval,
            scale,
            frame_count: 0,
            last_boxes: Vec::new(),
        })
    }

    /// Frames seen so far, counting both detected and reused ones.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn detect(&mut self, frame: &Frame) -> Result<DetectionSet, Box<dyn std::error::Error>> {
        if self.frame_count % self.skip_interval == 0 {
            self.last_boxes = self.inner.detect(frame, self.scale)?;
        }
        self.frame_count += 1;
        Ok(self.last_boxes.clone())
    }
}
