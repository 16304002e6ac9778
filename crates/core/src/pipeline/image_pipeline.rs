use std::sync::Arc;

use crate::anonymizing::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::JPEG_QUALITY;
use crate::video::infrastructure::image_codec::{decode_image, encode_jpeg};

use super::pipeline_error::PipelineError;

/// Single-image pipeline: decode → locate → anonymize → encode JPEG.
///
/// Holds no per-call state, so one instance serves every job.
#[derive(Clone)]
pub struct ImagePipeline {
    detector: Arc<dyn FaceDetector>,
    anonymizer: Arc<dyn FrameAnonymizer>,
}

impl ImagePipeline {
    pub fn new(detector: Arc<dyn FaceDetector>, anonymizer: Arc<dyn FrameAnonymizer>) -> Self {
        Self {
            detector,
            anonymizer,
        }
    }

    /// Returns the anonymized image as JPEG bytes.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, PipelineError> {
        let mut frame = decode_image(bytes).map_err(|e| PipelineError::Decode(e.to_string()))?;

        let boxes = self
            .detector
            .detect(&frame, 1.0)
            .map_err(|e| PipelineError::Execution(format!("face detection: {e}")))?;
        log::debug!(
            "{} face(s) in {}x{} image",
            boxes.len(),
            frame.width(),
            frame.height()
        );

        self.anonymizer
            .apply(&mut frame, &boxes)
            .map_err(|e| PipelineError::Execution(format!("anonymize: {e}")))?;

        encode_jpeg(&frame, JPEG_QUALITY).map_err(|e| PipelineError::Execution(e.to_string()))
    }
}
