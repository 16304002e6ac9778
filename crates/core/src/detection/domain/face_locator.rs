use std::sync::Arc;

use thiserror::Error;

use crate::shared::bounding_box::{BoundingBox, DetectionSet};
use crate::shared::constants::MERGE_OVERLAP_THRESHOLD;
use crate::shared::frame::Frame;

use super::box_merger::merge_overlapping;
use super::cascade_classifier::{CascadeClassifier, DetectParams};
use super::face_detector::FaceDetector;
use super::gray_image::GrayImage;

const PASS_PARAMS: [DetectParams; 2] = [DetectParams::STRICT, DetectParams::LOOSE];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocateError {
    #[error("cannot decode an empty {width}x{height} frame")]
    EmptyFrame { width: u32, height: u32 },
}

/// Multi-pass cascade face search.
///
/// Every cascade runs over the grayscale frame and its histogram-equalised
/// copy with both parameter sets. The profile cascade additionally runs
/// over mirrored copies (it is trained on one facing direction) and its
/// hits are mirrored back. Everything is pooled and merged greedily.
#[derive(Clone)]
pub struct FaceLocator {
    frontal: Arc<dyn CascadeClassifier>,
    frontal_alt: Arc<dyn CascadeClassifier>,
    profile: Arc<dyn CascadeClassifier>,
}

impl FaceLocator {
    pub fn new(
        frontal: Arc<dyn CascadeClassifier>,
        frontal_alt: Arc<dyn CascadeClassifier>,
        profile: Arc<dyn CascadeClassifier>,
    ) -> Self {
        Self {
            frontal,
            frontal_alt,
            profile,
        }
    }

    pub fn locate(&self, frame: &Frame, scale: f64) -> Result<DetectionSet, LocateError> {
        if frame.is_empty() {
            return Err(LocateError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let full = GrayImage::from_frame(frame);
        let (gray, factor) = downscale_for_search(full, scale);
        let equalized = gray.equalized();
        let width = gray.width() as i32;

        let mut pooled: Vec<BoundingBox> = Vec::new();
        for view in [&gray, &equalized] {
            for cascade in [&self.frontal, &self.frontal_alt, &self.profile] {
                for params in &PASS_PARAMS {
                    pooled.extend(cascade.detect_multi_scale(view, params));
                }
            }
        }

        for view in [gray.flipped_horizontal(), equalized.flipped_horizontal()] {
            pooled.extend(
                self.profile
                    .detect_multi_scale(&view, &DetectParams::LOOSE)
                    .into_iter()
                    .map(|b| b.mirrored(width)),
            );
        }

        if factor != 1.0 {
            pooled = pooled.into_iter().map(|b| b.scaled(1.0 / factor)).collect();
        }

        Ok(merge_overlapping(&pooled, MERGE_OVERLAP_THRESHOLD))
    }
}

impl FaceDetector for FaceLocator {
    fn detect(&self, frame: &Frame, scale: f64) -> Result<DetectionSet, Box<dyn std::error::Error>> {
        Ok(self.locate(frame, scale)?)
    }
}

/// Returns the search image and the factor it was scaled by.
///
/// Scales outside (0, 1) mean full resolution.
fn downscale_for_search(gray: GrayImage, scale: f64) -> (GrayImage, f64) {
    if !(scale > 0.0 && scale < 1.0) {
        return (gray, 1.0);
    }
    let width = ((gray.width() as f64 * scale) as u32).max(1);
    let height = ((gray.height() as f64 * scale) as u32).max(1);
    (gray.resized(width, height), scale)
}
