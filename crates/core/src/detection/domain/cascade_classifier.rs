use crate::shared::bounding_box::BoundingBox;

use super::gray_image::GrayImage;

/// Multi-scale search parameters for one cascade pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Pyramid step between successive window sizes (> 1).
    pub scale_factor: f64,
    /// Raw hits a cluster needs before it counts as a detection.
    pub min_neighbors: u32,
    /// Smallest window edge, in pixels of the searched image.
    pub min_size: u32,
}

impl DetectParams {
    /// Fewer, more confident hits.
    pub const STRICT: DetectParams = DetectParams {
        scale_factor: 1.1,
        min_neighbors: 5,
        min_size: 30,
    };

    /// Finer pyramid and looser grouping for small or partial faces.
    pub const LOOSE: DetectParams = DetectParams {
        scale_factor: 1.05,
        min_neighbors: 3,
        min_size: 24,
    };
}

/// A trained sliding-window detector run over a grayscale image.
///
/// Implementations hold immutable model data so one instance can be shared
/// across threads and jobs.
pub trait CascadeClassifier: Send + Sync {
    fn detect_multi_scale(&self, image: &GrayImage, params: &DetectParams) -> Vec<BoundingBox>;
}
