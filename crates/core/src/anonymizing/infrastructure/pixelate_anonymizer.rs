use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::anonymizing::domain::frame_anonymizer::FrameAnonymizer;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::raster::{self, RoiRect};

/// Fraction of the box size added on every side before pixelating.
pub const PADDING_FRACTION: f64 = 0.2;
const MIN_BLOCK: usize = 12;
const BLOCK_DIVISOR: usize = 8;
/// Weight of the pixelated patch when blending with its blurred copy.
const SHARP_WEIGHT: f32 = 0.6;
/// Ellipse semi-axes as fractions of the padded box width and height.
const ELLIPSE_AXES: (f64, f64) = (0.48, 0.58);

/// Block-pixelation compositor with an elliptical mask.
///
/// Each padded box is averaged down to a coarse grid and blown back up with
/// nearest-neighbour sampling. With `soften` the blocks are blended with a
/// Gaussian-blurred copy to take the edge off the grid. Only pixels inside
/// the ellipse inscribed in the padded box are replaced, so the box corners
/// keep their original content.
pub struct PixelateAnonymizer {
    soften: bool,
}

impl PixelateAnonymizer {
    pub fn new(soften: bool) -> Self {
        Self { soften }
    }

    /// `None` when `roi` is not a packed RGB region of `w`x`h`.
    fn pixelate(&self, roi: Vec<u8>, w: usize, h: usize) -> Option<Vec<u8>> {
        let block = block_size(w, h);
        let grid_w = (w / block).max(1) as u32;
        let grid_h = (h / block).max(1) as u32;
        let region = RgbImage::from_raw(w as u32, h as u32, roi)?;
        let small = imageops::resize(&region, grid_w, grid_h, FilterType::Triangle);
        let mut patch =
            imageops::resize(&small, w as u32, h as u32, FilterType::Nearest).into_raw();

        if self.soften {
            let kernel = raster::gaussian_kernel_1d(block | 1);
            let mut soft = patch.clone();
            raster::separable_gaussian_blur(&mut soft, w, h, 3, &kernel, &mut Vec::new());
            raster::blend_into(&mut patch, &soft, SHARP_WEIGHT);
        }
        Some(patch)
    }
}

impl Default for PixelateAnonymizer {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Pixel edge of one pixelation block; larger regions get coarser blocks.
pub fn block_size(width: usize, height: usize) -> usize {
    (width.min(height) / BLOCK_DIVISOR).max(MIN_BLOCK)
}

impl FrameAnonymizer for PixelateAnonymizer {
    fn apply(
        &self,
        frame: &mut Frame,
        boxes: &[BoundingBox],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (fw, fh) = (frame.width(), frame.height());
        let channels = frame.channels() as usize;

        for b in boxes {
            let padded = b.padded(PADDING_FRACTION);
            let Some(visible) = padded.clamped(fw, fh) else {
                continue;
            };
            let rect = RoiRect {
                x: visible.x as usize,
                y: visible.y as usize,
                w: visible.width as usize,
                h: visible.height as usize,
            };

            let roi = raster::extract_roi(frame.data(), fw as usize, channels, rect);
            let Some(patch) = self.pixelate(roi, rect.w, rect.h) else {
                log::warn!("Skipping box {b:?}: region is not packed RGB");
                continue;
            };

            // Ellipse follows the unclamped box so faces cut by the frame edge keep their shape
            let center = (
                padded.x as f64 + padded.width as f64 / 2.0 - rect.x as f64,
                padded.y as f64 + padded.height as f64 / 2.0 - rect.y as f64,
            );
            let axes = (
                padded.width as f64 * ELLIPSE_AXES.0,
                padded.height as f64 * ELLIPSE_AXES.1,
            );
            raster::composite_ellipse(
                frame.data_mut(),
                &patch,
                fw as usize,
                channels,
                rect,
                center,
                axes,
            );
        }

        Ok(())
    }
}
