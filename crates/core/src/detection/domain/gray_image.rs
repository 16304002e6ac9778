use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::shared::frame::Frame;

type LumaBuffer = ImageBuffer<Luma<u8>, Vec<u8>>;

/// Single-channel 8-bit image used as detector input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    buffer: LumaBuffer,
}

impl GrayImage {
    /// Returns `None` when `data` does not hold exactly `width * height` bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) {
            return None;
        }
        LumaBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// BT.601 luma in 14-bit fixed point, the same weights video decoders use.
    ///
    /// `image`'s own conversion uses Rec. 709 weights, so this stays manual.
    pub fn from_frame(frame: &Frame) -> Self {
        let view = frame.as_ndarray();
        let mut data = Vec::with_capacity((frame.width() * frame.height()) as usize);
        for row in view.outer_iter() {
            for px in row.outer_iter() {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                data.push(((r * 4899 + g * 9617 + b * 1868 + 8192) >> 14) as u8);
            }
        }
        let buffer = LumaBuffer::from_raw(frame.width(), frame.height(), data)
            .unwrap_or_else(|| LumaBuffer::new(frame.width(), frame.height()));
        Self { buffer }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.buffer.get_pixel(x, y).0[0]
    }

    /// Histogram equalisation: the first populated bin maps to 0 and the
    /// cumulative count is stretched over the full 0..=255 range.
    pub fn equalized(&self) -> Self {
        let pixels = self.data();
        let total = pixels.len();
        if total == 0 {
            return self.clone();
        }

        let mut hist = [0usize; 256];
        for &v in pixels {
            hist[v as usize] += 1;
        }

        let first = hist.iter().position(|&c| c > 0).unwrap_or(0);
        let mut lut = [first as u8; 256];
        if hist[first] < total {
            let scale = 255.0 / (total - hist[first]) as f64;
            let mut cumulative = 0usize;
            lut[first] = 0;
            for (value, &count) in hist.iter().enumerate().skip(first + 1) {
                cumulative += count;
                lut[value] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
            }
        }

        let mut buffer = self.buffer.clone();
        for px in buffer.pixels_mut() {
            px.0[0] = lut[px.0[0] as usize];
        }
        Self { buffer }
    }

    pub fn flipped_horizontal(&self) -> Self {
        Self {
            buffer: imageops::flip_horizontal(&self.buffer),
        }
    }

    /// Triangle-filtered resize; downscales average over the covered pixels.
    pub fn resized(&self, new_width: u32, new_height: u32) -> Self {
        if new_width == self.width() && new_height == self.height() {
            return self.clone();
        }
        if self.data().is_empty() || new_width == 0 || new_height == 0 {
            return Self {
                buffer: LumaBuffer::new(new_width, new_height),
            };
        }
        Self {
            buffer: imageops::resize(&self.buffer, new_width, new_height, FilterType::Triangle),
        }
    }
}
