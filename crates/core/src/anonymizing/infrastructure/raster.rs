/// ROI rectangle within a frame, used to pass region coordinates without many arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Precompute a 1D Gaussian kernel of the given size.
///
/// `kernel_size` must be odd and >= 1. Sigma is derived as `kernel_size / 6.0`.
pub fn gaussian_kernel_1d(kernel_size: usize) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    let sigma = kernel_size as f64 / 6.0;
    let half = (kernel_size / 2) as f64;
    let mut kernel: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel.iter().map(|&v| v as f32).collect()
}

/// Separable Gaussian blur with edge replication, reusing `temp` between calls.
pub fn separable_gaussian_blur(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    let kernel_size = kernel.len();
    if kernel_size <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = kernel_size as isize / 2;
    temp.resize(width * height * channels, 0.0);

    // Horizontal pass: data → temp
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - half).clamp(0, width as isize - 1) as usize;
                    sum += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    // Vertical pass: temp → data
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y as isize + k as isize - half).clamp(0, height as isize - 1) as usize;
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Copy a rectangular ROI out of interleaved frame data.
pub fn extract_roi(data: &[u8], frame_width: usize, channels: usize, rect: RoiRect) -> Vec<u8> {
    let row_len = rect.w * channels;
    let mut roi = vec![0u8; row_len * rect.h];
    for row in 0..rect.h {
        let src = ((rect.y + row) * frame_width + rect.x) * channels;
        roi[row * row_len..(row + 1) * row_len].copy_from_slice(&data[src..src + row_len]);
    }
    roi
}

/// `sharp = sharp * weight + soft * (1 - weight)`, per sample.
pub fn blend_into(sharp: &mut [u8], soft: &[u8], weight: f32) {
    for (s, &b) in sharp.iter_mut().zip(soft) {
        let v = *s as f32 * weight + b as f32 * (1.0 - weight);
        *s = v.round().clamp(0.0, 255.0) as u8;
    }
}

/// Write `patch` into the frame only where the pixel lies inside the ellipse
/// centred at `center` (ROI coordinates) with semi-axes `axes`.
pub fn composite_ellipse(
    data: &mut [u8],
    patch: &[u8],
    frame_width: usize,
    channels: usize,
    rect: RoiRect,
    center: (f64, f64),
    axes: (f64, f64),
) {
    let (semi_a, semi_b) = axes;
    if semi_a <= 0.0 || semi_b <= 0.0 {
        return;
    }
    let inv_a_sq = 1.0 / (semi_a * semi_a);
    let inv_b_sq = 1.0 / (semi_b * semi_b);

    for row in 0..rect.h {
        let dy = row as f64 - center.1;
        for col in 0..rect.w {
            let dx = col as f64 - center.0;
            if dx * dx * inv_a_sq + dy * dy * inv_b_sq <= 1.0 {
                let frame_offset = ((rect.y + row) * frame_width + (rect.x + col)) * channels;
                let patch_offset = (row * rect.w + col) * channels;
                data[frame_offset..frame_offset + channels]
                    .copy_from_slice(&patch[patch_offset..patch_offset + channels]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blur(data: &mut [u8], width: usize, height: usize, kernel_size: usize) {
        let kernel = gaussian_kernel_1d(kernel_size);
        separable_gaussian_blur(data, width, height, 3, &kernel, &mut Vec::new());
    }

    #[test]
    fn test_kernel_sums_to_one() {
        let k = gaussian_kernel_1d(7);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_kernel_is_symmetric_with_peak_in_centre() {
        let k = gaussian_kernel_1d(9);
        for i in 0..k.len() / 2 {
            assert!((k[i] - k[k.len() - 1 - i]).abs() < 1e-6);
            assert!(k[4] >= k[i]);
        }
    }

    #[test]
    fn test_blur_uniform_image_unchanged() {
        let mut data = vec![128u8; 10 * 10 * 3];
        blur(&mut data, 10, 10, 5);
        assert!(data.iter().all(|&v| (v as i32 - 128).abs() <= 1));
    }

    #[test]
    fn test_blur_spreads_single_bright_pixel() {
        let mut data = vec![0u8; 10 * 10 * 3];
        let centre = (5 * 10 + 5) * 3;
        data[centre..centre + 3].copy_from_slice(&[255, 255, 255]);
        blur(&mut data, 10, 10, 5);
        assert!(data[centre] < 255);
        assert!(data[(5 * 10 + 6) * 3] > 0);
    }

    #[test]
    fn test_kernel_size_1_is_identity() {
        let mut data: Vec<u8> = (0..75).collect();
        let original = data.clone();
        blur(&mut data, 5, 5, 1);
        assert_eq!(data, original);
    }

    #[test]
    fn test_extract_roi_copies_rows() {
        // 4x3 frame with one channel, values = index
        let data: Vec<u8> = (0..12).collect();
        let roi = extract_roi(&data, 4, 1, RoiRect { x: 1, y: 1, w: 2, h: 2 });
        assert_eq!(roi, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_blend_weights() {
        let mut sharp = vec![100, 200];
        blend_into(&mut sharp, &[0, 100], 0.6);
        assert_eq!(sharp, vec![60, 160]);
    }

    #[test]
    fn test_composite_ellipse_leaves_corners() {
        let mut frame = vec![0u8; 10 * 10];
        let patch = vec![255u8; 10 * 10];
        let rect = RoiRect { x: 0, y: 0, w: 10, h: 10 };
        composite_ellipse(&mut frame, &patch, 10, 1, rect, (5.0, 5.0), (4.0, 4.0));
        assert_eq!(frame[0], 0);
        assert_eq!(frame[9], 0);
        assert_eq!(frame[5 * 10 + 5], 255);
        assert_eq!(frame[5 * 10 + 1], 255);
    }

    #[test]
    fn test_composite_ellipse_degenerate_axes_is_noop() {
        let mut frame = vec![0u8; 4];
        let rect = RoiRect { x: 0, y: 0, w: 2, h: 2 };
        composite_ellipse(&mut frame, &[9; 4], 2, 1, rect, (1.0, 1.0), (0.0, 1.0));
        assert_eq!(frame, vec![0; 4]);
    }
}
