use crate::detection::domain::gray_image::GrayImage;

/// Summed-area tables for constant-time rectangle sums.
///
/// `sum` and `sq_sum` are `(width + 1) x (height + 1)` with a zero first row
/// and column. The optional `tilted` table covers 45° rotated rectangles and
/// is padded by `height + 1` columns on both sides so rotated rectangles that
/// reach left of the image stay addressable.
pub struct IntegralImage {
    width: usize,
    height: usize,
    sum: Vec<i64>,
    sq_sum: Vec<f64>,
    tilted: Option<TiltedTable>,
}

struct TiltedTable {
    data: Vec<i64>,
    stride: usize,
    pad: usize,
}

impl IntegralImage {
    pub fn new(image: &GrayImage, with_tilted: bool) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let stride = width + 1;
        let mut sum = vec![0i64; stride * (height + 1)];
        let mut sq_sum = vec![0f64; stride * (height + 1)];
        let pixels = image.data();

        for y in 0..height {
            let mut row_sum = 0i64;
            let mut row_sq = 0f64;
            for x in 0..width {
                let v = pixels[y * width + x] as i64;
                row_sum += v;
                row_sq += (v * v) as f64;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        let tilted = with_tilted.then(|| TiltedTable::new(pixels, width, height));
        Self {
            width,
            height,
            sum,
            sq_sum,
            tilted,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`.
    pub fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        let stride = self.width + 1;
        let (x2, y2) = (x + w, y + h);
        self.sum[y2 * stride + x2] - self.sum[y * stride + x2] - self.sum[y2 * stride + x]
            + self.sum[y * stride + x]
    }

    pub fn rect_sq_sum(&self, x: usize, y: usize, w: usize, h: usize) -> f64 {
        let stride = self.width + 1;
        let (x2, y2) = (x + w, y + h);
        self.sq_sum[y2 * stride + x2] - self.sq_sum[y * stride + x2] - self.sq_sum[y2 * stride + x]
            + self.sq_sum[y * stride + x]
    }

    /// Sum over a 45° rotated rectangle anchored at `(x, y)`: `w` steps down-right
    /// and `h` steps down-left. Returns 0 when built without the tilted table.
    pub fn tilted_sum(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        let Some(t) = &self.tilted else {
            return 0;
        };
        t.at(x, y) - t.at(x - h, y + h) - t.at(x + w, y + w) + t.at(x + w - h, y + w + h)
    }
}

impl TiltedTable {
    /// `T(X, Y)` holds the sum of the upward triangle with apex pixel
    /// `(X - 1, Y - 1)`:
    /// `T(X,Y) = T(X-1,Y-1) + T(X+1,Y-1) - T(X,Y-2) + I(X-1,Y-1) + I(X-1,Y-2)`.
    fn new(pixels: &[u8], width: usize, height: usize) -> Self {
        let pad = height + 1;
        let stride = width + 1 + 2 * pad;
        let rows = height + 1;
        let mut data = vec![0i64; stride * rows];

        let pixel = |x: i64, y: i64| -> i64 {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                0
            } else {
                pixels[y as usize * width + x as usize] as i64
            }
        };

        for yy in 1..rows {
            for col in 0..stride {
                let big_x = col as i64 - pad as i64;
                let big_y = yy as i64;
                let mut v = pixel(big_x - 1, big_y - 1) + pixel(big_x - 1, big_y - 2);
                let prev = (yy - 1) * stride;
                if col > 0 {
                    v += data[prev + col - 1];
                }
                if col + 1 < stride {
                    v += data[prev + col + 1];
                }
                if yy >= 2 {
                    v -= data[(yy - 2) * stride + col];
                }
                data[yy * stride + col] = v;
            }
        }

        Self { data, stride, pad }
    }

    fn at(&self, x: i64, y: i64) -> i64 {
        let col = x + self.pad as i64;
        let rows = (self.data.len() / self.stride) as i64;
        if y <= 0 || col < 0 || col >= self.stride as i64 {
            return 0;
        }
        let y = y.min(rows - 1);
        self.data[y as usize * self.stride + col as usize]
    }
}
