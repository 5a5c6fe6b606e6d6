//! Fixed-point image statistics.
//!
//! Mean and standard deviation are reported in pixel units scaled by 256, the
//! fixed-point convention the cascade classifiers are trained against.

use crate::{validate_image_size, ImgprocError, IntegralImage, Result};
use image::GrayImage;
use rayon::prelude::*;

/// Fixed-point scale of [`ImageStats`] values.
pub const STATS_SCALE: i64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageStats {
    /// Mean pixel value × 256.
    pub mean: i32,
    /// Standard deviation × 256. Defined as 0 when the variance is not positive.
    pub std_dev: i32,
}

/// Mean and standard deviation of `src`, integer-only.
///
/// # Errors
///
/// Returns [`crate::ImgprocError::DimensionMismatch`] for an empty image.
pub fn image_statistics(src: &GrayImage) -> Result<ImageStats> {
    validate_image_size(src.width(), src.height())?;

    let width = src.width() as usize;
    let (sum, sum_sq) = src
        .as_raw()
        .par_chunks(width)
        .map(|row| {
            row.iter().fold((0u64, 0u64), |(s, sq), &px| {
                let v = px as u64;
                (s + v, sq + v * v)
            })
        })
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    Ok(stats_from_sums(
        sum,
        sum_sq,
        src.width() as u64 * src.height() as u64,
    ))
}

/// Statistics of `n` pixels given their sum and sum of squares.
fn stats_from_sums(sum: u64, sum_sq: u64, n: u64) -> ImageStats {
    let n = n as i128;
    let sum = sum as i128;
    let sum_sq = sum_sq as i128;
    let scale = STATS_SCALE as i128;

    let mean = (sum * scale) / n;

    // n² · variance, exact in integers
    let spread = n * sum_sq - sum * sum;
    let std_dev = if spread <= 0 {
        0
    } else {
        let variance_scaled = (spread * scale * scale / (n * n)) as u128;
        variance_scaled.isqrt() as i32
    };

    ImageStats {
        mean: mean as i32,
        std_dev,
    }
}

/// Zero-padded sum and squared-sum tables of one image.
///
/// Both tables are `(width + 1) × (height + 1)` with a zero first row and
/// column, so any window sum is four lookups with no boundary cases. Window
/// statistics agree exactly with [`image_statistics`] run on the cropped
/// window.
#[derive(Debug, Clone)]
pub struct SummedAreaTables {
    width: u32,
    height: u32,
    /// Padded integral image. Cells wrap like [`IntegralImage`].
    sum: IntegralImage,
    /// Padded integral of squared pixels.
    sum_sq: Vec<u64>,
}

impl SummedAreaTables {
    pub fn new(src: &GrayImage) -> Self {
        let (width, height) = src.dimensions();
        let stride = width as usize + 1;
        let rows = height as usize + 1;
        let mut sum = vec![0u32; stride * rows];
        let mut sum_sq = vec![0u64; stride * rows];

        for (y, row) in src.as_raw().chunks(width.max(1) as usize).take(height as usize).enumerate() {
            let mut row_sum = 0u32;
            let mut row_sq = 0u64;
            for (x, &px) in row.iter().enumerate() {
                row_sum = row_sum.wrapping_add(px as u32);
                row_sq += px as u64 * px as u64;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride].wrapping_add(row_sum);
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }

        Self {
            width,
            height,
            sum: IntegralImage::from_raw(stride, rows, sum),
            sum_sq,
        }
    }

    /// Dimensions of the source image.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The padded integral image. Source pixel `(col, row)` is included in
    /// every cell at or below-right of `(col + 1, row + 1)`.
    pub fn integral(&self) -> &IntegralImage {
        &self.sum
    }

    /// Statistics of the `w`×`h` window at `(x, y)`.
    ///
    /// # Errors
    ///
    /// [`crate::ImgprocError::DimensionMismatch`] if the window is empty or
    /// leaves the image.
    pub fn window_statistics(&self, x: u32, y: u32, w: u32, h: u32) -> Result<ImageStats> {
        validate_image_size(w, h)?;
        if x as u64 + w as u64 > self.width as u64 || y as u64 + h as u64 > self.height as u64 {
            return Err(ImgprocError::DimensionMismatch(format!(
                "window {w}x{h} at ({x}, {y}) leaves the {}x{} image",
                self.width, self.height
            )));
        }

        let stride = self.sum.width();
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let cells = [y0 * stride + x0, y1 * stride + x1, y0 * stride + x1, y1 * stride + x0];

        let s = self.sum.as_slice();
        let sum = s[cells[0]]
            .wrapping_add(s[cells[1]])
            .wrapping_sub(s[cells[2]])
            .wrapping_sub(s[cells[3]]);
        let q = &self.sum_sq;
        let sum_sq = q[cells[0]] + q[cells[1]] - q[cells[2]] - q[cells[3]];

        Ok(stats_from_sums(sum as u64, sum_sq, w as u64 * h as u64))
    }
}

/// Standard deviation of `src` × 256.
pub fn standard_deviation(src: &GrayImage) -> Result<i32> {
    image_statistics(src).map(|s| s.std_dev)
}
