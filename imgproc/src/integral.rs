//! Integral (summed-area) images.
//!
//! Cell `(col, row)` holds the sum of every source pixel with column `<= col`
//! and row `<= row`. The table has the same dimensions as the source, so sums
//! touching the first row or column need boundary-aware formulas.

use image::GrayImage;

/// Summed-area table of an 8-bit single-channel image, row-major.
///
/// Cells are `u32`, enough for a 4096×4096 image of saturated pixels. Larger
/// tables wrap; differences of cells taken with wrapping arithmetic still
/// produce exact rectangle sums as long as the rectangle itself fits in 32 bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegralImage {
    width: usize,
    height: usize,
    data: Vec<u32>,
}

impl IntegralImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.data
    }

    /// Cumulative sum at `(col, row)`.
    #[inline]
    pub fn at(&self, col: usize, row: usize) -> u32 {
        self.data[row * self.width + col]
    }

    pub(crate) fn from_raw(width: usize, height: usize, data: Vec<u32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }
}

/// Build the integral image of `src`.
pub fn integral_image(src: &GrayImage) -> IntegralImage {
    let mut dst = IntegralImage::new();
    integral_image_into(src, &mut dst);
    dst
}

/// Build the integral image of `src` into `dst`, reusing its allocation.
pub fn integral_image_into(src: &GrayImage, dst: &mut IntegralImage) {
    integral_image_u8_into(
        src.as_raw(),
        src.width() as usize,
        src.height() as usize,
        dst,
    );
}

/// Build the integral image of a tightly packed row-major 8-bit buffer.
fn integral_image_u8_into(img: &[u8], width: usize, height: usize, dst: &mut IntegralImage) {
    debug_assert!(img.len() >= width * height);

    dst.width = width;
    dst.height = height;
    dst.data.clear();
    dst.data.resize(width * height, 0);

    for y in 0..height {
        let mut row_sum = 0u32;
        for x in 0..width {
            row_sum = row_sum.wrapping_add(img[y * width + x] as u32);
            let idx = y * width + x;
            dst.data[idx] = if y == 0 {
                row_sum
            } else {
                dst.data[idx - width].wrapping_add(row_sum)
            };
        }
    }
}
