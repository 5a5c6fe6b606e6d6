//! Sliding-window scan over an image pyramid.

use super::cascade::HaarCascade;
use super::context::OffsetLayout;
use super::feature::WindowSums;
use crate::{ObjdetectError, Result};
use cv_core::Rect;
use cv_imgproc::SummedAreaTables;
use image::imageops::{self, FilterType};
use image::GrayImage;
use rayon::prelude::*;
use std::borrow::Cow;

/// Parameters of [`HaarCascade::detect`].
#[derive(Debug, Clone)]
pub struct ScanParams {
    /// Window stride in pixels at every pyramid level.
    pub step: u32,
    /// Downscale factor between consecutive pyramid levels.
    pub scale_factor: f32,
    /// Upper bound on the number of pyramid levels, including the base image.
    pub max_levels: u32,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            step: 2,
            scale_factor: 1.25,
            max_levels: 8,
        }
    }
}

impl ScanParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window stride in pixels.
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    /// Set the downscale factor between pyramid levels; must exceed 1.0.
    pub fn with_scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the maximum number of pyramid levels.
    pub fn with_max_levels(mut self, max_levels: u32) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Check the parameters before a scan.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidParams`] for a zero step, a zero level count,
    /// or a scale factor that is not a finite value above 1.0.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(ObjdetectError::InvalidParams("step must be at least 1".into()));
        }
        if !(self.scale_factor > 1.0) || !self.scale_factor.is_finite() {
            return Err(ObjdetectError::InvalidParams(format!(
                "scale_factor must be a finite value above 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.max_levels == 0 {
            return Err(ObjdetectError::InvalidParams(
                "max_levels must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A window accepted by the cascade, in base image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Window bounds scaled back to the input image.
    pub rect: Rect,
    /// Pyramid scale the window was found at (1.0 for the base image).
    pub scale: f32,
}

impl HaarCascade {
    /// Scan `image` with the cascade window at every pyramid level and
    /// return the accepted windows.
    ///
    /// Levels are produced by downscaling the image by `scale_factor^k` until
    /// the window no longer fits or `max_levels` is reached. Rows of a level
    /// are evaluated in parallel, each rayon worker owning one
    /// [`super::EvaluationContext`]. Each level gets one zero-padded integral
    /// image that every window reads in place. Detections are not grouped.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidParams`] if `params` fails
    /// [`ScanParams::validate`].
    pub fn detect(&self, image: &GrayImage, params: &ScanParams) -> Result<Vec<Detection>> {
        params.validate()?;
        let (base_w, base_h) = image.dimensions();
        let mut detections = Vec::new();

        for level in 0..params.max_levels {
            let scale = params.scale_factor.powi(level as i32);
            let level_w = (base_w as f32 / scale).round() as u32;
            let level_h = (base_h as f32 / scale).round() as u32;
            if level_w < self.width() || level_h < self.height() {
                break;
            }

            let scaled: Cow<'_, GrayImage> = if level == 0 {
                Cow::Borrowed(image)
            } else {
                Cow::Owned(imageops::resize(image, level_w, level_h, FilterType::Triangle))
            };
            let found = self.scan_level(&scaled, params.step, scale)?;

            #[cfg(feature = "tracing")]
            tracing::debug!(level, scale, level_w, level_h, found = found.len(), "scanned pyramid level");

            detections.extend(found);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            width = base_w,
            height = base_h,
            detections = detections.len(),
            "haar scan finished"
        );

        Ok(detections)
    }

    fn scan_level(&self, level: &GrayImage, step: u32, scale: f32) -> Result<Vec<Detection>> {
        let (win_w, win_h) = (self.width(), self.height());
        let rows: Vec<u32> = (0..=level.height() - win_h).step_by(step as usize).collect();
        let cols: Vec<u32> = (0..=level.width() - win_w).step_by(step as usize).collect();

        let tables = SummedAreaTables::new(level);
        let stride = tables.integral().width();
        let integral = tables.integral().as_slice();
        let layout = OffsetLayout::Embedded(stride);

        let per_row = rows
            .par_iter()
            .map_init(
                || self.context(),
                |ctx, &y| -> Result<Vec<Detection>> {
                    let mut hits = Vec::new();
                    for &x in &cols {
                        let std_dev = tables.window_statistics(x, y, win_w, win_h)?.std_dev;
                        let base = y as usize * stride + x as usize;
                        let sums = WindowSums::Embedded { integral, base };
                        if self.run(&mut ctx.cache, sums, std_dev, layout) {
                            hits.push(Detection {
                                rect: Rect::new(
                                    x as f32 * scale,
                                    y as f32 * scale,
                                    win_w as f32 * scale,
                                    win_h as f32 * scale,
                                ),
                                scale,
                            });
                        }
                    }
                    Ok(hits)
                },
            )
            .collect::<Result<Vec<_>>>()?;

        Ok(per_row.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        let params = ScanParams::default();
        assert_eq!((params.step, params.max_levels), (2, 8));
        assert!(params.validate().is_ok());
    }

    #[test]
    fn invalid_params() {
        for params in [
            ScanParams::new().with_step(0),
            ScanParams::new().with_scale_factor(1.0),
            ScanParams::new().with_scale_factor(f32::NAN),
            ScanParams::new().with_max_levels(0),
        ] {
            assert!(matches!(params.validate(), Err(ObjdetectError::InvalidParams(_))));
        }
    }
}
