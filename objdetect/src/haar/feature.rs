//! Haar-like features and the integral data they are read from.

use super::rect::{HaarRect, RectOffsets};

/// Handle of a feature in a cascade's feature arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub usize);

/// Haar-like feature: the sum of up to three weighted rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    rects: [HaarRect; 3],
    tilted: bool,
}

/// Offsets of all three rectangles for one image width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureOffsets([RectOffsets; 3]);

impl Feature {
    /// Unused slots should be [`HaarRect::empty`].
    ///
    /// Tilted features are carried but evaluated as upright rectangles.
    pub fn new(rects: [HaarRect; 3], tilted: bool) -> Self {
        Self { rects, tilted }
    }

    /// Feature built from up to three rectangles, padding with empty slots.
    pub fn from_rects(rects: &[HaarRect]) -> Self {
        let mut slots = [HaarRect::empty(); 3];
        for (slot, rect) in slots.iter_mut().zip(rects) {
            *slot = *rect;
        }
        Self::new(slots, false)
    }

    pub fn rects(&self) -> &[HaarRect; 3] {
        &self.rects
    }

    pub fn is_tilted(&self) -> bool {
        self.tilted
    }

    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.rects.iter().all(|r| r.fits(width, height))
    }

    pub fn offsets(&self, width: usize) -> FeatureOffsets {
        FeatureOffsets(self.rects.map(|r| r.offsets(width)))
    }

    /// See [`HaarRect::embedded_offsets`].
    pub fn embedded_offsets(&self, stride: usize) -> FeatureOffsets {
        FeatureOffsets(self.rects.map(|r| r.embedded_offsets(stride)))
    }

    /// Sum of the weighted rectangles, saturating at the `i64` range.
    #[inline]
    pub fn evaluate(&self, offsets: &FeatureOffsets, integral: &[u32]) -> i64 {
        self.rects
            .iter()
            .zip(&offsets.0)
            .map(|(r, o)| r.evaluate(o, integral))
            .fold(0, i64::saturating_add)
    }

    #[inline]
    pub fn evaluate_embedded(&self, offsets: &FeatureOffsets, integral: &[u32], base: usize) -> i64 {
        self.rects
            .iter()
            .zip(&offsets.0)
            .map(|(r, o)| r.evaluate_embedded(o, integral, base))
            .fold(0, i64::saturating_add)
    }
}

/// Integral data one window is evaluated against.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WindowSums<'a> {
    /// Integral image of the window alone.
    Local(&'a [u32]),
    /// Zero-padded integral image of a larger image; the window's top-left
    /// padded cell is at `base`.
    Embedded { integral: &'a [u32], base: usize },
}

impl WindowSums<'_> {
    #[inline]
    pub(crate) fn feature(&self, feature: &Feature, offsets: &FeatureOffsets) -> i64 {
        match *self {
            WindowSums::Local(integral) => feature.evaluate(offsets, integral),
            WindowSums::Embedded { integral, base } => {
                feature.evaluate_embedded(offsets, integral, base)
            }
        }
    }
}
