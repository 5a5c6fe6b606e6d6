//! Per-call evaluation scratch.
//!
//! A [`super::HaarCascade`] never changes after construction. Everything that
//! depends on the evaluated window (integral image, width-keyed rectangle
//! offsets, stdDev-keyed stump thresholds) lives here, so one cascade can be
//! shared across threads with one context per thread.

use super::feature::{Feature, FeatureOffsets};
use super::weak::Stump;
use cv_imgproc::IntegralImage;

/// Counters accumulated across evaluations with one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Windows evaluated.
    pub windows: u64,
    /// Stage classifiers evaluated, including the failing one.
    pub stages_evaluated: u64,
    /// Weak classifier votes cast (one per stump or tree root).
    pub weak_evaluated: u64,
}

/// Reusable scratch for evaluating windows, bound to the last cascade used.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub(crate) cache: EvalCache,
    pub(crate) integral: IntegralImage,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EvalCache {
    owner: Option<u64>,
    pub(crate) offsets: Vec<FeatureOffsets>,
    offsets_layout: Option<OffsetLayout>,
    pub(crate) thresholds: Vec<i64>,
    thresholds_key: Option<(usize, i32)>,
    pub(crate) stats: EvalStats,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters since creation or the last [`EvaluationContext::reset_stats`].
    pub fn stats(&self) -> EvalStats {
        self.cache.stats
    }

    pub fn reset_stats(&mut self) {
        self.cache.stats = EvalStats::default();
    }

    /// Window width the rectangle offsets were last derived for, or `None`
    /// when they were last laid out over a scanned image.
    pub fn width(&self) -> Option<usize> {
        match self.cache.offsets_layout {
            Some(OffsetLayout::Local(width)) => Some(width),
            _ => None,
        }
    }
}

/// Integral layout rectangle offsets are derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OffsetLayout {
    /// Unpadded integral image of the window, by its width.
    Local(usize),
    /// Zero-padded integral image of a larger image, by its row stride.
    Embedded(usize),
}

impl EvalCache {
    /// Drop every cached quantity if the context moves to another cascade.
    pub(crate) fn bind(&mut self, owner: u64) {
        if self.owner != Some(owner) {
            self.owner = Some(owner);
            self.offsets_layout = None;
            self.thresholds_key = None;
        }
    }

    pub(crate) fn refresh_offsets(&mut self, features: &[Feature], layout: OffsetLayout) {
        if self.offsets_layout == Some(layout) && self.offsets.len() == features.len() {
            return;
        }
        self.offsets.clear();
        match layout {
            OffsetLayout::Local(width) => {
                self.offsets.extend(features.iter().map(|f| f.offsets(width)))
            }
            OffsetLayout::Embedded(stride) => self
                .offsets
                .extend(features.iter().map(|f| f.embedded_offsets(stride))),
        }
        self.offsets_layout = Some(layout);
    }

    pub(crate) fn refresh_thresholds<'a>(
        &mut self,
        stumps: impl Iterator<Item = &'a Stump>,
        width: usize,
        std_dev: i32,
    ) {
        if self.thresholds_key == Some((width, std_dev)) {
            return;
        }
        self.thresholds.clear();
        self.thresholds
            .extend(stumps.map(|s| s.modified_threshold(std_dev)));
        self.thresholds_key = Some((width, std_dev));
    }
}
