use super::context::{EvalCache, EvaluationContext, OffsetLayout};
use super::feature::{Feature, WindowSums};
use super::stage::{evaluate_stump_stages, StumpStage, TreeStages};
use super::weak::Stump;
use crate::{ObjdetectError, Result};
use cv_core::{CvImage, PixelKind};
use cv_imgproc::{integral_image_into, standard_deviation, IntegralImage};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CASCADE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
enum StageLayout {
    /// Ordered stages; the first failing stage rejects.
    Stumps(Vec<StumpStage>),
    /// Stage tree with sibling fallback.
    Tree(TreeStages),
}

/// Trained Haar cascade for a fixed `width`×`height` window.
///
/// The cascade owns its features, weak classifiers and stages and is
/// immutable once built. Per-window state lives in an
/// [`EvaluationContext`], so a cascade can be shared between threads that
/// each hold their own context.
///
/// # Usage
///
/// ```no_run
/// # use cv_objdetect::HaarCascade;
/// # use image::GrayImage;
/// let cascade = HaarCascade::from_file("face.hcsb")?;
/// let window = GrayImage::new(cascade.width(), cascade.height());
/// let matched = cascade.evaluate(&window)?;
/// # Ok::<(), cv_objdetect::ObjdetectError>(())
/// ```
#[derive(Debug, Clone)]
pub struct HaarCascade {
    id: u64,
    width: u32,
    height: u32,
    features: Vec<Feature>,
    layout: StageLayout,
}

impl HaarCascade {
    /// Build a stump-base cascade.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidCascade`] if the window is empty, a feature
    /// does not fit in it, a stump references a missing feature, or a stump
    /// was trained on a window that is empty or larger than the cascade's.
    pub fn stump_based(
        width: u32,
        height: u32,
        features: Vec<Feature>,
        stages: Vec<StumpStage>,
    ) -> Result<Self> {
        validate_window(width, height)?;
        validate_features(&features, width, height)?;
        for (i, stage) in stages.iter().enumerate() {
            for stump in stage.stumps() {
                check_feature(stump.feature().0, features.len(), i)?;
                if !stump.window_fits(width, height) {
                    let (sw, sh) = stump.window();
                    return Err(ObjdetectError::InvalidCascade(format!(
                        "stage {i} has a stump trained on {sw}x{sh}, outside the {width}x{height} window"
                    )));
                }
            }
        }
        Ok(Self::assemble(width, height, features, StageLayout::Stumps(stages)))
    }

    /// Build a tree-base cascade from validated stage and node arenas.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidCascade`] if the window is empty, a feature
    /// does not fit in it, or a node references a missing feature.
    pub fn tree_based(
        width: u32,
        height: u32,
        features: Vec<Feature>,
        tree: TreeStages,
    ) -> Result<Self> {
        validate_window(width, height)?;
        validate_features(&features, width, height)?;
        for (i, node) in tree.nodes().iter().enumerate() {
            check_feature(node.feature().0, features.len(), i)?;
        }
        Ok(Self::assemble(width, height, features, StageLayout::Tree(tree)))
    }

    fn assemble(width: u32, height: u32, features: Vec<Feature>, layout: StageLayout) -> Self {
        Self {
            id: NEXT_CASCADE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            features,
            layout,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn stump_stages(&self) -> Option<&[StumpStage]> {
        match &self.layout {
            StageLayout::Stumps(stages) => Some(stages),
            StageLayout::Tree(_) => None,
        }
    }

    pub fn tree_stages(&self) -> Option<&TreeStages> {
        match &self.layout {
            StageLayout::Stumps(_) => None,
            StageLayout::Tree(tree) => Some(tree),
        }
    }

    pub fn is_tree_based(&self) -> bool {
        matches!(self.layout, StageLayout::Tree(_))
    }

    pub fn stage_count(&self) -> usize {
        match &self.layout {
            StageLayout::Stumps(stages) => stages.len(),
            StageLayout::Tree(tree) => tree.stages().len(),
        }
    }

    /// Fresh evaluation context for this cascade.
    pub fn context(&self) -> EvaluationContext {
        EvaluationContext::new()
    }

    /// Decide whether `image`, exactly the size of the cascade window,
    /// matches.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::SizeMismatch`] if the image is not `width`×`height`,
    /// checked first, then [`ObjdetectError::WrongImageKind`] if it is not
    /// 8-bit grayscale.
    pub fn evaluate<I: CvImage>(&self, image: &I) -> Result<bool> {
        let mut ctx = self.context();
        self.evaluate_with(&mut ctx, image)
    }

    /// Like [`HaarCascade::evaluate`], reusing the caches and buffers in `ctx`.
    ///
    /// # Errors
    ///
    /// As [`HaarCascade::evaluate`].
    pub fn evaluate_with<I: CvImage>(
        &self,
        ctx: &mut EvaluationContext,
        image: &I,
    ) -> Result<bool> {
        let info = image.info();
        if info.dimensions() != (self.width, self.height) {
            return Err(ObjdetectError::SizeMismatch {
                expected: (self.width, self.height),
                found: info.dimensions(),
            });
        }
        let gray = image
            .as_gray8()
            .filter(|_| info.kind == PixelKind::GRAY8)
            .ok_or(ObjdetectError::WrongImageKind {
                expected: PixelKind::GRAY8,
                found: info.kind,
            })?;

        let std_dev = standard_deviation(gray)?;
        integral_image_into(gray, &mut ctx.integral);

        let EvaluationContext { cache, integral } = ctx;
        let layout = OffsetLayout::Local(self.width as usize);
        Ok(self.run(cache, WindowSums::Local(integral.as_slice()), std_dev, layout))
    }

    /// Evaluate a window whose integral image and standard deviation (×256)
    /// the caller already computed.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::SizeMismatch`] if `integral` does not match the
    /// window.
    pub fn evaluate_integral(
        &self,
        ctx: &mut EvaluationContext,
        integral: &IntegralImage,
        std_dev: i32,
    ) -> Result<bool> {
        let (w, h) = integral.dimensions();
        if (w, h) != (self.width as usize, self.height as usize) {
            return Err(ObjdetectError::SizeMismatch {
                expected: (self.width, self.height),
                found: (w as u32, h as u32),
            });
        }
        let sums = WindowSums::Local(integral.as_slice());
        let layout = OffsetLayout::Local(self.width as usize);
        Ok(self.run(&mut ctx.cache, sums, std_dev, layout))
    }

    /// Walk the stages over `sums`; `layout` must describe the table behind it.
    pub(crate) fn run(
        &self,
        cache: &mut EvalCache,
        sums: WindowSums<'_>,
        std_dev: i32,
        layout: OffsetLayout,
    ) -> bool {
        let width = self.width as usize;
        cache.bind(self.id);
        cache.refresh_offsets(&self.features, layout);
        cache.stats.windows += 1;

        match &self.layout {
            StageLayout::Stumps(stages) => {
                cache.refresh_thresholds(all_stumps(stages), width, std_dev);
                evaluate_stump_stages(
                    stages,
                    &cache.thresholds,
                    &self.features,
                    &cache.offsets,
                    sums,
                    &mut cache.stats,
                )
            }
            StageLayout::Tree(tree) => {
                tree.evaluate(&self.features, &cache.offsets, sums, &mut cache.stats)
            }
        }
    }
}

fn all_stumps(stages: &[StumpStage]) -> impl Iterator<Item = &Stump> {
    stages.iter().flat_map(|s| s.stumps())
}

fn validate_window(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(ObjdetectError::InvalidCascade(format!(
            "window must be non-empty, got {width}x{height}"
        )));
    }
    Ok(())
}

fn validate_features(features: &[Feature], width: u32, height: u32) -> Result<()> {
    if let Some(i) = features.iter().position(|f| !f.fits(width, height)) {
        return Err(ObjdetectError::InvalidCascade(format!(
            "feature {i} does not fit in the {width}x{height} window"
        )));
    }
    Ok(())
}

fn check_feature(feature: usize, count: usize, owner: usize) -> Result<()> {
    if feature >= count {
        return Err(ObjdetectError::InvalidCascade(format!(
            "classifier {owner} references missing feature {feature}"
        )));
    }
    Ok(())
}
