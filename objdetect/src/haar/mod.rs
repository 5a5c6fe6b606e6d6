//! Integer-only Haar cascade runtime.
//!
//! A cascade is a list of stage classifiers, each summing the votes of weak
//! classifiers over Haar-like features. Features are weighted rectangle sums
//! read from the integral image of the window; stump thresholds are scaled by
//! the window standard deviation so that evaluation is illumination
//! invariant. A window matches when every stage (stump-base) or some
//! root-to-leaf chain of stages (tree-base) passes.
//!
//! Cascades load from the parenthesized `hcsb` text format (see [`parser`])
//! or are built in memory. Per-window scratch is held in an
//! [`EvaluationContext`] so one cascade serves any number of threads.

pub mod cascade;
pub mod context;
pub mod detect;
pub mod feature;
pub mod parser;
pub mod rect;
pub mod stage;
pub mod weak;

pub use cascade::HaarCascade;
pub use context::{EvalStats, EvaluationContext};
pub use detect::{Detection, ScanParams};
pub use feature::{Feature, FeatureId, FeatureOffsets};
pub use parser::{parse_cascade, parse_cascade_with, ParseOptions, TiltedPolicy};
pub use rect::{HaarRect, RectKind, RectOffsets};
pub use stage::{StageId, StumpStage, TreeStage, TreeStages};
pub use weak::{NodeId, Stump, TreeNode, FEATURE_SHIFT};

#[cfg(test)]
mod haar_test;
