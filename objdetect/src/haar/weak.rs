//! Weak classifiers: variance-normalized stumps and decision-tree nodes.

use super::feature::{Feature, FeatureId, FeatureOffsets, WindowSums};

/// Left shift aligning a raw feature value with the stored stump threshold.
pub const FEATURE_SHIFT: u32 = 12;

/// Handle of a node in a tree-base cascade's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Single-threshold weak classifier.
///
/// The stored threshold is fixed-point and normalized to a unit-variance,
/// unit-area window; at evaluation time it is scaled by the window standard
/// deviation and the trained window area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stump {
    feature: FeatureId,
    threshold: i32,
    a: i32,
    b: i32,
    width: i32,
    height: i32,
}

impl Stump {
    /// `a` is voted when the feature falls below the threshold, `b` otherwise.
    pub fn new(feature: FeatureId, threshold: i32, a: i32, b: i32, width: i32, height: i32) -> Self {
        Self {
            feature,
            threshold,
            a,
            b,
            width,
            height,
        }
    }

    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn values(&self) -> (i32, i32) {
        (self.a, self.b)
    }

    /// Trained window size the threshold is normalized to.
    pub fn window(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Whether the trained window is non-empty and no larger than the
    /// cascade window.
    pub fn window_fits(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.width as i64 <= width as i64
            && self.height as i64 <= height as i64
    }

    /// Threshold scaled by the window standard deviation (×256) and area.
    ///
    /// Computed in 128 bits and saturated to the `i64` range.
    pub fn modified_threshold(&self, std_dev: i32) -> i64 {
        let scaled = (self.threshold as i128 * std_dev as i128) >> 6;
        let modified = (scaled * self.width as i128 * self.height as i128) >> 6;
        modified.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Vote for a raw feature value against a threshold from
    /// [`Stump::modified_threshold`].
    #[inline]
    pub fn vote(&self, feature_value: i64, modified_threshold: i64) -> i32 {
        if ((feature_value as i128) << FEATURE_SHIFT) < modified_threshold as i128 {
            self.a
        } else {
            self.b
        }
    }
}

/// Internal or leaf node of a weak decision tree.
///
/// A missing successor on the taken branch ends the walk with this node's
/// `alpha`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    feature: FeatureId,
    threshold: i32,
    alpha: i32,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl TreeNode {
    pub fn new(feature: FeatureId, threshold: i32, alpha: i32) -> Self {
        Self {
            feature,
            threshold,
            alpha,
            left: None,
            right: None,
        }
    }

    /// Successor taken when the feature is below the threshold.
    pub fn with_left(mut self, left: NodeId) -> Self {
        self.left = Some(left);
        self
    }

    /// Successor taken when the feature is at or above the threshold.
    pub fn with_right(mut self, right: NodeId) -> Self {
        self.right = Some(right);
        self
    }

    pub fn feature(&self) -> FeatureId {
        self.feature
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn alpha(&self) -> i32 {
        self.alpha
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }
}

/// Walk the decision tree rooted at `root` and return the reached leaf value.
///
/// The node arena must be acyclic, which [`super::stage::TreeStages::new`]
/// guarantees.
pub(crate) fn tree_vote(
    nodes: &[TreeNode],
    root: NodeId,
    features: &[Feature],
    offsets: &[FeatureOffsets],
    sums: WindowSums<'_>,
) -> i32 {
    let mut node = &nodes[root.0];
    loop {
        let id = node.feature.0;
        let value = sums.feature(&features[id], &offsets[id]);
        let next = if value < node.threshold as i64 {
            node.left
        } else {
            node.right
        };
        match next {
            Some(n) => node = &nodes[n.0],
            None => return node.alpha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_threshold_saturates() {
        let huge = Stump::new(FeatureId(0), i32::MAX, 1, -1, i32::MAX, i32::MAX);
        assert_eq!(huge.modified_threshold(i32::MAX), i64::MAX);

        let negative = Stump::new(FeatureId(0), i32::MIN, 1, -1, i32::MAX, i32::MAX);
        assert_eq!(negative.modified_threshold(i32::MAX), i64::MIN);
    }

    #[test]
    fn vote_does_not_wrap_on_extreme_features() {
        let stump = Stump::new(FeatureId(0), 0, 3, 5, 24, 24);
        // i64::MIN << 12 would wrap positive in 64 bits
        assert_eq!(stump.vote(i64::MIN, 0), 3);
        assert_eq!(stump.vote(i64::MAX, i64::MAX), 5);
        assert_eq!(stump.vote(i64::MIN, i64::MIN), 3);
    }
}
