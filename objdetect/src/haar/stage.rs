//! Stage classifiers and the two cascade topologies built from them.
//!
//! A stump-base cascade is an ordered list of [`StumpStage`]s; the first
//! failing stage rejects the window. A tree-base cascade is an arena of
//! [`TreeStage`]s linked by `child` (tried on success), `next` (sibling) and a
//! derived `parent` link. A failing stage falls back to its parent's `next`
//! sibling before giving up.

use super::context::EvalStats;
use super::feature::{Feature, FeatureOffsets, WindowSums};
use super::weak::{tree_vote, NodeId, Stump, TreeNode};
use crate::{ObjdetectError, Result};

/// Handle of a stage in a tree-base cascade's stage arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

/// Stage of a stump-base cascade: passes when the summed stump votes reach
/// `threshold`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StumpStage {
    stumps: Vec<Stump>,
    threshold: i32,
}

impl StumpStage {
    pub fn new(stumps: Vec<Stump>, threshold: i32) -> Self {
        Self { stumps, threshold }
    }

    pub fn stumps(&self) -> &[Stump] {
        &self.stumps
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// `thresholds` holds the modified threshold of each stump, in order.
    pub(crate) fn passes(
        &self,
        thresholds: &[i64],
        features: &[Feature],
        offsets: &[FeatureOffsets],
        sums: WindowSums<'_>,
    ) -> bool {
        let sum: i64 = self
            .stumps
            .iter()
            .zip(thresholds)
            .map(|(stump, &t)| {
                let id = stump.feature().0;
                let value = sums.feature(&features[id], &offsets[id]);
                stump.vote(value, t) as i64
            })
            .sum();
        sum >= self.threshold as i64
    }
}

/// Run stump stages in order, stopping at the first failure.
pub(crate) fn evaluate_stump_stages(
    stages: &[StumpStage],
    thresholds: &[i64],
    features: &[Feature],
    offsets: &[FeatureOffsets],
    sums: WindowSums<'_>,
    stats: &mut EvalStats,
) -> bool {
    let mut base = 0;
    for stage in stages {
        let n = stage.stumps.len();
        stats.stages_evaluated += 1;
        stats.weak_evaluated += n as u64;
        if !stage.passes(&thresholds[base..base + n], features, offsets, sums) {
            return false;
        }
        base += n;
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStage {
    roots: Vec<NodeId>,
    threshold: i32,
    next: Option<StageId>,
    child: Option<StageId>,
    parent: Option<StageId>,
}

impl TreeStage {
    /// Stage voting with the decision trees rooted at `roots`.
    pub fn new(roots: Vec<NodeId>, threshold: i32) -> Self {
        Self {
            roots,
            threshold,
            next: None,
            child: None,
            parent: None,
        }
    }

    /// Sibling tried when a stage under this one's parent fails.
    pub fn with_next(mut self, next: StageId) -> Self {
        self.next = Some(next);
        self
    }

    /// Stage evaluated when this one passes.
    pub fn with_child(mut self, child: StageId) -> Self {
        self.child = Some(child);
        self
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn next(&self) -> Option<StageId> {
        self.next
    }

    pub fn child(&self) -> Option<StageId> {
        self.child
    }

    /// Stage whose `child` chain this stage belongs to. Filled in by
    /// [`TreeStages::new`].
    pub fn parent(&self) -> Option<StageId> {
        self.parent
    }

    fn passes(
        &self,
        nodes: &[TreeNode],
        features: &[Feature],
        offsets: &[FeatureOffsets],
        sums: WindowSums<'_>,
    ) -> bool {
        let sum: i64 = self
            .roots
            .iter()
            .map(|&root| tree_vote(nodes, root, features, offsets, sums) as i64)
            .sum();
        sum >= self.threshold as i64
    }
}

/// Stage and node arenas of a tree-base cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStages {
    stages: Vec<TreeStage>,
    nodes: Vec<TreeNode>,
    root: StageId,
}

impl TreeStages {
    /// Validate the arenas and derive every stage's `parent` link.
    ///
    /// # Errors
    ///
    /// [`ObjdetectError::InvalidCascade`] when a handle is out of range, when
    /// a stage is reachable from `root` along more than one `child`/`next`
    /// path, or when the node arena is not a forest.
    pub fn new(mut stages: Vec<TreeStage>, nodes: Vec<TreeNode>, root: StageId) -> Result<Self> {
        if root.0 >= stages.len() {
            return Err(ObjdetectError::InvalidCascade(format!(
                "root stage {} out of range ({} stages)",
                root.0,
                stages.len()
            )));
        }

        for (i, stage) in stages.iter().enumerate() {
            for link in [stage.next, stage.child].into_iter().flatten() {
                if link.0 >= stages.len() {
                    return Err(ObjdetectError::InvalidCascade(format!(
                        "stage {i} links to missing stage {}",
                        link.0
                    )));
                }
            }
            if let Some(bad) = stage.roots.iter().find(|r| r.0 >= nodes.len()) {
                return Err(ObjdetectError::InvalidCascade(format!(
                    "stage {i} references missing node {}",
                    bad.0
                )));
            }
        }

        let mut incoming = vec![0usize; nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for succ in [node.left(), node.right()].into_iter().flatten() {
                if succ.0 >= nodes.len() {
                    return Err(ObjdetectError::InvalidCascade(format!(
                        "node {i} links to missing node {}",
                        succ.0
                    )));
                }
                incoming[succ.0] += 1;
                if incoming[succ.0] > 1 {
                    return Err(ObjdetectError::InvalidCascade(format!(
                        "node {} has more than one parent",
                        succ.0
                    )));
                }
            }
        }
        if has_cycle(nodes.len(), |n| [nodes[n].left(), nodes[n].right()].map(|s| s.map(|s| s.0))) {
            return Err(ObjdetectError::InvalidCascade(
                "decision tree nodes form a cycle".into(),
            ));
        }

        for stage in &mut stages {
            stage.parent = None;
        }
        let mut visited = vec![false; stages.len()];
        let mut pending = vec![(root, None)];
        while let Some((id, parent)) = pending.pop() {
            if visited[id.0] {
                return Err(ObjdetectError::InvalidCascade(format!(
                    "stage {} is linked more than once",
                    id.0
                )));
            }
            visited[id.0] = true;
            let stage = &mut stages[id.0];
            stage.parent = parent;
            if let Some(next) = stage.next {
                pending.push((next, parent));
            }
            if let Some(child) = stage.child {
                pending.push((child, Some(id)));
            }
        }

        Ok(Self {
            stages,
            nodes,
            root,
        })
    }

    pub fn stages(&self) -> &[TreeStage] {
        &self.stages
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn root(&self) -> StageId {
        self.root
    }

    /// Walk the stage tree from the root until it accepts or rejects.
    ///
    /// Every transition moves forward in the pre-order of the stage tree, so
    /// the walk visits each stage at most once.
    pub(crate) fn evaluate(
        &self,
        features: &[Feature],
        offsets: &[FeatureOffsets],
        sums: WindowSums<'_>,
        stats: &mut EvalStats,
    ) -> bool {
        let mut current = self.root;
        loop {
            let stage = &self.stages[current.0];
            stats.stages_evaluated += 1;
            stats.weak_evaluated += stage.roots.len() as u64;

            if stage.passes(&self.nodes, features, offsets, sums) {
                match stage.child {
                    Some(child) => current = child,
                    None => return true,
                }
            } else {
                match stage.parent.and_then(|p| self.stages[p.0].next) {
                    Some(sibling) => current = sibling,
                    None => return false,
                }
            }
        }
    }
}

/// Cycle detection over a graph with at most two successors per vertex.
fn has_cycle(len: usize, successors: impl Fn(usize) -> [Option<usize>; 2]) -> bool {
    // 0 = unvisited, 1 = on the current path, 2 = finished
    let mut state = vec![0u8; len];
    for start in 0..len {
        if state[start] != 0 {
            continue;
        }
        state[start] = 1;
        let mut stack = vec![(start, 0usize)];
        while let Some(top) = stack.last_mut() {
            let (v, i) = *top;
            if i == 2 {
                state[v] = 2;
                stack.pop();
                continue;
            }
            top.1 += 1;
            if let Some(w) = successors(v)[i] {
                match state[w] {
                    0 => {
                        state[w] = 1;
                        stack.push((w, 0));
                    }
                    1 => return true,
                    _ => {}
                }
            }
        }
    }
    false
}
