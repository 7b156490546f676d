//! Node expansion strategies.
//!
//! - Depth-wise: expand every node of a level before moving to the next
//!   (XGBoost style).
//! - Leaf-wise: always expand the open node with the highest gain
//!   (LightGBM style).

use super::split::SplitInfo;

/// Tree growth strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrowthStrategy {
    /// Level-by-level growth up to `max_depth`.
    DepthWise { max_depth: u32 },
    /// Best-first growth up to `max_leaves`, optionally capped in depth.
    LeafWise { max_leaves: u32, max_depth: Option<u32> },
}

impl Default for GrowthStrategy {
    fn default() -> Self {
        GrowthStrategy::DepthWise { max_depth: 6 }
    }
}

impl GrowthStrategy {
    /// Initial (empty) expansion state.
    pub fn init(self) -> GrowthState {
        match self {
            GrowthStrategy::DepthWise { max_depth } => GrowthState::DepthWise {
                max_depth,
                current_level: Vec::new(),
                next_level: Vec::new(),
            },
            GrowthStrategy::LeafWise { max_leaves, max_depth } => GrowthState::LeafWise {
                max_leaves: max_leaves.max(1),
                max_depth,
                candidates: Vec::new(),
                n_leaves: 0,
            },
        }
    }

    /// Maximum depth, if limited.
    pub fn max_depth(self) -> Option<u32> {
        match self {
            GrowthStrategy::DepthWise { max_depth } => Some(max_depth),
            GrowthStrategy::LeafWise { max_depth, .. } => max_depth,
        }
    }

    /// Upper bound on the number of leaves, for buffer sizing.
    pub fn max_leaves(self) -> usize {
        match self {
            GrowthStrategy::DepthWise { max_depth } => 1usize << max_depth.min(16),
            GrowthStrategy::LeafWise { max_leaves, .. } => max_leaves.max(1) as usize,
        }
    }
}

/// An open node waiting to be split or turned into a leaf.
#[derive(Clone, Debug)]
pub struct NodeCandidate {
    /// Node id in the tree under construction.
    pub tree_node: u32,
    /// Rows reaching this node.
    pub rows: Vec<u32>,
    pub depth: u32,
    pub grad_sum: f64,
    pub hess_sum: f64,
    /// Best split, `None` if the node cannot be split.
    pub split: Option<SplitInfo>,
}

impl NodeCandidate {
    /// Split gain, or negative infinity for unsplittable nodes.
    #[inline]
    pub fn gain(&self) -> f64 {
        self.split.as_ref().map_or(f64::NEG_INFINITY, |s| s.gain)
    }

    #[inline]
    pub fn is_splittable(&self) -> bool {
        self.split.is_some()
    }
}

/// Mutable expansion state for one tree.
#[derive(Debug)]
pub enum GrowthState {
    DepthWise {
        max_depth: u32,
        current_level: Vec<NodeCandidate>,
        next_level: Vec<NodeCandidate>,
    },
    LeafWise {
        max_leaves: u32,
        max_depth: Option<u32>,
        candidates: Vec<NodeCandidate>,
        /// Leaves in the tree so far (open candidates included).
        n_leaves: u32,
    },
}

impl GrowthState {
    /// Register the root candidate.
    pub fn push_root(&mut self, root: NodeCandidate) {
        match self {
            GrowthState::DepthWise { current_level, .. } => current_level.push(root),
            GrowthState::LeafWise { candidates, n_leaves, .. } => {
                candidates.push(root);
                *n_leaves = 1;
            }
        }
    }

    /// Register a child produced by a split.
    pub fn push(&mut self, child: NodeCandidate) {
        match self {
            GrowthState::DepthWise { next_level, .. } => next_level.push(child),
            GrowthState::LeafWise { candidates, .. } => candidates.push(child),
        }
    }

    /// Whether a candidate may still be split under the depth limit.
    pub fn can_split(&self, candidate: &NodeCandidate) -> bool {
        let depth_ok = match self {
            GrowthState::DepthWise { max_depth, .. } => candidate.depth < *max_depth,
            GrowthState::LeafWise { max_depth, .. } => {
                max_depth.is_none_or(|d| candidate.depth < d)
            }
        };
        depth_ok && candidate.is_splittable()
    }

    /// Whether any node may still be expanded.
    pub fn should_continue(&self) -> bool {
        match self {
            GrowthState::DepthWise { current_level, .. } => {
                current_level.iter().any(|c| self.can_split(c))
            }
            GrowthState::LeafWise { max_leaves, candidates, n_leaves, .. } => {
                *n_leaves < *max_leaves && candidates.iter().any(|c| self.can_split(c))
            }
        }
    }

    /// Take the nodes to expand in this iteration.
    ///
    /// Depth-wise returns the whole current level (including nodes that will
    /// become leaves). Leaf-wise returns the single best splittable node;
    /// ties go to the earliest pushed candidate.
    pub fn pop_next(&mut self) -> Vec<NodeCandidate> {
        if let GrowthState::DepthWise { current_level, .. } = self {
            return std::mem::take(current_level);
        }
        let best = self.best_candidate();
        match (best, self) {
            (Some(i), GrowthState::LeafWise { candidates, n_leaves, .. }) => {
                // One leaf becomes two.
                *n_leaves += 1;
                vec![candidates.remove(i)]
            }
            _ => Vec::new(),
        }
    }

    fn best_candidate(&self) -> Option<usize> {
        let GrowthState::LeafWise { candidates, .. } = self else {
            return None;
        };
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in candidates.iter().enumerate() {
            if self.can_split(c) && best.is_none_or(|(_, g)| c.gain() > g) {
                best = Some((i, c.gain()));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Move to the next iteration (depth-wise: next level).
    pub fn advance(&mut self) {
        if let GrowthState::DepthWise { current_level, next_level, .. } = self {
            *current_level = std::mem::take(next_level);
        }
    }

    /// Remove every open candidate; they all become leaves.
    pub fn drain_remaining(&mut self) -> Vec<NodeCandidate> {
        match self {
            GrowthState::DepthWise { current_level, next_level, .. } => {
                let mut rest = std::mem::take(current_level);
                rest.append(next_level);
                rest
            }
            GrowthState::LeafWise { candidates, .. } => std::mem::take(candidates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tree_node: u32, depth: u32, gain: Option<f64>) -> NodeCandidate {
        NodeCandidate {
            tree_node,
            rows: vec![0, 1],
            depth,
            grad_sum: 0.0,
            hess_sum: 1.0,
            split: gain.map(|gain| SplitInfo {
                feature: 0,
                threshold: 0.5,
                default_left: true,
                gain,
            }),
        }
    }

    #[test]
    fn test_growth_strategy_depth_wise() {
        let mut state = GrowthStrategy::DepthWise { max_depth: 2 }.init();
        state.push_root(candidate(0, 0, Some(1.0)));
        assert!(state.should_continue());

        let nodes = state.pop_next();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tree_node, 0);

        state.push(candidate(1, 1, Some(0.5)));
        state.push(candidate(2, 1, None));
        state.advance();
        assert_eq!(state.pop_next().len(), 2);

        // Depth 2 nodes are at the limit.
        state.push(candidate(3, 2, Some(0.5)));
        state.advance();
        assert!(!state.should_continue());
        assert_eq!(state.drain_remaining().len(), 1);
    }

    #[test]
    fn test_growth_strategy_leaf_wise() {
        let mut state = GrowthStrategy::LeafWise { max_leaves: 10, max_depth: None }.init();
        state.push_root(candidate(0, 0, Some(0.5)));
        state.push(candidate(1, 0, Some(0.8)));
        state.push(candidate(2, 0, Some(0.8)));

        // Highest gain first, earliest on ties.
        let nodes = state.pop_next();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tree_node, 1);
        assert!((nodes[0].gain() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn leaf_wise_stops_at_max_leaves() {
        let mut state = GrowthStrategy::LeafWise { max_leaves: 2, max_depth: None }.init();
        state.push_root(candidate(0, 0, Some(1.0)));
        assert!(state.should_continue());
        let _ = state.pop_next();
        state.push(candidate(1, 1, Some(1.0)));
        state.push(candidate(2, 1, Some(1.0)));
        assert!(!state.should_continue());
        assert_eq!(state.drain_remaining().len(), 2);
    }

    #[test]
    fn leaf_wise_respects_depth_cap() {
        let mut state = GrowthStrategy::LeafWise { max_leaves: 8, max_depth: Some(1) }.init();
        state.push_root(candidate(0, 1, Some(1.0)));
        assert!(!state.should_continue());
        assert!(state.pop_next().is_empty());
    }
}
