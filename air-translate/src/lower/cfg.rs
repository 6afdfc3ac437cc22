//! Recovers the structured control flow (selection/loop merge blocks) a
//! SPIR-V function needs from an LLVM function's basic-block graph.
//!
//! AIR functions compile down from C++-like source with structured `if`/
//! `for`/`while`, so the LLVM CFG `clang` emits is already reducible; this
//! builds a dominator tree over it and derives each branch's merge block
//! from nearest-common-successor, rather than attempting a general
//! (potentially irreducible) relooper.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::TranslationError;

pub type BlockIndex = usize;

pub struct ControlFlowGraph {
    pub successors: Vec<Vec<BlockIndex>>,
    pub predecessors: Vec<Vec<BlockIndex>>,
    dominators: Vec<FxHashSet<BlockIndex>>,
}

impl ControlFlowGraph {
    pub fn build(
        function_name: &str,
        block_count: usize,
        edges: &[(BlockIndex, BlockIndex)],
    ) -> Result<Self, TranslationError> {
        let mut successors = vec![Vec::new(); block_count];
        let mut predecessors = vec![Vec::new(); block_count];
        for &(from, to) in edges {
            successors[from].push(to);
            predecessors[to].push(from);
        }

        let dominators = compute_dominators(block_count, &predecessors);

        let cfg = Self { successors, predecessors, dominators };
        if cfg.has_irreducible_loop() {
            return Err(TranslationError::IrreducibleControlFlow {
                name: function_name.to_string(),
            });
        }
        Ok(cfg)
    }

    pub fn dominates(&self, a: BlockIndex, b: BlockIndex) -> bool {
        self.dominators[b].contains(&a)
    }

    pub fn is_back_edge(&self, from: BlockIndex, to: BlockIndex) -> bool {
        self.dominates(to, from)
    }

    /// A cycle is irreducible when some predecessor of a loop header isn't
    /// dominated by that header — i.e. the loop has more than one entry.
    /// Dominator sets already capture this: `has_irreducible_loop` exists as
    /// the one place that check lives, so `lower` can bail out with
    /// `IrreducibleControlFlow` instead of emitting a malformed merge.
    fn has_irreducible_loop(&self) -> bool {
        for (block, preds) in self.predecessors.iter().enumerate() {
            for &pred in preds {
                let is_back_edge = self.dominates(block, pred);
                if !is_back_edge {
                    continue;
                }
                // `pred` reaches `block` through a back edge; every other
                // predecessor of `block` must be dominated by `block` too,
                // or this cycle has a second entry point.
                let other_entries = preds
                    .iter()
                    .any(|&p| p != pred && !self.dominates(block, p) && !self.dominates(p, block));
                if other_entries {
                    return true;
                }
            }
        }
        false
    }

    /// The first block both `a` and `b` eventually reach, used as a
    /// selection merge target for an `if`/`else` whose arms rejoin.
    pub fn nearest_common_successor(&self, a: BlockIndex, b: BlockIndex) -> Option<BlockIndex> {
        let reachable_from = |start: BlockIndex| -> FxHashMap<BlockIndex, usize> {
            let mut dist = FxHashMap::default();
            let mut queue = std::collections::VecDeque::new();
            dist.insert(start, 0);
            queue.push_back(start);
            while let Some(cur) = queue.pop_front() {
                let d = dist[&cur];
                for &next in &self.successors[cur] {
                    if !dist.contains_key(&next) {
                        dist.insert(next, d + 1);
                        queue.push_back(next);
                    }
                }
            }
            dist
        };

        let from_a = reachable_from(a);
        let from_b = reachable_from(b);

        from_a
            .iter()
            .filter(|(block, _)| from_b.contains_key(*block))
            .min_by_key(|(block, dist)| *dist + from_b[*block])
            .map(|(block, _)| *block)
    }
}

fn compute_dominators(
    block_count: usize,
    predecessors: &[Vec<BlockIndex>],
) -> Vec<FxHashSet<BlockIndex>> {
    let all: FxHashSet<BlockIndex> = (0..block_count).collect();
    let mut dom = vec![all.clone(); block_count];
    if block_count > 0 {
        dom[0] = [0].into_iter().collect();
    }

    let mut changed = true;
    while changed {
        changed = false;
        for block in 1..block_count {
            if predecessors[block].is_empty() {
                continue;
            }
            let mut new_dom = all.clone();
            for &pred in &predecessors[block] {
                new_dom = new_dom.intersection(&dom[pred]).copied().collect();
            }
            new_dom.insert(block);
            if new_dom != dom[block] {
                dom[block] = new_dom;
                changed = true;
            }
        }
    }
    dom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_merges_at_the_join_block() {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let edges = [(0, 1), (0, 2), (1, 3), (2, 3)];
        let cfg = ControlFlowGraph::build("f", 4, &edges).unwrap();
        assert_eq!(cfg.nearest_common_successor(1, 2), Some(3));
        assert!(cfg.dominates(0, 3));
        assert!(!cfg.is_back_edge(1, 3));
    }

    #[test]
    fn back_edge_is_detected() {
        // 0 -> 1, 1 -> 2, 2 -> 1 (loop), 2 -> 3
        let edges = [(0, 1), (1, 2), (2, 1), (2, 3)];
        let cfg = ControlFlowGraph::build("f", 4, &edges).unwrap();
        assert!(cfg.is_back_edge(2, 1));
        assert!(!cfg.is_back_edge(0, 1));
    }
}
