// src/ir/cfg.rs
use super::graph::{Graph, NodeId};
use super::mode::Mode;
use super::node::NodeKind;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::HashMap;

/// A block-level view of the sea of nodes.
///
/// Derived on demand from a [`Graph`]: one petgraph node per live Block, one
/// edge per control predecessor. Used for reachability queries and for
/// ordering blocks deterministically when printing.
#[derive(Debug)]
pub struct CfgView {
    graph: DiGraph<NodeId, ()>,
    index_of: HashMap<NodeId, NodeIndex>,
    entry: NodeIndex,
}

impl CfgView {
    /// Builds the block view of `ir`.
    #[must_use]
    pub fn build(ir: &Graph) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();
        let blocks = ir.live_blocks();
        for &b in &blocks {
            index_of.insert(b, graph.add_node(b));
        }
        for &b in &blocks {
            for &pred_x in ir.inputs(b) {
                if ir.is_bad(pred_x) || ir.mode(pred_x) != Mode::X {
                    continue;
                }
                let src = ir.block_of(pred_x);
                if let (Some(&from), Some(&to)) = (index_of.get(&src), index_of.get(&b)) {
                    graph.add_edge(from, to, ());
                }
            }
        }
        let entry = index_of[&ir.start_block()];
        Self { graph, index_of, entry }
    }

    /// Whether `block` is reachable from the start block.
    #[must_use]
    pub fn is_reachable(&self, block: NodeId) -> bool {
        let Some(&target) = self.index_of.get(&block) else { return false };
        let mut dfs = Dfs::new(&self.graph, self.entry);
        while let Some(idx) = dfs.next(&self.graph) {
            if idx == target {
                return true;
            }
        }
        false
    }

    /// Blocks reachable from the start block, in reverse post-order.
    #[must_use]
    pub fn reverse_post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut dfs = petgraph::visit::DfsPostOrder::new(&self.graph, self.entry);
        while let Some(idx) = dfs.next(&self.graph) {
            order.push(self.graph[idx]);
        }
        order.reverse();
        order
    }

    /// All viewed blocks that the reverse post-order does not reach
    /// (kept-alive or floating blocks), in arena order.
    #[must_use]
    pub fn unreached_blocks(&self) -> Vec<NodeId> {
        let reached: std::collections::HashSet<NodeId> = self.reverse_post_order().into_iter().collect();
        let mut rest: Vec<NodeId> = self.graph.node_weights().copied().filter(|b| !reached.contains(b)).collect();
        rest.sort_unstable();
        rest
    }
}

/// Convenience predicate used by verification and tests.
#[must_use]
pub fn block_is_reachable(ir: &Graph, block: NodeId) -> bool {
    debug_assert!(matches!(ir.kind(block), NodeKind::Block { .. }));
    CfgView::build(ir).is_reachable(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachability_and_rpo() {
        let mut g = Graph::new("t");
        let b0 = g.start_block();
        let b1 = g.new_block(false);
        let b2 = g.new_block(false);
        let j0 = g.new_jmp(b0);
        g.add_block_pred(b1, j0);
        let j1 = g.new_jmp(b1);
        g.add_block_pred(g.end_block(), j1);
        // b2 floats: no predecessors, kept alive explicitly
        let mem = g.new_proj(g.start(), Mode::M, crate::ir::node::PN_MEM);
        let _ret = g.new_return(b2, mem, vec![]);
        g.add_end_keepalive(b2);

        let view = CfgView::build(&g);
        assert!(view.is_reachable(b1));
        assert!(!view.is_reachable(b2));
        let rpo = view.reverse_post_order();
        assert_eq!(rpo.first(), Some(&b0));
        assert!(view.unreached_blocks().contains(&b2));
    }
}
