//! Statistics tracked by the combined optimization pass.

use std::fmt;

/// Counters describing what one run of the pass did to a graph.
///
/// All counters are cumulative across multiple graph optimizations.
#[derive(Debug, Clone, Default)]
pub struct CombinedStats {
    /// Nodes replaced by fresh Const/SymConst nodes.
    pub constants_materialized: usize,
    /// Nodes redirected to a congruent leader.
    pub nodes_merged: usize,
    /// Blocks proven unreachable and detached.
    pub blocks_killed: usize,
    /// Single-predecessor blocks fused into their predecessor.
    pub blocks_fused: usize,
    /// Cond/Switch projections collapsed into plain jumps.
    pub control_flows_folded: usize,
    /// Memory values preserved through End keepalives.
    pub memory_keeps: usize,
    /// Partitions alive at the fixed point (last graph).
    pub partitions: usize,
}

impl CombinedStats {
    /// Whether the rewriter changed the graph at all.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.constants_materialized != 0
            || self.nodes_merged != 0
            || self.blocks_killed != 0
            || self.blocks_fused != 0
            || self.control_flows_folded != 0
    }
}

impl fmt::Display for CombinedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constants, {} merges, {} dead blocks, {} fused blocks, {} folded branches, {} memory keeps, {} partitions",
            self.constants_materialized,
            self.nodes_merged,
            self.blocks_killed,
            self.blocks_fused,
            self.control_flows_folded,
            self.memory_keeps,
            self.partitions
        )
    }
}
