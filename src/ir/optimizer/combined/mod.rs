//! Combined Optimization Pass
//!
//! This module implements Click's combined algorithm: sparse conditional
//! constant propagation, global congruence-class discovery (value numbering)
//! and unreachable-code elimination solved together in one fixed point over
//! the SSA graph.
//!
//! # Algorithm Overview
//!
//! The pass keeps two cooperating structures per graph:
//!
//! - a lattice element per node (Top → constant → Bottom, with the dedicated
//!   pair Unreachable → Reachable for control), and
//! - a partition of all nodes into congruence classes, refined from "all
//!   nodes equal" downwards.
//!
//! The two interact: type information splits partitions, partition identity
//! sharpens types (`x - x = 0`, `Cmp(x, x)`), and both feed reachability.
//! Solving them together finds strictly more than running the classic
//! separate passes to their own fixed points.
//!
//! # Invariants
//!
//! 1. **Monotonicity**: lattice elements only descend; the sole non-monotone
//!    transfer (a control projection of a folded branch) is absorbed by an
//!    irrevocable Reachable latch.
//! 2. **Partition soundness**: leaders of one class agree on opcode, mode,
//!    arity and attributes, and their operands on partitions; followers
//!    resolve to a member of their own class through an algebraic identity.
//! 3. **Termination**: every retype strictly descends a finite lattice and
//!    every split strictly grows the partition count.
//!
//! # Phases
//!
//! 1. **Initialization**: one walk builds node wrappers, sorted def-use
//!    copies and the initial single partition; the start block is seeded.
//! 2. **Solving**: constant propagation and partition refinement alternate
//!    until both worklists are empty.
//! 3. **Rewriting**: the fixed point is applied to the graph (constants
//!    materialized, congruent nodes merged, dead control flow cut, memory
//!    keepalives preserved).
//!
//! # Example
//!
//! ```rust,ignore
//! use seaopt::ir::optimizer::combined::CombinedOptimizer;
//!
//! let mut optimizer = CombinedOptimizer::default();
//! let changed = optimizer.optimize_graph(&mut graph, &entities)?;
//! println!("{}", optimizer.stats());
//! ```

pub mod congruence;
pub mod lattice;
pub mod partition;
pub mod rewriter;
pub mod solver;
pub mod stats;
pub mod transfer;

pub use lattice::LatticeValue;
pub use rewriter::Rewriter;
pub use solver::{SolveResult, Solver};
pub use stats::CombinedStats;

use crate::error::OptimizeError;
use crate::ir::entity::EntityTable;
use crate::ir::graph::Graph;
use crate::ir::module::Module;
use crate::ir::optimizer::phase::Phase;
use crate::ir::verify::verify;
use console::style;

/// Configuration of the combined pass.
///
/// The policy bits select between legal alternatives; none of them affects
/// soundness.
#[derive(Debug, Clone)]
pub struct CombinedConfig {
    /// Whether an `Unknown` node computes Top (aggressive: dead code that
    /// consumes it may fold away) or Bottom (conservative).
    pub unknown_as_top: bool,
    /// Recognize `op(a,b)` and `op(b,a)` as congruent for commutative
    /// opcodes.
    pub commutative: bool,
    /// Ignore the block edge of unpinned computations, letting congruent
    /// nodes in different blocks share a class.
    pub gcse: bool,
    /// Assert that every retype descends the lattice.
    pub verify_monotone: bool,
    /// Check all partition invariants at the fixed point.
    pub check_partitions: bool,
    /// Emit diagnostics (e.g. for control flow left unoptimized).
    pub verbose: bool,
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            unknown_as_top: false,
            commutative: true,
            gcse: false,
            verify_monotone: cfg!(debug_assertions),
            check_partitions: cfg!(debug_assertions),
            verbose: false,
        }
    }
}

/// Facade orchestrating solver and rewriter over graphs and modules.
#[derive(Default)]
pub struct CombinedOptimizer {
    config: CombinedConfig,
    stats: CombinedStats,
}

impl CombinedOptimizer {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { config: CombinedConfig { verbose, ..CombinedConfig::default() }, stats: CombinedStats::default() }
    }

    #[must_use]
    pub fn with_config(config: CombinedConfig) -> Self {
        Self { config, stats: CombinedStats::default() }
    }

    #[must_use]
    pub const fn stats(&self) -> &CombinedStats {
        &self.stats
    }

    /// Optimizes a single graph to its combined fixed point.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::RejectedInput`] when the graph fails the
    /// structural verification the solver relies on. The graph is not
    /// touched in that case; partial results are never emitted.
    pub fn optimize_graph(&mut self, ir: &mut Graph, entities: &EntityTable) -> Result<bool, OptimizeError> {
        verify(ir).map_err(|source| OptimizeError::RejectedInput { graph: ir.name.to_string(), source })?;

        let result = Solver::new(ir, entities, &self.config).solve();
        let (stats, changed) = Rewriter::new(ir, result, self.config.verbose).rewrite();

        self.stats.constants_materialized += stats.constants_materialized;
        self.stats.nodes_merged += stats.nodes_merged;
        self.stats.blocks_killed += stats.blocks_killed;
        self.stats.blocks_fused += stats.blocks_fused;
        self.stats.control_flows_folded += stats.control_flows_folded;
        self.stats.memory_keeps += stats.memory_keeps;
        self.stats.partitions = stats.partitions;

        if self.config.verbose {
            eprintln!("{} {}: {}", style("combined").green().bold(), ir.name, stats);
        }
        Ok(changed)
    }
}

impl Phase for CombinedOptimizer {
    fn name(&self) -> &'static str {
        "Combined Optimization (CCP + GVN + UCE)"
    }

    fn run(&mut self, module: &mut Module) -> Result<bool, OptimizeError> {
        let entities = module.entities.clone();
        let mut changed = false;
        for graph in &mut module.graphs {
            changed |= self.optimize_graph(graph, &entities)?;
        }
        Ok(changed)
    }
}
