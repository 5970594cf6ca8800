//! Rewriting the graph from the solver's fixed point.
//!
//! Four walks, in order: collect memory values that must survive as End
//! keepalives, apply control-flow results per block, apply per-node results
//! (constants, congruence merges, folded branches), then rebuild the End
//! keepalive list. Replaced nodes become `Bad` tombstones that the next
//! live walk never visits, which makes the whole pass idempotent.

use super::lattice::LatticeValue;
use super::solver::SolveResult;
use super::stats::CombinedStats;
use console::style;

use crate::ir::graph::{Graph, NodeId};
use crate::ir::mode::Mode;
use crate::ir::node::{NodeKind, Opcode, SymKind};
use crate::ir::tarval::Tarval;
use std::collections::HashMap;

/// Applies the solved state to the graph.
pub struct Rewriter<'a> {
    ir: &'a mut Graph,
    result: SolveResult,
    stats: CombinedStats,
    changed: bool,
    verbose: bool,
    /// Reachable predecessor blocks of detached blocks; kept alive.
    block_keeps: Vec<NodeId>,
    /// Memory values without a reachable user; kept alive.
    memory_keeps: Vec<NodeId>,
    /// Materialized constants, shared across replacements.
    const_cache: HashMap<Tarval, NodeId>,
    /// Switches already reported as left unoptimized.
    warned_switches: Vec<NodeId>,
}

impl<'a> Rewriter<'a> {
    #[must_use]
    pub fn new(ir: &'a mut Graph, result: SolveResult, verbose: bool) -> Self {
        Self {
            ir,
            result,
            stats: CombinedStats::default(),
            changed: false,
            verbose,
            block_keeps: Vec::new(),
            memory_keeps: Vec::new(),
            const_cache: HashMap::new(),
            warned_switches: Vec::new(),
        }
    }

    fn materialize_const(&mut self, tv: Tarval) -> NodeId {
        if let Some(&c) = self.const_cache.get(&tv) {
            return c;
        }
        let c = self.ir.new_const(tv);
        self.const_cache.insert(tv, c);
        c
    }

    /// Runs all rewriting walks. Returns the statistics; the graph was
    /// modified iff [`CombinedStats::changed`] or the keepalive set moved.
    pub fn rewrite(mut self) -> (CombinedStats, bool) {
        self.stats.partitions = self.result.partition_count();
        self.collect_memory_keeps();
        self.apply_control_flow();
        self.apply_nodes();
        self.cleanup_end();
        (self.stats, self.changed)
    }

    /// Solved element of `n`. Nodes created during rewriting have no solver
    /// entry; they are live by construction.
    fn lattice(&self, n: NodeId) -> LatticeValue {
        if n.index() < self.result.store.infos.len() {
            self.result.lattice(n)
        } else if self.ir.mode(n) == Mode::X {
            LatticeValue::Reachable
        } else {
            LatticeValue::Bottom
        }
    }

    fn block_reachable(&self, n: NodeId) -> bool {
        self.lattice(self.ir.block_of(n)) == LatticeValue::Reachable
    }

    // -- walk 1: memory keepalives -------------------------------------------

    /// A mode-M node in a reachable block whose users all sit in dead code
    /// carries a live side effect that no later pass may drop.
    fn collect_memory_keeps(&mut self) {
        for &n in &self.result.live {
            if self.ir.mode(n) != Mode::M || !self.block_reachable(n) {
                continue;
            }
            let dead_users = self.result.store.info(n).outs.iter().all(|u| {
                matches!(self.lattice(u.node), LatticeValue::Unreachable | LatticeValue::Top)
                    || !self.block_reachable(u.node)
            });
            if dead_users {
                self.memory_keeps.push(n);
            }
        }
    }

    // -- walk 2: control flow ------------------------------------------------

    fn apply_control_flow(&mut self) {
        let blocks: Vec<NodeId> = self
            .result
            .live
            .clone()
            .into_iter()
            .filter(|&n| matches!(self.ir.kind(n), NodeKind::Block { .. }))
            .collect();
        for block in blocks {
            if self.lattice(block) != LatticeValue::Reachable {
                self.detach_dead_block(block);
                continue;
            }
            self.prune_dead_preds(block);
            self.fold_single_projs(block);
            self.simplify_phis(block);
            self.try_fuse_block(block);
        }
    }

    fn detach_dead_block(&mut self, block: NodeId) {
        let preds = self.ir.inputs(block).to_vec();
        if preds.is_empty() {
            return;
        }
        for &pred_x in &preds {
            let src = self.ir.block_of(pred_x);
            // the start block is an anchor and needs no keepalive
            if self.lattice(src) == LatticeValue::Reachable && src != self.ir.start_block() {
                self.block_keeps.push(src);
            }
        }
        self.ir.set_inputs(block, vec![]);
        self.stats.blocks_killed += 1;
        self.changed = true;
    }

    /// Shortens the block's input list and every Phi in it, in the same
    /// order, to the Reachable control predecessors.
    fn prune_dead_preds(&mut self, block: NodeId) {
        let preds = self.ir.inputs(block).to_vec();
        let live_pos: Vec<usize> =
            (0..preds.len()).filter(|&i| self.lattice(preds[i]) == LatticeValue::Reachable).collect();
        if live_pos.len() == preds.len() {
            return;
        }
        self.ir.set_inputs(block, live_pos.iter().map(|&i| preds[i]).collect());
        for phi in self.phis_of(block) {
            let ins = self.ir.inputs(phi).to_vec();
            self.ir.set_inputs(phi, live_pos.iter().map(|&i| ins[i]).collect());
        }
        self.changed = true;
    }

    fn phis_of(&self, block: NodeId) -> Vec<NodeId> {
        self.result
            .block_phis
            .get(&block)
            .map(|phis| phis.iter().copied().filter(|&p| !self.ir.is_bad(p)).collect())
            .unwrap_or_default()
    }

    fn simplify_phis(&mut self, block: NodeId) {
        for phi in self.phis_of(block) {
            match self.lattice(phi) {
                LatticeValue::Constant(tv) => {
                    let c = self.materialize_const(tv);
                    self.ir.exchange(phi, c);
                    self.stats.constants_materialized += 1;
                    self.changed = true;
                }
                LatticeValue::Address(e) => {
                    let mode = self.ir.mode(phi);
                    let c = self.ir.new_symconst(SymKind::Address(e), mode);
                    self.ir.exchange(phi, c);
                    self.stats.constants_materialized += 1;
                    self.changed = true;
                }
                _ => {
                    if self.ir.arity(phi) == 1 {
                        let input = self.ir.input(phi, 0);
                        if input != phi {
                            self.ir.exchange(phi, input);
                            self.changed = true;
                        }
                    }
                }
            }
        }
    }

    /// A Cond/Switch projection that is the only Reachable output of its
    /// selector becomes a plain Jmp, so the surviving edge is fusable. A
    /// constant Switch selector that still leaves several outputs
    /// Reachable is reported and left alone.
    fn fold_single_projs(&mut self, block: NodeId) {
        for pred in self.ir.inputs(block).to_vec() {
            if self.ir.is_bad(pred) || self.ir.opcode(pred) != Opcode::Proj {
                continue;
            }
            let tuple = self.ir.input(pred, 0);
            let tuple_op = self.ir.opcode(tuple);
            if !matches!(tuple_op, Opcode::Cond | Opcode::Switch) {
                continue;
            }
            let reachable_siblings = self
                .result
                .store
                .info(tuple)
                .outs
                .iter()
                .filter(|u| {
                    self.ir.opcode(u.node) == Opcode::Proj && self.lattice(u.node) == LatticeValue::Reachable
                })
                .count();
            if reachable_siblings == 1 {
                let jmp = self.ir.new_jmp(self.ir.block_of(tuple));
                self.ir.exchange(pred, jmp);
                self.stats.control_flows_folded += 1;
                self.changed = true;
            } else if tuple_op == Opcode::Switch
                && self.lattice(self.ir.input(tuple, 0)).is_constant()
                && !self.warned_switches.contains(&tuple)
            {
                // unoptimized control flow: a dead case keeps a second
                // output alive, e.g. an unreachable switch case in the
                // source program
                self.warned_switches.push(tuple);
                if self.verbose {
                    eprintln!(
                        "{} switch in {} has a constant selector but several live outputs",
                        style("note:").cyan().bold(),
                        self.ir.name
                    );
                }
            }
        }
    }

    /// A reachable block with a single Jmp predecessor folds into the
    /// jump's block (never the start or end block, never a labeled block).
    fn try_fuse_block(&mut self, block: NodeId) {
        if block == self.ir.start_block() || block == self.ir.end_block() {
            return;
        }
        if matches!(self.ir.kind(block), NodeKind::Block { labeled: true }) {
            return;
        }
        let preds = self.ir.inputs(block);
        if preds.len() != 1 {
            return;
        }
        let jmp = preds[0];
        if self.ir.opcode(jmp) != Opcode::Jmp {
            return;
        }
        let src = self.ir.block_of(jmp);
        debug_assert!(self.phis_of(block).is_empty(), "fusing a block with live Phis");
        self.ir.exchange(block, src);
        self.stats.blocks_fused += 1;
        self.changed = true;
    }

    // -- walk 3: nodes -------------------------------------------------------

    fn apply_nodes(&mut self) {
        for &n in &self.result.live.clone() {
            if self.ir.is_bad(n)
                || matches!(self.ir.kind(n), NodeKind::Block { .. })
                || n == self.ir.start()
                || n == self.ir.end()
            {
                continue;
            }
            if !self.block_reachable(n) {
                let bad = self.ir.new_bad(self.ir.mode(n));
                self.ir.exchange(n, bad);
                self.changed = true;
                continue;
            }
            match self.lattice(n) {
                LatticeValue::Top => self.apply_top(n),
                LatticeValue::Constant(tv) => {
                    if !matches!(self.ir.kind(n), NodeKind::Const { value } if *value == tv) {
                        let c = self.materialize_const(tv);
                        self.ir.exchange(n, c);
                        self.stats.constants_materialized += 1;
                        self.changed = true;
                    }
                }
                LatticeValue::Address(e) => {
                    if !matches!(self.ir.kind(n), NodeKind::SymConst { kind: SymKind::Address(a) } if *a == e) {
                        let mode = self.ir.mode(n);
                        let c = self.ir.new_symconst(SymKind::Address(e), mode);
                        self.ir.exchange(n, c);
                        self.stats.constants_materialized += 1;
                        self.changed = true;
                    }
                }
                LatticeValue::Bottom => self.apply_leader_merge(n),
                LatticeValue::Reachable | LatticeValue::Unreachable => {}
            }
        }
    }

    fn apply_top(&mut self, n: NodeId) {
        let mode = self.ir.mode(n);
        // a memory projection of a dead tuple skips to the memory the tuple
        // itself consumed
        if mode == Mode::M && self.ir.opcode(n) == Opcode::Proj {
            let pred = self.ir.input(n, 0);
            if self.lattice(pred).is_top_like() && self.ir.arity(pred) > 0 {
                let mem = self.ir.input(pred, 0);
                if self.ir.mode(mem) == Mode::M && mem != n && !self.ir.is_bad(mem) && self.block_reachable(mem) {
                    self.ir.exchange(n, mem);
                    self.changed = true;
                }
            }
            return;
        }
        if matches!(mode, Mode::M | Mode::X | Mode::T | Mode::BB) {
            return;
        }
        if self.ir.opcode(n) == Opcode::Unknown {
            return;
        }
        let unknown = self.ir.new_unknown(mode);
        self.ir.exchange(n, unknown);
        self.changed = true;
    }

    /// Followers and members of multi-leader partitions are redirected to
    /// the canonical leader (the live one with the smallest id), with a
    /// Conv inserted on mode mismatch.
    fn apply_leader_merge(&mut self, n: NodeId) {
        if !self.result.is_follower(n) && self.result.leaders_of(n).len() <= 1 {
            return;
        }
        // a Phi fed by Unknown must not collapse onto a stronger leader
        if self.ir.opcode(n) == Opcode::Phi
            && self.ir.inputs(n).iter().any(|&i| self.ir.opcode(i) == Opcode::Unknown)
        {
            return;
        }
        let leader = self
            .result
            .leaders_of(n)
            .iter()
            .copied()
            .filter(|&l| l != n && !self.ir.is_bad(l) && self.block_reachable(l))
            .min();
        let Some(leader) = leader else { return };
        if !self.result.is_follower(n) && leader > n {
            // n itself is the canonical representative
            return;
        }
        let mode = self.ir.mode(n);
        if self.ir.mode(leader) == mode {
            self.ir.exchange(n, leader);
        } else {
            let conv = self.ir.new_conv(self.ir.block_of(leader), leader, mode);
            self.ir.exchange(n, conv);
        }
        self.stats.nodes_merged += 1;
        self.changed = true;
    }

    // -- walk 4: End keepalives ----------------------------------------------

    fn cleanup_end(&mut self) {
        let old = self.ir.keepalives().to_vec();
        let mut keeps: Vec<NodeId> = old
            .iter()
            .copied()
            .filter(|&k| {
                if self.ir.is_bad(k) {
                    return false;
                }
                !matches!(self.lattice(k), LatticeValue::Unreachable | LatticeValue::Top)
            })
            .collect();
        for &b in &self.block_keeps {
            if !self.ir.is_bad(b) && !keeps.contains(&b) {
                keeps.push(b);
            }
        }
        for &m in &self.memory_keeps {
            if !self.ir.is_bad(m) && !keeps.contains(&m) {
                keeps.push(m);
            }
        }
        self.stats.memory_keeps = self.memory_keeps.len();
        if keeps != old {
            self.ir.set_end_keepalives(keeps);
            self.changed = true;
        }
    }
}
