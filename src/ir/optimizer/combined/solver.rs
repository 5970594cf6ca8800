//! The two-worklist fixed point of the combined pass.
//!
//! The solver interleaves constant propagation (queue `C`, partitions whose
//! members need retyping) with partition refinement (queue `W`, partitions
//! whose users need re-splitting). `C` is always drained completely before
//! the next `W` entry is taken, and within one partition the data queue is
//! drained before the Cond/Switch queue so a selector settles before its
//! control projections flip. Types only descend; every split strictly
//! increases the partition count. Both are bounded, so the loop terminates.

use super::CombinedConfig;
use super::congruence::{CongruenceView, congruence_start_idx, identity, is_real_follower, opcode_key};
use super::lattice::LatticeValue;
use super::partition::{PartitionId, PartitionStore};
use super::transfer::{TransferView, top_of, transfer};
use crate::ir::entity::EntityTable;
use crate::ir::graph::{Graph, NodeId, POS_BLOCK};
use crate::ir::mode::Mode;
use crate::ir::node::Opcode;
use std::collections::{HashMap, VecDeque};

/// Characteristic used by one `split_by_what` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SplitKey {
    Type(LatticeValue),
    Op(super::congruence::OpcodeKey),
    Input(usize),
    /// Dead Phi inputs do not participate in congruence.
    Ignored,
}

struct View<'s> {
    store: &'s PartitionStore,
    unknown_as_top: bool,
}

impl CongruenceView for View<'_> {
    fn lattice(&self, n: NodeId) -> LatticeValue {
        self.store.lattice(n)
    }

    fn partition_tag(&self, n: NodeId) -> usize {
        self.store.partition_tag(n)
    }
}

impl TransferView for View<'_> {
    fn unknown_as_top(&self) -> bool {
        self.unknown_as_top
    }
}

/// The state the solver hands to the rewriter at the fixed point.
pub struct SolveResult {
    pub store: PartitionStore,
    pub block_phis: HashMap<NodeId, Vec<NodeId>>,
    pub live: Vec<NodeId>,
}

impl SolveResult {
    #[must_use]
    pub fn lattice(&self, n: NodeId) -> LatticeValue {
        self.store.lattice(n)
    }

    #[must_use]
    pub fn is_follower(&self, n: NodeId) -> bool {
        self.store.info(n).is_follower
    }

    /// Opaque congruence-class tag; equal tags mean "same partition".
    #[must_use]
    pub fn partition_of(&self, n: NodeId) -> usize {
        self.store.partition_tag(n)
    }

    /// The leader list of the partition `n` belongs to.
    #[must_use]
    pub fn leaders_of(&self, n: NodeId) -> &[NodeId] {
        &self.store.parts[self.store.info(n).part].leaders
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.store.parts.len()
    }
}

/// Runs the combined analysis to its fixed point over one graph.
pub struct Solver<'a> {
    ir: &'a Graph,
    entities: &'a EntityTable,
    config: &'a CombinedConfig,
    store: PartitionStore,
    /// `W`: partitions pending refinement by inputs/opcode.
    worklist: VecDeque<PartitionId>,
    /// `C`: partitions with non-empty cprop queues.
    cprop_list: VecDeque<PartitionId>,
    touched_list: Vec<PartitionId>,
    block_phis: HashMap<NodeId, Vec<NodeId>>,
    live: Vec<NodeId>,
}

impl<'a> Solver<'a> {
    #[must_use]
    pub fn new(ir: &'a Graph, entities: &'a EntityTable, config: &'a CombinedConfig) -> Self {
        let mut solver = Self {
            ir,
            entities,
            config,
            store: PartitionStore::new(ir.len()),
            worklist: VecDeque::new(),
            cprop_list: VecDeque::new(),
            touched_list: Vec::new(),
            block_phis: HashMap::new(),
            live: Vec::new(),
        };
        solver.init();
        solver
    }

    /// One walk: wrappers for every live node, def-use copies restricted to
    /// live users, every node into the initial partition, per-block Phi
    /// lists. Seeds the start block.
    fn init(&mut self) {
        self.live = self.ir.walk_live();
        for &n in &self.live {
            self.store.info_mut(n).live = true;
        }
        let p0 = self.store.new_partition();
        for &n in &self.live.clone() {
            let outs: Vec<_> =
                self.ir.users(n).iter().filter(|u| self.store.info(u.node).live).copied().collect();
            let info = self.store.info_mut(n);
            info.lattice = top_of(self.ir.mode(n));
            info.outs = outs;
            self.store.insert_leader(n, p0);
            if self.ir.opcode(n) == Opcode::Phi {
                self.block_phis.entry(self.ir.block_of(n)).or_default().push(n);
            }
        }
        self.store.refresh(p0);
        self.add_to_cprop(self.ir.start_block());
    }

    /// Runs to the fixed point and returns the final state.
    #[must_use]
    pub fn solve(mut self) -> SolveResult {
        loop {
            self.propagate();
            match self.worklist.pop_front() {
                Some(x) => self.cause_splits(x),
                None => break,
            }
        }
        if self.config.check_partitions {
            self.store.check_partitions(self.ir);
        }
        SolveResult { store: self.store, block_phis: self.block_phis, live: self.live }
    }

    fn lattice(&self, n: NodeId) -> LatticeValue {
        self.store.lattice(n)
    }

    /// Whether retypes of `n` go to the control queue: Cond, Switch and
    /// their projections settle after all data.
    fn is_cf_sensitive(&self, n: NodeId) -> bool {
        match self.ir.opcode(n) {
            Opcode::Cond | Opcode::Switch => true,
            Opcode::Proj => matches!(self.ir.opcode(self.ir.input(n, 0)), Opcode::Cond | Opcode::Switch),
            _ => false,
        }
    }

    fn schedule_cprop(&mut self, p: PartitionId) {
        if !self.store.parts[p].on_cprop_list {
            self.store.parts[p].on_cprop_list = true;
            self.cprop_list.push_back(p);
        }
    }

    fn schedule_worklist(&mut self, p: PartitionId) {
        if !self.store.parts[p].on_worklist {
            self.store.parts[p].on_worklist = true;
            self.worklist.push_back(p);
        }
    }

    /// Schedules a node for retyping on its partition's queue. Tuple nodes
    /// drag their projections along, blocks drag their Phis, so both
    /// re-evaluate whenever reachability shifts.
    fn add_to_cprop(&mut self, n: NodeId) {
        if !self.store.info(n).live {
            return;
        }
        if !self.store.info(n).on_cprop {
            self.store.info_mut(n).on_cprop = true;
            let p = self.store.info(n).part;
            if self.is_cf_sensitive(n) {
                self.store.parts[p].cprop_x.push_back(n);
            } else {
                self.store.parts[p].cprop.push_back(n);
            }
            self.schedule_cprop(p);
        }
        if self.ir.mode(n) == Mode::T {
            for e in self.store.info(n).outs.clone() {
                if self.ir.opcode(e.node) == Opcode::Proj {
                    self.add_to_cprop(e.node);
                }
            }
        }
        if self.ir.opcode(n) == Opcode::Block {
            if let Some(phis) = self.block_phis.get(&n).cloned() {
                for phi in phis {
                    self.add_to_cprop(phi);
                }
            }
        }
    }

    /// Splits `seeds` out of partition `x`, requeues moved pending retypes
    /// and schedules both halves for refinement.
    fn split_sched(&mut self, x: PartitionId, seeds: &[NodeId]) -> PartitionId {
        let outcome = self.store.split(self.ir, x, seeds);
        let new_part = outcome.new_part;
        for n in outcome.moved {
            if self.store.info(n).on_cprop {
                if self.is_cf_sensitive(n) {
                    self.store.parts[new_part].cprop_x.push_back(n);
                } else {
                    self.store.parts[new_part].cprop.push_back(n);
                }
                self.schedule_cprop(new_part);
            }
        }
        self.schedule_worklist(x);
        self.schedule_worklist(new_part);
        new_part
    }

    // -- constant propagation ------------------------------------------------

    /// Drains the whole `C` list: retypes every queued member, splits the
    /// fallen subset off its partition, demotes leaders whose algebraic
    /// identity now resolves inside the partition, and re-splits by
    /// characteristic.
    fn propagate(&mut self) {
        while let Some(x) = self.cprop_list.pop_front() {
            self.store.parts[x].on_cprop_list = false;
            let mut fallen: Vec<NodeId> = Vec::new();

            loop {
                let n = match self.store.parts[x].cprop.pop_front() {
                    Some(n) => n,
                    None => match self.store.parts[x].cprop_x.pop_front() {
                        Some(n) => n,
                        None => break,
                    },
                };
                if !self.store.info(n).on_cprop || self.store.info(n).part != x {
                    // stale entry: already processed, or moved and requeued
                    continue;
                }
                self.store.info_mut(n).on_cprop = false;

                // a follower whose identity collapsed onto itself is a
                // proper leader again
                if self.store.info(n).is_follower && identity(self.ir, &self.store, n) == n {
                    self.store.follower_to_leader(self.ir, n);
                    self.schedule_worklist(x);
                }

                let old = self.lattice(n);
                let new = {
                    let view = View { store: &self.store, unknown_as_top: self.config.unknown_as_top };
                    transfer(self.ir, self.entities, &view, n)
                };
                if new != old {
                    if self.config.verify_monotone {
                        assert!(old.descends_to(new), "non-monotone retype of {n}: {old} -> {new}");
                    }
                    self.store.info_mut(n).lattice = new;
                    if !self.store.info(n).on_fallen {
                        self.store.info_mut(n).on_fallen = true;
                        fallen.push(n);
                    }
                    for e in self.store.info(n).outs.clone() {
                        self.add_to_cprop(e.node);
                    }
                }
            }

            for &f in &fallen {
                self.store.info_mut(f).on_fallen = false;
            }
            let fallen_leaders: Vec<NodeId> = fallen
                .into_iter()
                .filter(|&f| !self.store.info(f).is_follower && self.store.info(f).part == x)
                .collect();

            let y = if !fallen_leaders.is_empty() && fallen_leaders.len() < self.store.parts[x].leaders.len() {
                self.split_sched(x, &fallen_leaders)
            } else {
                x
            };

            self.demote_new_followers(y);
            self.split_by(y);
        }
    }

    /// Leaders whose type is neither Top nor a constant and whose identity
    /// maps to another member of the same partition become followers.
    fn demote_new_followers(&mut self, y: PartitionId) {
        for n in self.store.parts[y].leaders.clone() {
            let info = self.store.info(n);
            if info.part != y || info.is_follower || info.lattice.is_t_or_c() {
                continue;
            }
            let id = identity(self.ir, &self.store, n);
            if id != n && self.store.info(id).part == y {
                let positions: Vec<i32> = (0..self.ir.arity(n) as i32)
                    .filter(|&i| is_real_follower(self.ir, &self.store, n, i))
                    .collect();
                self.store.leader_to_follower(self.ir, n, &positions);
                self.schedule_worklist(y);
            }
        }
    }

    // -- refinement ----------------------------------------------------------

    /// The Refine step: walk the def-use edges of `x`'s members position by
    /// position, collect the users' partitions and split every touched
    /// proper subset off, with the aa/ab bifurcation for commutative users.
    fn cause_splits(&mut self, x: PartitionId) {
        self.store.parts[x].on_worklist = false;
        let members: Vec<NodeId> =
            self.store.parts[x].leaders.iter().chain(self.store.parts[x].followers.iter()).copied().collect();

        let mut idx = POS_BLOCK;
        while idx <= self.store.parts[x].max_user_inputs {
            debug_assert!(self.touched_list.is_empty());

            for &m in &members {
                if self.store.info(m).part != x {
                    continue;
                }
                for e in self.store.info(m).outs.clone() {
                    if e.pos != idx {
                        continue;
                    }
                    let u = e.node;
                    if idx == POS_BLOCK && self.config.gcse && !self.ir.opcode(u).is_pinned() {
                        continue;
                    }
                    let u_lattice = self.store.info(u).lattice;
                    let u_is_follower = self.store.info(u).is_follower;
                    if u_lattice.is_constant() {
                        // constants cannot be split by inputs, but the
                        // identity-rule results of Sub/Eor/Cmp need a
                        // recheck when an operand partition changed
                        if matches!(self.ir.opcode(u), Opcode::Sub | Opcode::Eor | Opcode::Cmp) {
                            self.add_to_cprop(u);
                        }
                        continue;
                    }
                    if u_is_follower {
                        // follower-ness is partition-relative; re-examine it
                        self.add_to_cprop(u);
                        continue;
                    }
                    if !self.store.info(u).on_touched {
                        self.store.info_mut(u).on_touched = true;
                        let z = self.store.info(u).part;
                        self.store.parts[z].touched.push(u);
                        if !self.store.parts[z].on_touched_list {
                            self.store.parts[z].on_touched_list = true;
                            self.touched_list.push(z);
                        }
                    }
                }
            }

            for z in std::mem::take(&mut self.touched_list) {
                self.store.parts[z].on_touched_list = false;
                let collected = std::mem::take(&mut self.store.parts[z].touched);
                for &t in &collected {
                    self.store.info_mut(t).on_touched = false;
                }
                let touched: Vec<NodeId> = collected
                    .into_iter()
                    .filter(|&t| self.store.info(t).part == z && !self.store.info(t).is_follower)
                    .collect();
                if touched.is_empty() {
                    continue;
                }

                // op(a,a) is not congruent to op(a,b): bifurcate the
                // commutative users by operand-partition equality first
                let (aa, ab): (Vec<NodeId>, Vec<NodeId>) = touched.into_iter().partition(|&u| {
                    self.config.commutative
                        && self.ir.opcode(u).is_commutative()
                        && self.ir.arity(u) == 2
                        && self.store.partition_tag(self.ir.input(u, 0))
                            == self.store.partition_tag(self.ir.input(u, 1))
                });
                for subset in [aa, ab] {
                    if subset.is_empty() {
                        continue;
                    }
                    let cur = self.store.info(subset[0]).part;
                    if subset.len() < self.store.parts[cur].leaders.len() {
                        self.split_sched(cur, &subset);
                    }
                }
            }

            idx += 1;
        }
    }

    // -- split by characteristic ---------------------------------------------

    fn input_key(&self, n: NodeId, i: i32) -> SplitKey {
        if i == POS_BLOCK {
            return SplitKey::Input(self.store.partition_tag(self.ir.block_of(n)));
        }
        let i = i as usize;
        if self.ir.opcode(n) == Opcode::Phi {
            let pred_x = self.ir.input(self.ir.block_of(n), i);
            if self.lattice(pred_x) == LatticeValue::Unreachable {
                return SplitKey::Ignored;
            }
        }
        if self.config.commutative && self.ir.opcode(n).is_commutative() && self.ir.arity(n) == 2 && i <= 1 {
            let p0 = self.store.partition_tag(self.ir.input(n, 0));
            let p1 = self.store.partition_tag(self.ir.input(n, 1));
            return SplitKey::Input(if i == 0 { p0.min(p1) } else { p0.max(p1) });
        }
        SplitKey::Input(self.store.partition_tag(self.ir.input(n, i)))
    }

    /// Partitions the leaders of `p` by a characteristic; the largest class
    /// stays, the rest spawn new partitions. Returns every resulting
    /// partition.
    fn split_by_what(&mut self, p: PartitionId, what: impl Fn(&Self, NodeId) -> SplitKey) -> Vec<PartitionId> {
        let leaders = self.store.parts[p].leaders.clone();
        let mut order: Vec<SplitKey> = Vec::new();
        let mut groups: HashMap<SplitKey, Vec<NodeId>> = HashMap::new();
        for n in leaders {
            let key = what(self, n);
            let group = groups.entry(key).or_default();
            if group.is_empty() {
                order.push(key);
            }
            group.push(n);
        }
        if order.len() <= 1 {
            return vec![p];
        }
        let keep = *order
            .iter()
            .max_by_key(|k| groups[*k].len())
            .expect("at least one class");
        for key in &order {
            if *key == keep {
                continue;
            }
            let seeds = groups[key].clone();
            let cur = self.store.info(seeds[0]).part;
            if seeds.len() < self.store.parts[cur].leaders.len() {
                self.split_sched(cur, &seeds);
            }
        }
        let mut result: Vec<PartitionId> = Vec::new();
        for key in &order {
            let part = self.store.info(groups[key][0]).part;
            if !result.contains(&part) {
                result.push(part);
            }
        }
        result
    }

    /// Refines one partition by lattice element, then opcode key, then
    /// per-input partition identity.
    fn split_by(&mut self, y: PartitionId) {
        self.store.refresh(y);
        if self.store.parts[y].type_is_t_or_c || self.store.parts[y].leaders.len() <= 1 {
            return;
        }
        let by_type = self.split_by_what(y, |s, n| SplitKey::Type(s.lattice(n)));
        for p in by_type {
            self.store.refresh(p);
            if self.store.parts[p].type_is_t_or_c || self.store.parts[p].leaders.len() <= 1 {
                continue;
            }
            let by_op = self.split_by_what(p, |s, n| SplitKey::Op(opcode_key(s.ir, n)));
            for q in by_op {
                if self.store.parts[q].leaders.len() <= 1 {
                    continue;
                }
                let first = self.store.parts[q].leaders[0];
                let op = self.ir.opcode(first);
                let arity = self.ir.arity(first) as i32;
                let mut current = vec![q];
                let mut i = congruence_start_idx(op, self.config.gcse);
                while i < arity {
                    let mut next = Vec::new();
                    for r in current {
                        if self.store.parts[r].leaders.len() <= 1 {
                            next.push(r);
                            continue;
                        }
                        next.extend(self.split_by_what(r, |s, n| s.input_key(n, i)));
                    }
                    current = next;
                    i += 1;
                }
            }
        }
    }
}
