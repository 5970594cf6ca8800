//! The partition store: congruence classes with a leader/follower split.
//!
//! Every live node belongs to exactly one partition. Leaders are the
//! proper members of the congruence class; followers hang off a leader
//! through an algebraic identity and travel with it when the class is
//! split. Def-use edge lists are kept per node, sorted by input position,
//! with an unordered prefix holding the edges that carry follower-ness.
//!
//! Splitting a class with followers uses a two-sided race over follower
//! edges so the work stays proportional to the smaller side; followers
//! reached from both sides cannot follow either and are promoted back to
//! leaders.

use super::congruence::CongruenceView;
use super::lattice::LatticeValue;
use crate::ir::graph::{Graph, NodeId, User};
use std::collections::VecDeque;

/// Index of a partition in the store. Partitions are never freed; emptied
/// ones simply stop being referenced.
pub type PartitionId = usize;

/// Per-node state owned by the pass.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub lattice: LatticeValue,
    pub part: PartitionId,
    /// Index of this node inside its partition's leader or follower list.
    pub pos_in_list: usize,
    pub is_follower: bool,
    pub on_cprop: bool,
    pub on_touched: bool,
    pub on_fallen: bool,
    /// Two-bit tag used only during the race split.
    pub flagged: u8,
    /// Def-use edges restricted to live users, sorted by position; the
    /// prefix `[0..n_followers)` holds the follower edges.
    pub outs: Vec<User>,
    pub n_followers: usize,
    pub live: bool,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            lattice: LatticeValue::Top,
            part: 0,
            pos_in_list: 0,
            is_follower: false,
            on_cprop: false,
            on_touched: false,
            on_fallen: false,
            flagged: 0,
            outs: Vec::new(),
            n_followers: 0,
            live: false,
        }
    }
}

/// One congruence class.
#[derive(Debug, Default)]
pub struct Partition {
    pub leaders: Vec<NodeId>,
    pub followers: Vec<NodeId>,
    /// Members scheduled for retyping (data nodes).
    pub cprop: VecDeque<NodeId>,
    /// Members scheduled for retyping (Cond/Switch and their Projs);
    /// drained only after `cprop` is empty.
    pub cprop_x: VecDeque<NodeId>,
    /// Nodes collected for this partition during one refinement pass.
    pub touched: Vec<NodeId>,
    pub on_worklist: bool,
    pub on_cprop_list: bool,
    pub on_touched_list: bool,
    /// True iff every member's element is Top, Unreachable or a constant.
    pub type_is_t_or_c: bool,
    /// Maximum input position seen across members' def-use edges.
    pub max_user_inputs: i32,
}

impl Partition {
    #[must_use]
    pub fn n_members(&self) -> usize {
        self.leaders.len() + self.followers.len()
    }
}

/// The result of a split: the freshly created partition and the nodes that
/// physically moved into it (the caller requeues pending retypes).
#[derive(Debug)]
pub struct SplitOutcome {
    pub new_part: PartitionId,
    pub moved: Vec<NodeId>,
}

/// Owns all per-node wrappers and partitions of one solver run.
#[derive(Debug, Default)]
pub struct PartitionStore {
    pub infos: Vec<NodeInfo>,
    pub parts: Vec<Partition>,
}

impl CongruenceView for PartitionStore {
    fn lattice(&self, n: NodeId) -> LatticeValue {
        self.infos[n.index()].lattice
    }

    fn partition_tag(&self, n: NodeId) -> usize {
        self.infos[n.index()].part
    }
}

impl PartitionStore {
    #[must_use]
    pub fn new(n_nodes: usize) -> Self {
        Self { infos: vec![NodeInfo::default(); n_nodes], parts: Vec::new() }
    }

    #[must_use]
    pub fn info(&self, n: NodeId) -> &NodeInfo {
        &self.infos[n.index()]
    }

    pub fn info_mut(&mut self, n: NodeId) -> &mut NodeInfo {
        &mut self.infos[n.index()]
    }

    pub fn new_partition(&mut self) -> PartitionId {
        self.parts.push(Partition { type_is_t_or_c: true, ..Partition::default() });
        self.parts.len() - 1
    }

    /// Removes `n` from its current member list.
    fn detach(&mut self, n: NodeId) {
        let info = &self.infos[n.index()];
        let (part, pos, follower) = (info.part, info.pos_in_list, info.is_follower);
        let list = if follower { &mut self.parts[part].followers } else { &mut self.parts[part].leaders };
        list.swap_remove(pos);
        if pos < list.len() {
            let displaced = list[pos];
            self.infos[displaced.index()].pos_in_list = pos;
        }
    }

    /// Appends `n` to the member list of `part` matching its current role.
    fn attach(&mut self, n: NodeId, part: PartitionId) {
        let follower = self.infos[n.index()].is_follower;
        let list = if follower { &mut self.parts[part].followers } else { &mut self.parts[part].leaders };
        self.infos[n.index()].pos_in_list = list.len();
        list.push(n);
        self.infos[n.index()].part = part;
    }

    /// Puts a live node into a partition for the first time (initial walk).
    pub fn insert_leader(&mut self, n: NodeId, part: PartitionId) {
        self.attach(n, part);
    }

    /// Recomputes the cached `type_is_t_or_c` and `max_user_inputs` of a
    /// partition from its members.
    pub fn refresh(&mut self, part: PartitionId) {
        let mut t_or_c = true;
        let mut max_inputs = -1;
        let members: Vec<NodeId> =
            self.parts[part].leaders.iter().chain(self.parts[part].followers.iter()).copied().collect();
        for n in members {
            let info = &self.infos[n.index()];
            t_or_c &= info.lattice.is_t_or_c();
            for e in &info.outs {
                max_inputs = max_inputs.max(e.pos);
            }
        }
        self.parts[part].type_is_t_or_c = t_or_c;
        self.parts[part].max_user_inputs = max_inputs;
    }

    // -- def-use edge regions ------------------------------------------------

    /// Moves the edge `(user, pos)` of `pred` into the follower region.
    fn demote_edge(&mut self, pred: NodeId, user: NodeId, pos: i32) {
        let info = &mut self.infos[pred.index()];
        let nf = info.n_followers;
        if let Some(i) = info.outs[nf..].iter().position(|e| e.node == user && e.pos == pos) {
            let e = info.outs.remove(nf + i);
            info.outs.insert(nf, e);
            info.n_followers += 1;
        }
    }

    /// Moves the edge `(user, pos)` of `pred` back into the sorted leader
    /// region.
    fn promote_edge(&mut self, pred: NodeId, user: NodeId, pos: i32) {
        let info = &mut self.infos[pred.index()];
        let nf = info.n_followers;
        if let Some(i) = info.outs[..nf].iter().position(|e| e.node == user && e.pos == pos) {
            let e = info.outs.remove(i);
            info.n_followers -= 1;
            let nf = info.n_followers;
            let at = nf + info.outs[nf..].partition_point(|x| x.pos <= e.pos);
            info.outs.insert(at, e);
        }
    }

    // -- leader/follower role changes ---------------------------------------

    /// Demotes a leader to a follower; `follower_positions` lists the input
    /// positions whose edges carry the follower-ness.
    pub fn leader_to_follower(&mut self, ir: &Graph, n: NodeId, follower_positions: &[i32]) {
        debug_assert!(!self.infos[n.index()].is_follower);
        let part = self.infos[n.index()].part;
        self.detach(n);
        self.infos[n.index()].is_follower = true;
        self.attach(n, part);
        for &pos in follower_positions {
            let pred = ir.input(n, pos as usize);
            self.demote_edge(pred, n, pos);
        }
    }

    /// Promotes a follower back to a leader, re-sorting its edges into its
    /// predecessors' leader regions.
    pub fn follower_to_leader(&mut self, ir: &Graph, n: NodeId) {
        debug_assert!(self.infos[n.index()].is_follower);
        let part = self.infos[n.index()].part;
        self.detach(n);
        self.infos[n.index()].is_follower = false;
        self.attach(n, part);
        for (i, &pred) in ir.inputs(n).to_vec().iter().enumerate() {
            self.promote_edge(pred, n, i as i32);
        }
    }

    // -- splitting -----------------------------------------------------------

    /// Splits the non-empty proper subset `seeds` out of partition `x` into
    /// a fresh partition. With followers present this runs the two-sided
    /// race; the winning side's walked nodes move.
    pub fn split(&mut self, ir: &Graph, x: PartitionId, seeds: &[NodeId]) -> SplitOutcome {
        debug_assert!(!seeds.is_empty());
        debug_assert!(seeds.iter().all(|n| self.infos[n.index()].part == x));

        if self.parts[x].followers.is_empty() {
            let new_part = self.new_partition();
            for &n in seeds {
                self.detach(n);
                self.attach(n, new_part);
            }
            self.refresh(x);
            self.refresh(new_part);
            return SplitOutcome { new_part, moved: seeds.to_vec() };
        }

        // race: side 0 grows from the subset, side 1 from its complement in
        // the leader list
        let mut sides = [RaceSide::new(1), RaceSide::new(2)];
        for &n in seeds {
            self.infos[n.index()].flagged = 1;
            sides[0].walked.push(n);
            sides[0].queue.push_back(n);
        }
        let complement: Vec<NodeId> =
            self.parts[x].leaders.iter().copied().filter(|n| self.infos[n.index()].flagged == 0).collect();
        debug_assert!(!complement.is_empty(), "split would take the whole partition");
        for &n in &complement {
            self.infos[n.index()].flagged = 2;
            sides[1].walked.push(n);
            sides[1].queue.push_back(n);
        }

        let winner = loop {
            if self.race_step(x, &mut sides[0]) {
                break 0;
            }
            if self.race_step(x, &mut sides[1]) {
                break 1;
            }
        };

        let new_part = self.new_partition();
        let moved = sides[winner].walked.clone();
        for &n in &moved {
            self.detach(n);
            self.attach(n, new_part);
        }

        // followers reached from both sides cannot follow either
        let mut promote = Vec::new();
        for side in &sides {
            for &n in &side.walked {
                if self.infos[n.index()].flagged == 3 && self.infos[n.index()].is_follower {
                    promote.push(n);
                }
            }
        }
        for side in &sides {
            for &n in &side.walked {
                self.infos[n.index()].flagged = 0;
            }
        }
        for n in promote {
            self.follower_to_leader(ir, n);
        }

        self.refresh(x);
        self.refresh(new_part);
        SplitOutcome { new_part, moved }
    }

    /// Advances one side of the race by one unit of work: claiming one
    /// follower, or finishing one node's follower edges. Returns true when
    /// the side's frontier is exhausted (that side wins).
    fn race_step(&mut self, x: PartitionId, side: &mut RaceSide) -> bool {
        let (n, mut i) = match side.cursor.take() {
            Some(c) => c,
            None => match side.queue.pop_front() {
                Some(n) => (n, 0),
                None => return true,
            },
        };
        let nf = self.infos[n.index()].n_followers;
        while i < nf {
            let e = self.infos[n.index()].outs[i];
            i += 1;
            let u = e.node;
            let ui = &mut self.infos[u.index()];
            if !ui.live || ui.part != x || !ui.is_follower {
                continue;
            }
            if ui.flagged == 0 {
                ui.flagged = side.mask;
                side.walked.push(u);
                side.queue.push_back(u);
                side.cursor = Some((n, i));
                return false;
            }
            if ui.flagged & side.mask == 0 {
                ui.flagged |= side.mask;
            }
        }
        false
    }

    // -- debug verification --------------------------------------------------

    /// Checks the partition invariants. Used behind the `check_partitions`
    /// configuration bit; panics on violation.
    pub fn check_partitions(&self, ir: &Graph) {
        use super::congruence::{identity, opcode_key};
        for (pid, part) in self.parts.iter().enumerate() {
            // classes of constants are never refined by opcode, so the key
            // invariant only binds once some member fell below the constants
            let all_t_or_c = part.leaders.iter().all(|n| self.infos[n.index()].lattice.is_t_or_c());
            let mut key = None;
            for &n in &part.leaders {
                let info = &self.infos[n.index()];
                assert_eq!(info.part, pid, "leader {n} recorded in the wrong partition");
                assert!(!info.is_follower);
                if all_t_or_c {
                    continue;
                }
                let k = opcode_key(ir, n);
                match &key {
                    None => key = Some(k),
                    Some(prev) => {
                        assert_eq!(*prev, k, "leaders of partition {pid} disagree on their opcode key");
                    }
                }
            }
            for &n in &part.followers {
                let info = &self.infos[n.index()];
                assert_eq!(info.part, pid, "follower {n} recorded in the wrong partition");
                assert!(info.is_follower);
                let id = identity(ir, self, n);
                assert_ne!(id, n, "follower {n} has no identity");
                assert_eq!(self.infos[id.index()].part, pid, "follower {n} resolves outside its partition");
            }
        }
    }
}

#[derive(Debug)]
struct RaceSide {
    mask: u8,
    queue: VecDeque<NodeId>,
    walked: Vec<NodeId>,
    cursor: Option<(NodeId, usize)>,
}

impl RaceSide {
    fn new(mask: u8) -> Self {
        Self { mask, queue: VecDeque::new(), walked: Vec::new(), cursor: None }
    }
}
