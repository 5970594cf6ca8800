//! Congruence keys and algebraic identities for the combined pass.
//!
//! Two leaders may share a partition only if they agree on the
//! [`OpcodeKey`] (opcode, mode, arity and opcode-specific attribute) and,
//! input by input, on their operands' partitions. Followers are nodes that
//! collapse onto another member of their partition through one of the
//! algebraic identities enumerated in [`identity`].

use super::lattice::LatticeValue;
use crate::ir::graph::{Graph, NodeId};
use crate::ir::mode::Mode;
use crate::ir::node::{NodeKind, Opcode, Relation, SymKind};
use crate::ir::tarval::Tarval;

/// Opcode-specific attribute part of a congruence key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKey {
    None,
    Pn(u32),
    Value(Tarval),
    Sym(SymKind),
    Rel(Relation),
    /// Nodes that must never be congruent to anything else key on their own
    /// identity (stateful tuples, blocks, per-use unknowns).
    Unique(NodeId),
}

/// Congruence key: nodes in one partition must agree on all four parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeKey {
    pub opcode: Opcode,
    pub mode: Mode,
    pub arity: usize,
    pub attr: AttrKey,
}

/// Computes the congruence key of a node.
#[must_use]
pub fn opcode_key(ir: &Graph, n: NodeId) -> OpcodeKey {
    let attr = match ir.kind(n) {
        NodeKind::Proj { pn } => AttrKey::Pn(*pn),
        NodeKind::Const { value } => AttrKey::Value(*value),
        NodeKind::SymConst { kind } => AttrKey::Sym(*kind),
        NodeKind::Cmp { relation } | NodeKind::Confirm { relation } => AttrKey::Rel(*relation),
        // blocks, graph anchors, branches, calls and unknowns never merge
        NodeKind::Block { .. }
        | NodeKind::Start
        | NodeKind::End
        | NodeKind::Cond
        | NodeKind::Switch { .. }
        | NodeKind::Call { .. }
        | NodeKind::Unknown
        | NodeKind::Bad => AttrKey::Unique(n),
        _ => AttrKey::None,
    };
    OpcodeKey { opcode: ir.opcode(n), mode: ir.mode(n), arity: ir.arity(n), attr }
}

/// First input index that participates in congruence for nodes of `op`:
/// -1 (the block edge) normally, 0 for unpinned computations in GCSE mode.
#[must_use]
pub const fn congruence_start_idx(op: Opcode, gcse: bool) -> i32 {
    if gcse && !op.is_pinned() { 0 } else { -1 }
}

/// Read access to the solver state the identity rules depend on.
pub trait CongruenceView {
    fn lattice(&self, n: NodeId) -> LatticeValue;
    /// Opaque partition tag; equal tags mean same partition.
    fn partition_tag(&self, n: NodeId) -> usize;
}

fn input_is_null(ir: &Graph, view: &impl CongruenceView, n: NodeId, i: usize) -> bool {
    match view.lattice(ir.input(n, i)) {
        LatticeValue::Constant(tv) => tv.is_null(),
        _ => false,
    }
}

fn input_is_one(ir: &Graph, view: &impl CongruenceView, n: NodeId, i: usize) -> bool {
    match view.lattice(ir.input(n, i)) {
        LatticeValue::Constant(tv) => tv.is_one(),
        _ => false,
    }
}

fn input_is_all_one(ir: &Graph, view: &impl CongruenceView, n: NodeId, i: usize) -> bool {
    match view.lattice(ir.input(n, i)) {
        LatticeValue::Constant(tv) => tv.is_all_one(),
        _ => false,
    }
}

/// The algebraic-identity map: the node another node is provably equal to,
/// or the node itself when no identity applies.
///
/// Identities recognized: Phi over a single live partition, `x + 0` /
/// `x | 0` / `x ^ 0` (either side), `x * 1`, `x - 0`, `x << 0` and the other
/// shifts, `x & ~0`, Confirm as a copy of its value, Mux with both branches
/// in one partition. Selecting a Mux branch through a constant selector is
/// intentionally not an identity here. Floating-point neutral elements are
/// excluded under strict arithmetic.
#[must_use]
pub fn identity(ir: &Graph, view: &impl CongruenceView, n: NodeId) -> NodeId {
    let mode = ir.mode(n);
    match ir.opcode(n) {
        Opcode::Phi => {
            let block = ir.block_of(n);
            let mut rep: Option<NodeId> = None;
            for (i, &value) in ir.inputs(n).iter().enumerate() {
                let pred_x = ir.input(block, i);
                if view.lattice(pred_x) != LatticeValue::Reachable {
                    continue;
                }
                match rep {
                    None => rep = Some(value),
                    Some(r) if view.partition_tag(r) == view.partition_tag(value) => {}
                    Some(_) => return n,
                }
            }
            rep.unwrap_or(n)
        }
        Opcode::Add | Opcode::Or | Opcode::Eor => {
            if mode.is_float() {
                return n;
            }
            if input_is_null(ir, view, n, 0) {
                return ir.input(n, 1);
            }
            if input_is_null(ir, view, n, 1) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Mul => {
            if mode.is_float() {
                return n;
            }
            if input_is_one(ir, view, n, 0) {
                return ir.input(n, 1);
            }
            if input_is_one(ir, view, n, 1) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Sub => {
            if !mode.is_float() && input_is_null(ir, view, n, 1) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => {
            if input_is_null(ir, view, n, 1) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::And => {
            if input_is_all_one(ir, view, n, 0) {
                return ir.input(n, 1);
            }
            if input_is_all_one(ir, view, n, 1) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Confirm => ir.input(n, 0),
        Opcode::Mux => {
            let (f, t) = (ir.input(n, 1), ir.input(n, 2));
            if view.partition_tag(f) == view.partition_tag(t) { f } else { n }
        }
        _ => n,
    }
}

/// Whether the edge from input `pos` of `n` can carry follower-ness: true
/// when that operand could be the target of an identity on `n`. The Confirm
/// bound and the Mux selector never qualify; dead Phi inputs do not either.
#[must_use]
pub fn is_real_follower(ir: &Graph, view: &impl CongruenceView, n: NodeId, pos: i32) -> bool {
    if pos < 0 {
        return false;
    }
    match ir.opcode(n) {
        Opcode::Add | Opcode::Or | Opcode::Eor | Opcode::Mul | Opcode::And => true,
        Opcode::Sub | Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => pos == 0,
        Opcode::Confirm => pos == 0,
        Opcode::Mux => pos != 0,
        Opcode::Phi => {
            let pred_x = ir.input(ir.block_of(n), pos as usize);
            view.lattice(pred_x) != LatticeValue::Unreachable
        }
        _ => false,
    }
}
