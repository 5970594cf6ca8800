//! Per-opcode transfer functions of the combined pass.
//!
//! [`transfer`] recomputes a node's lattice element from its operands'
//! elements. Dispatch is a table keyed by opcode; opcodes without a
//! specialized rule fall back to speculative evaluation with the same
//! arithmetic the local folder uses, so both always agree.

use super::congruence::CongruenceView;
use super::lattice::LatticeValue;
use crate::ir::entity::EntityTable;
use crate::ir::fold::{eval_arith, eval_cmp};
use crate::ir::graph::{Graph, NodeId};
use crate::ir::mode::Mode;
use crate::ir::node::{NodeKind, Opcode, PN_COND_TRUE, PN_SWITCH_DEFAULT, Relation, SymKind};
use crate::ir::tarval::Tarval;

/// Solver state the transfer functions read.
pub trait TransferView: CongruenceView {
    /// Whether `Unknown` nodes evaluate to Top (aggressive) or Bottom.
    fn unknown_as_top(&self) -> bool;
}

/// The optimistic initial element for a node of the given mode.
#[must_use]
pub fn top_of(mode: Mode) -> LatticeValue {
    match mode {
        Mode::X | Mode::BB => LatticeValue::Unreachable,
        _ => LatticeValue::Top,
    }
}

/// Recomputes the lattice element of `n`.
pub fn transfer(ir: &Graph, entities: &EntityTable, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let op = ir.opcode(n);
    match op {
        Opcode::Bad => top_of(ir.mode(n)),
        Opcode::Unknown => {
            if view.unknown_as_top() {
                LatticeValue::Top
            } else {
                LatticeValue::Bottom
            }
        }
        Opcode::Block => compute_block(ir, view, n),
        Opcode::Jmp => view.lattice(ir.block_of(n)),
        Opcode::Return => {
            // a Return is reachable exactly when its block is; until then it
            // keeps its current element
            if view.lattice(ir.block_of(n)) == LatticeValue::Reachable {
                LatticeValue::Reachable
            } else {
                view.lattice(n)
            }
        }
        Opcode::End => LatticeValue::Reachable,
        // side effects preclude folding the result tuple
        Opcode::Call | Opcode::Cond | Opcode::Switch => LatticeValue::Bottom,
        Opcode::Phi => compute_phi(ir, view, n),
        Opcode::Const => match ir.kind(n) {
            NodeKind::Const { value } => LatticeValue::Constant(*value),
            _ => unreachable!(),
        },
        Opcode::SymConst => match ir.kind(n) {
            NodeKind::SymConst { kind: SymKind::Address(e) } => LatticeValue::Address(*e),
            NodeKind::SymConst { kind: SymKind::Size(e) } => {
                Tarval::from_i64(ir.mode(n), i64::from(entities.get(*e).size))
                    .map_or(LatticeValue::Bottom, LatticeValue::Constant)
            }
            NodeKind::SymConst { kind: SymKind::Align(e) } => {
                Tarval::from_i64(ir.mode(n), i64::from(entities.get(*e).align))
                    .map_or(LatticeValue::Bottom, LatticeValue::Constant)
            }
            _ => unreachable!(),
        },
        Opcode::Proj => compute_proj(ir, view, n),
        Opcode::Cmp => compute_cmp(ir, view, n),
        Opcode::Confirm => compute_confirm(ir, view, n),
        Opcode::Mux => compute_mux(ir, view, n),
        Opcode::Conv => {
            let a = view.lattice(ir.input(n, 0));
            match a {
                LatticeValue::Top => LatticeValue::Top,
                LatticeValue::Constant(tv) => {
                    tv.convert(ir.mode(n)).map_or(LatticeValue::Bottom, LatticeValue::Constant)
                }
                _ => LatticeValue::Bottom,
            }
        }
        _ if op.is_binop() => compute_binop(ir, view, n, op),
        // Start, Load, Store, Sync and anything else without a rule: not a
        // constant once any operand is known at all
        _ => {
            for &pred in ir.inputs(n) {
                if view.lattice(pred).is_top_like() {
                    return LatticeValue::Top;
                }
            }
            LatticeValue::Bottom
        }
    }
}

fn compute_block(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    if n == ir.start_block() {
        return LatticeValue::Reachable;
    }
    if let NodeKind::Block { labeled: true } = ir.kind(n) {
        return LatticeValue::Reachable;
    }
    for &pred in ir.inputs(n) {
        if view.lattice(pred) == LatticeValue::Reachable {
            return LatticeValue::Reachable;
        }
    }
    LatticeValue::Unreachable
}

fn compute_phi(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let block = ir.block_of(n);
    if view.lattice(block) != LatticeValue::Reachable {
        return LatticeValue::Top;
    }
    let mut result = LatticeValue::Top;
    for (i, &value) in ir.inputs(n).iter().enumerate() {
        let pred_x = ir.input(block, i);
        if view.lattice(pred_x) == LatticeValue::Unreachable {
            continue;
        }
        let tv = view.lattice(value);
        if tv == LatticeValue::Top {
            // not seen yet; assume it will agree
            continue;
        }
        if tv == LatticeValue::Bottom {
            return LatticeValue::Bottom;
        }
        result = result.meet(tv);
        if result == LatticeValue::Bottom {
            return LatticeValue::Bottom;
        }
    }
    result
}

/// The monotony guard for results claimed from partition identity: once a
/// node was typed to a different constant, the claim falls to Bottom.
fn guarded(current: LatticeValue, candidate: Tarval) -> LatticeValue {
    match current {
        LatticeValue::Constant(c) if c != candidate => LatticeValue::Bottom,
        _ => LatticeValue::Constant(candidate),
    }
}

fn compute_binop(ir: &Graph, view: &impl TransferView, n: NodeId, op: Opcode) -> LatticeValue {
    let (l, r) = (ir.input(n, 0), ir.input(n, 1));
    let a = view.lattice(l);
    let b = view.lattice(r);
    if a.is_top_like() || b.is_top_like() {
        return LatticeValue::Top;
    }
    let mode = ir.mode(n);
    if let (Some(ta), Some(tb)) = (a.as_tarval(), b.as_tarval()) {
        return eval_arith(op, &ta, &tb).map_or(LatticeValue::Bottom, LatticeValue::Constant);
    }
    // Neutral-element sharpening: the other operand's element passes
    // through. This must run before the partition rule below, so that
    // `x - 0` tracks x (and becomes its follower) instead of claiming the
    // speculative zero of the initial all-in-one partition.
    match op {
        Opcode::Add | Opcode::Or | Opcode::Eor if !mode.is_float() => {
            if b.as_tarval().is_some_and(|tv| tv.is_null()) {
                return a;
            }
            if a.as_tarval().is_some_and(|tv| tv.is_null()) {
                return b;
            }
        }
        Opcode::Sub if !mode.is_float() => {
            if b.as_tarval().is_some_and(|tv| tv.is_null()) {
                return a;
            }
        }
        Opcode::Mul if !mode.is_float() => {
            if b.as_tarval().is_some_and(|tv| tv.is_one()) {
                return a;
            }
            if a.as_tarval().is_some_and(|tv| tv.is_one()) {
                return b;
            }
        }
        Opcode::And => {
            if b.as_tarval().is_some_and(|tv| tv.is_all_one()) {
                return a;
            }
            if a.as_tarval().is_some_and(|tv| tv.is_all_one()) {
                return b;
            }
        }
        Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => {
            if b.as_tarval().is_some_and(|tv| tv.is_null()) {
                return a;
            }
        }
        _ => {}
    }
    // x - x = 0 and x ^ x = 0 once both operands share a partition
    if matches!(op, Opcode::Sub | Opcode::Eor)
        && !mode.is_float()
        && view.partition_tag(l) == view.partition_tag(r)
    {
        if let Some(zero) = Tarval::null(mode) {
            return guarded(view.lattice(n), zero);
        }
    }
    LatticeValue::Bottom
}

fn compute_cmp(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let NodeKind::Cmp { relation } = ir.kind(n) else { unreachable!() };
    let (l, r) = (ir.input(n, 0), ir.input(n, 1));
    let a = view.lattice(l);
    let b = view.lattice(r);
    if a.is_top_like() || b.is_top_like() {
        return LatticeValue::Top;
    }
    if let (Some(ta), Some(tb)) = (a.as_tarval(), b.as_tarval()) {
        return eval_cmp(*relation, &ta, &tb).map_or(LatticeValue::Bottom, LatticeValue::Constant);
    }
    // two symbolic addresses compare by entity identity
    if let (LatticeValue::Address(ea), LatticeValue::Address(eb)) = (a, b) {
        let ord = if ea == eb { std::cmp::Ordering::Equal } else { return LatticeValue::Bottom };
        return LatticeValue::Constant(Tarval::Bool(relation.holds(ord)));
    }
    if !ir.mode(l).is_float() && view.partition_tag(l) == view.partition_tag(r) {
        return guarded(view.lattice(n), Tarval::Bool(relation.is_reflexive()));
    }
    LatticeValue::Bottom
}

fn compute_confirm(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let NodeKind::Confirm { relation } = ir.kind(n) else { unreachable!() };
    if *relation == Relation::Equal {
        if let LatticeValue::Constant(tv) = view.lattice(ir.input(n, 1)) {
            return LatticeValue::Constant(tv);
        }
    }
    view.lattice(ir.input(n, 0))
}

fn compute_mux(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let sel = view.lattice(ir.input(n, 0));
    let f = view.lattice(ir.input(n, 1));
    let t = view.lattice(ir.input(n, 2));
    if sel.is_top_like() {
        return LatticeValue::Top;
    }
    if let Some(b) = sel.as_tarval().and_then(|tv| tv.as_bool()) {
        return if b { t } else { f };
    }
    if f.is_top_like() || t.is_top_like() {
        return LatticeValue::Top;
    }
    if f == t { f } else { LatticeValue::Bottom }
}

fn compute_proj(ir: &Graph, view: &impl TransferView, n: NodeId) -> LatticeValue {
    let pred = ir.input(n, 0);
    match ir.opcode(pred) {
        Opcode::Cond => compute_proj_cond(ir, view, n, pred),
        Opcode::Switch => compute_proj_switch(ir, view, n, pred),
        _ => {
            // a projection of an unseen tuple is unseen itself; this is what
            // lets the rewriter take dead Loads out of the memory chain
            if view.lattice(pred).is_top_like() {
                return top_of(ir.mode(n));
            }
            let mode = ir.mode(n);
            if mode == Mode::M {
                return LatticeValue::Bottom;
            }
            if mode == Mode::X {
                return view.lattice(ir.block_of(n));
            }
            LatticeValue::Bottom
        }
    }
}

fn compute_proj_cond(ir: &Graph, view: &impl TransferView, n: NodeId, cond: NodeId) -> LatticeValue {
    let current = view.lattice(n);
    // once reachable, always reachable; the transfer is not monotone
    // without this latch
    if current == LatticeValue::Reachable {
        return LatticeValue::Reachable;
    }
    if view.lattice(ir.block_of(cond)) != LatticeValue::Reachable {
        return current;
    }
    let NodeKind::Proj { pn } = ir.kind(n) else { unreachable!() };
    let want_true = *pn == PN_COND_TRUE;
    match view.lattice(ir.input(cond, 0)) {
        LatticeValue::Constant(tv) => match tv.as_bool() {
            Some(v) if v == want_true => LatticeValue::Reachable,
            Some(_) => LatticeValue::Unreachable,
            None => LatticeValue::Reachable,
        },
        // a still-Top selector chooses neither side yet
        LatticeValue::Top => LatticeValue::Unreachable,
        _ => LatticeValue::Reachable,
    }
}

fn compute_proj_switch(ir: &Graph, view: &impl TransferView, n: NodeId, switch: NodeId) -> LatticeValue {
    let current = view.lattice(n);
    if current == LatticeValue::Reachable {
        return LatticeValue::Reachable;
    }
    if view.lattice(ir.block_of(switch)) != LatticeValue::Reachable {
        return current;
    }
    let NodeKind::Proj { pn } = ir.kind(n) else { unreachable!() };
    let NodeKind::Switch { table } = ir.kind(switch) else { unreachable!() };
    match view.lattice(ir.input(switch, 0)) {
        LatticeValue::Constant(tv) => {
            if table.lookup(&tv) == *pn {
                LatticeValue::Reachable
            } else {
                LatticeValue::Unreachable
            }
        }
        LatticeValue::Top => {
            if view.unknown_as_top() {
                LatticeValue::Unreachable
            } else if *pn == PN_SWITCH_DEFAULT {
                LatticeValue::Reachable
            } else {
                LatticeValue::Unreachable
            }
        }
        _ => LatticeValue::Reachable,
    }
}
