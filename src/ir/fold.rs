// src/ir/fold.rs
//! Local constant folding and classical value-numbering identities.
//!
//! [`computed_value`] evaluates a node whose operands are graph constants;
//! [`equivalent_node`] finds an existing node the given one is trivially
//! equal to. Both look only at a node and its direct predecessors. The
//! combined optimizer shares [`eval_arith`] and [`eval_cmp`] so speculative
//! evaluation over lattice constants agrees with this folder.

use super::entity::EntityTable;
use super::graph::{Graph, NodeId};
use super::node::{NodeKind, Opcode, Relation, SymKind};
use super::tarval::Tarval;

/// Evaluates a two-operand arithmetic opcode over concrete values.
#[must_use]
pub fn eval_arith(op: Opcode, a: &Tarval, b: &Tarval) -> Option<Tarval> {
    match op {
        Opcode::Add => a.add(b),
        Opcode::Sub => a.sub(b),
        Opcode::Mul => a.mul(b),
        Opcode::And => a.and(b),
        Opcode::Or => a.or(b),
        Opcode::Eor => a.eor(b),
        Opcode::Shl => a.shl(b),
        Opcode::Shr => a.shr(b),
        Opcode::Shrs => a.shrs(b),
        Opcode::Rotl => a.rotl(b),
        _ => None,
    }
}

/// Evaluates a comparison over concrete values. None when the operands are
/// unordered (NaN) or of mismatched modes.
#[must_use]
pub fn eval_cmp(relation: Relation, a: &Tarval, b: &Tarval) -> Option<Tarval> {
    a.compare(b).map(|ord| Tarval::Bool(relation.holds(ord)))
}

fn const_value(ir: &Graph, n: NodeId) -> Option<Tarval> {
    match ir.kind(n) {
        NodeKind::Const { value } => Some(*value),
        _ => None,
    }
}

/// Computes the value of `n` when its operands are graph constants.
///
/// This is the pure constant folder: it never looks across Phis or through
/// memory, only at direct `Const` predecessors (plus entity layout for
/// `SymConst` size/alignment queries).
#[must_use]
pub fn computed_value(ir: &Graph, entities: &EntityTable, n: NodeId) -> Option<Tarval> {
    let op = ir.opcode(n);
    match ir.kind(n) {
        NodeKind::Const { value } => Some(*value),
        NodeKind::SymConst { kind } => match kind {
            SymKind::Address(_) => None,
            SymKind::Size(e) => Tarval::from_i64(ir.mode(n), i64::from(entities.get(*e).size)),
            SymKind::Align(e) => Tarval::from_i64(ir.mode(n), i64::from(entities.get(*e).align)),
        },
        NodeKind::Cmp { relation } => {
            let a = const_value(ir, ir.input(n, 0))?;
            let b = const_value(ir, ir.input(n, 1))?;
            eval_cmp(*relation, &a, &b)
        }
        NodeKind::Conv => const_value(ir, ir.input(n, 0))?.convert(ir.mode(n)),
        NodeKind::Mux => {
            let sel = const_value(ir, ir.input(n, 0))?.as_bool()?;
            const_value(ir, ir.input(n, if sel { 2 } else { 1 }))
        }
        NodeKind::Confirm { relation } => {
            // an equality confirm pins the value to its bound
            if *relation == Relation::Equal {
                if let Some(bound) = const_value(ir, ir.input(n, 1)) {
                    return Some(bound);
                }
            }
            const_value(ir, ir.input(n, 0))
        }
        _ if op.is_binop() => {
            let a = const_value(ir, ir.input(n, 0))?;
            let b = const_value(ir, ir.input(n, 1))?;
            eval_arith(op, &a, &b)
        }
        _ => None,
    }
}

/// Returns a node `n` is trivially equal to, or `n` itself.
///
/// Covers the neutral-element identities (`x + 0`, `x * 1`, `x & ~0`,
/// `x << 0`, `x - 0`), trivial `Conv` copies, single-value Phis and
/// equal-branch Muxes. Confirm nodes are left alone so their refinement
/// survives for later passes. Floating-point neutral elements are not
/// rewritten, matching the strict-arithmetic default.
#[must_use]
pub fn equivalent_node(ir: &Graph, n: NodeId) -> NodeId {
    let op = ir.opcode(n);
    let mode = ir.mode(n);
    match op {
        Opcode::Add | Opcode::Or | Opcode::Eor => {
            if mode.is_float() {
                return n;
            }
            let (l, r) = (ir.input(n, 0), ir.input(n, 1));
            if const_value(ir, l).is_some_and(|v| v.is_null()) {
                return r;
            }
            if const_value(ir, r).is_some_and(|v| v.is_null()) {
                return l;
            }
            n
        }
        Opcode::Sub => {
            if !mode.is_float() && const_value(ir, ir.input(n, 1)).is_some_and(|v| v.is_null()) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Mul => {
            if mode.is_float() {
                return n;
            }
            let (l, r) = (ir.input(n, 0), ir.input(n, 1));
            if const_value(ir, l).is_some_and(|v| v.is_one()) {
                return r;
            }
            if const_value(ir, r).is_some_and(|v| v.is_one()) {
                return l;
            }
            n
        }
        Opcode::And => {
            let (l, r) = (ir.input(n, 0), ir.input(n, 1));
            if const_value(ir, l).is_some_and(|v| v.is_all_one()) {
                return r;
            }
            if const_value(ir, r).is_some_and(|v| v.is_all_one()) {
                return l;
            }
            n
        }
        Opcode::Shl | Opcode::Shr | Opcode::Shrs | Opcode::Rotl => {
            if const_value(ir, ir.input(n, 1)).is_some_and(|v| v.is_null()) {
                return ir.input(n, 0);
            }
            n
        }
        Opcode::Conv => {
            let input = ir.input(n, 0);
            if ir.mode(input) == mode { input } else { n }
        }
        Opcode::Mux => {
            let (f, t) = (ir.input(n, 1), ir.input(n, 2));
            if f == t { f } else { n }
        }
        Opcode::Phi => {
            let mut unique = None;
            for &input in ir.inputs(n) {
                if input == n {
                    continue;
                }
                match unique {
                    None => unique = Some(input),
                    Some(u) if u == input => {}
                    Some(_) => return n,
                }
            }
            unique.unwrap_or(n)
        }
        _ => n,
    }
}
