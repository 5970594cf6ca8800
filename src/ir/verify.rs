// src/ir/verify.rs
//! Structural verification of the input contract the optimizers rely on.

use super::cfg::CfgView;
use super::graph::{Graph, NodeId, POS_BLOCK, User};
use super::mode::Mode;
use super::node::NodeKind;
use crate::error::IrError;

fn err(ir: &Graph, n: NodeId, message: String) -> IrError {
    IrError::InvalidGraph { graph: ir.name.to_string(), node: n.to_string(), message }
}

/// Verifies the well-formedness of a graph.
///
/// Checks, over the live part of the graph:
/// - every def-use edge matches an input (and vice versa), and the edge
///   lists are sorted by input position;
/// - no `Bad` node is referenced by a live node;
/// - Phi arity equals the predecessor count of its block;
/// - `Proj` predecessors produce tuples; block predecessors carry mode `X`;
/// - `Cond` selectors are boolean;
/// - the start block is reachable in the block-level view.
///
/// # Errors
///
/// Returns the first violated invariant as an [`IrError::InvalidGraph`].
pub fn verify(ir: &Graph) -> Result<(), IrError> {
    let live = ir.walk_live();

    for &n in &live {
        let is_block = matches!(ir.kind(n), NodeKind::Block { .. });

        // def-use edges are sorted and complete
        let users = ir.users(n);
        if users.windows(2).any(|w| w[0].pos > w[1].pos) {
            return Err(err(ir, n, "def-use edges not sorted by position".into()));
        }
        for u in users {
            let found = if u.pos == POS_BLOCK {
                ir.block_of(u.node) == n
            } else {
                ir.inputs(u.node).get(u.pos as usize) == Some(&n)
            };
            if !found {
                return Err(err(ir, n, format!("stale def-use edge to {} at {}", u.node, u.pos)));
            }
        }

        if !is_block {
            let block = ir.block_of(n);
            if !matches!(ir.kind(block), NodeKind::Block { .. }) {
                return Err(err(ir, n, "containing block is not a Block".into()));
            }
            if !ir.users(block).contains(&User { node: n, pos: POS_BLOCK }) {
                return Err(err(ir, n, "block edge missing from def-use list".into()));
            }
        }

        for (i, &pred) in ir.inputs(n).iter().enumerate() {
            if !ir.users(pred).contains(&User { node: n, pos: i as i32 }) {
                return Err(err(ir, n, format!("input {i} missing its def-use edge")));
            }
            if ir.is_bad(pred) {
                return Err(err(ir, n, format!("Bad node on live edge {i}")));
            }
        }

        match ir.kind(n) {
            NodeKind::Block { .. } => {
                for (i, &pred) in ir.inputs(n).iter().enumerate() {
                    if !ir.is_bad(pred) && ir.mode(pred) != Mode::X {
                        return Err(err(ir, n, format!("block predecessor {i} is not a control node")));
                    }
                }
            }
            NodeKind::Phi => {
                if ir.arity(n) != ir.arity(ir.block_of(n)) {
                    return Err(err(ir, n, "Phi arity differs from block predecessor count".into()));
                }
            }
            NodeKind::Proj { .. } => {
                if ir.mode(ir.input(n, 0)) != Mode::T {
                    return Err(err(ir, n, "Proj of a non-tuple node".into()));
                }
            }
            NodeKind::Cond => {
                if ir.mode(ir.input(n, 0)) != Mode::Bool {
                    return Err(err(ir, n, "Cond selector is not boolean".into()));
                }
            }
            NodeKind::Switch { .. } => {
                if !ir.mode(ir.input(n, 0)).is_int() {
                    return Err(err(ir, n, "Switch selector is not an integer".into()));
                }
            }
            _ => {}
        }
    }

    let view = CfgView::build(ir);
    if !view.is_reachable(ir.start_block()) {
        return Err(err(ir, ir.start_block(), "start block missing from block view".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::PN_MEM;
    use crate::ir::tarval::Tarval;

    #[test]
    fn test_verify_accepts_simple_graph() {
        let mut g = Graph::new("t");
        let b0 = g.start_block();
        let mem = g.new_proj(g.start(), Mode::M, PN_MEM);
        let c = g.new_const(Tarval::I32(1));
        let ret = g.new_return(b0, mem, vec![c]);
        g.add_block_pred(g.end_block(), ret);
        assert!(verify(&g).is_ok());
    }

    #[test]
    fn test_verify_rejects_bad_on_live_edge() {
        let mut g = Graph::new("t");
        let b0 = g.start_block();
        let bad = g.new_bad(Mode::M);
        let ret = g.new_return(b0, bad, vec![]);
        g.add_block_pred(g.end_block(), ret);
        assert!(verify(&g).is_err());
    }

    #[test]
    fn test_verify_rejects_bad_keepalive() {
        let mut g = Graph::new("t");
        let b0 = g.start_block();
        let mem = g.new_proj(g.start(), Mode::M, PN_MEM);
        let ret = g.new_return(b0, mem, vec![]);
        g.add_block_pred(g.end_block(), ret);
        assert!(verify(&g).is_ok());
        // End's keepalive inputs are live edges like any other
        let bad = g.new_bad(Mode::M);
        g.add_end_keepalive(bad);
        assert!(verify(&g).is_err());
    }

    #[test]
    fn test_verify_rejects_phi_arity_mismatch() {
        let mut g = Graph::new("t");
        let b0 = g.start_block();
        let b1 = g.new_block(false);
        let j = g.new_jmp(b0);
        g.add_block_pred(b1, j);
        let c1 = g.new_const(Tarval::I32(1));
        let c2 = g.new_const(Tarval::I32(2));
        let phi = g.new_phi(b1, Mode::I32, vec![c1, c2]);
        let mem = g.new_proj(g.start(), Mode::M, PN_MEM);
        let ret = g.new_return(b1, mem, vec![phi]);
        g.add_block_pred(g.end_block(), ret);
        assert!(verify(&g).is_err());
    }
}
