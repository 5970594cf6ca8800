// Integration tests for the graph arena, def-use edges and verification
use seaopt::ir::graph::{Graph, User};
use seaopt::ir::mode::Mode;
use seaopt::ir::node::{NodeKind, Opcode, PN_COND_FALSE, PN_COND_TRUE, PN_MEM, Relation};
use seaopt::ir::tarval::Tarval;
use seaopt::ir::verify::verify;
use seaopt::ir::{CfgView, POS_BLOCK};

fn return_of(g: &mut Graph, block: seaopt::ir::NodeId, value: seaopt::ir::NodeId) -> seaopt::ir::NodeId {
    let start = g.start();
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let ret = g.new_return(block, mem, vec![value]);
    let end_block = g.end_block();
    g.add_block_pred(end_block, ret);
    ret
}

#[test]
fn test_new_graph_has_anchors() {
    let g = Graph::new("anchors");
    assert!(matches!(g.kind(g.start_block()), NodeKind::Block { .. }));
    assert!(matches!(g.kind(g.end_block()), NodeKind::Block { .. }));
    assert!(matches!(g.kind(g.start()), NodeKind::Start));
    assert!(matches!(g.kind(g.end()), NodeKind::End));
    assert_eq!(g.mode(g.start()), Mode::T);
    assert_eq!(g.block_of(g.start()), g.start_block());
}

#[test]
fn test_users_carry_positions_and_block_edges() {
    let mut g = Graph::new("users");
    let b0 = g.start_block();
    let c = g.new_const(Tarval::I32(7));
    let add = g.new_binop(Opcode::Add, b0, Mode::I32, c, c);
    // both operand edges, sorted by position
    assert_eq!(g.users(c), &[User { node: add, pos: 0 }, User { node: add, pos: 1 }]);
    // the block lists its members through position -1 edges
    assert!(g.users(b0).contains(&User { node: add, pos: POS_BLOCK }));
    assert_eq!(g.block_of(add), b0);
}

#[test]
fn test_set_input_moves_def_use_edges() {
    let mut g = Graph::new("set_input");
    let b0 = g.start_block();
    let c1 = g.new_const(Tarval::I32(1));
    let c2 = g.new_const(Tarval::I32(2));
    let add = g.new_binop(Opcode::Add, b0, Mode::I32, c1, c1);
    g.set_input(add, 1, c2);
    assert_eq!(g.inputs(add), &[c1, c2]);
    assert_eq!(g.users(c1), &[User { node: add, pos: 0 }]);
    assert_eq!(g.users(c2), &[User { node: add, pos: 1 }]);
}

#[test]
fn test_exchange_retargets_all_users() {
    let mut g = Graph::new("exchange");
    let b0 = g.start_block();
    let old = g.new_const(Tarval::I32(1));
    let new = g.new_const(Tarval::I32(2));
    let a = g.new_binop(Opcode::Add, b0, Mode::I32, old, old);
    let m = g.new_binop(Opcode::Mul, b0, Mode::I32, old, new);
    g.exchange(old, new);
    assert_eq!(g.inputs(a), &[new, new]);
    assert_eq!(g.inputs(m), &[new, new]);
    assert!(g.is_bad(old));
    assert!(g.users(old).is_empty());
    assert_eq!(g.users(new).len(), 4);
}

#[test]
fn test_walk_live_follows_keepalives_only_when_present() {
    let mut g = Graph::new("walk");
    let b0 = g.start_block();
    let c = g.new_const(Tarval::I32(3));
    let dangling = g.new_binop(Opcode::Add, b0, Mode::I32, c, c);
    assert!(!g.walk_live().contains(&dangling));
    g.add_end_keepalive(dangling);
    let live = g.walk_live();
    assert!(live.contains(&dangling));
    assert!(live.contains(&c));
}

#[test]
fn test_exchange_block_moves_members() {
    let mut g = Graph::new("fuse");
    let b0 = g.start_block();
    let b1 = g.new_block(false);
    let j = g.new_jmp(b0);
    g.add_block_pred(b1, j);
    let c = g.new_const(Tarval::I32(0));
    let ret = return_of(&mut g, b1, c);
    g.exchange(b1, b0);
    assert_eq!(g.block_of(ret), b0);
    assert!(g.is_bad(b1));
}

#[test]
fn test_verify_accepts_diamond() {
    let mut g = Graph::new("diamond");
    let b0 = g.start_block();
    let sel = g.new_const(Tarval::Bool(true));
    let cond = g.new_cond(b0, sel);
    let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
    let pf = g.new_proj(cond, Mode::X, PN_COND_FALSE);
    let b1 = g.new_block(false);
    let b2 = g.new_block(false);
    g.add_block_pred(b1, pt);
    g.add_block_pred(b2, pf);
    let j1 = g.new_jmp(b1);
    let j2 = g.new_jmp(b2);
    let b3 = g.new_block(false);
    g.add_block_pred(b3, j1);
    g.add_block_pred(b3, j2);
    let c1 = g.new_const(Tarval::I32(1));
    let c2 = g.new_const(Tarval::I32(2));
    let phi = g.new_phi(b3, Mode::I32, vec![c1, c2]);
    return_of(&mut g, b3, phi);
    assert!(verify(&g).is_ok());

    let view = CfgView::build(&g);
    assert!(view.is_reachable(b3));
    assert_eq!(view.reverse_post_order().first(), Some(&b0));
}

#[test]
fn test_verify_rejects_non_boolean_cond() {
    let mut g = Graph::new("badsel");
    let b0 = g.start_block();
    let sel = g.new_const(Tarval::I32(1));
    let cond = g.new_cond(b0, sel);
    let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
    let b1 = g.new_block(false);
    g.add_block_pred(b1, pt);
    let c = g.new_const(Tarval::I32(0));
    return_of(&mut g, b1, c);
    assert!(verify(&g).is_err());
}

#[test]
fn test_verify_rejects_stale_phi() {
    let mut g = Graph::new("phibad");
    let b0 = g.start_block();
    let b1 = g.new_block(false);
    let j = g.new_jmp(b0);
    g.add_block_pred(b1, j);
    let c1 = g.new_const(Tarval::I32(1));
    let c2 = g.new_const(Tarval::I32(2));
    // two inputs for a single-predecessor block
    let phi = g.new_phi(b1, Mode::I32, vec![c1, c2]);
    return_of(&mut g, b1, phi);
    assert!(verify(&g).is_err());
}

#[test]
fn test_confirm_mode_follows_value() {
    let mut g = Graph::new("confirm");
    let b0 = g.start_block();
    let v = g.new_unknown(Mode::I16);
    let bound = g.new_const(Tarval::I16(9));
    let confirm = g.new_confirm(b0, Relation::LessEqual, v, bound);
    assert_eq!(g.mode(confirm), Mode::I16);
    assert_eq!(g.inputs(confirm), &[v, bound]);
}
