// Rewriter tests: applying the fixed point to the graph
use seaopt::ir::cfg::block_is_reachable;
use seaopt::ir::entity::EntityTable;
use seaopt::ir::graph::{Graph, NodeId};
use seaopt::ir::mode::Mode;
use seaopt::ir::node::{NodeKind, Opcode, PN_COND_FALSE, PN_COND_TRUE, PN_MEM, Relation};
use seaopt::ir::optimizer::combined::CombinedOptimizer;
use seaopt::ir::tarval::Tarval;
use seaopt::ir::verify::verify;

fn optimize(g: &mut Graph) -> bool {
    let entities = EntityTable::new();
    let mut opt = CombinedOptimizer::default();
    opt.optimize_graph(g, &entities).expect("input graph must verify")
}

fn finish(g: &mut Graph, block: NodeId, values: Vec<NodeId>) -> NodeId {
    let start = g.start();
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let ret = g.new_return(block, mem, values);
    let end_block = g.end_block();
    g.add_block_pred(end_block, ret);
    ret
}

fn assert_idempotent(g: &mut Graph) {
    let entities = EntityTable::new();
    let mut opt = CombinedOptimizer::default();
    assert!(verify(g).is_ok(), "rewritten graph failed verification");
    assert!(!opt.optimize_graph(g, &entities).unwrap(), "second run still modified the graph");
}

#[test]
fn test_constant_fold_to_return() {
    // Add(Const 2, Const 3) feeding a Return reduces to Return(Const 5)
    let mut g = Graph::new("e1");
    let b0 = g.start_block();
    let c2 = g.new_const(Tarval::I32(2));
    let c3 = g.new_const(Tarval::I32(3));
    let add = g.new_binop(Opcode::Add, b0, Mode::I32, c2, c3);
    let ret = finish(&mut g, b0, vec![add]);

    assert!(optimize(&mut g));
    let value = g.input(ret, 1);
    assert!(matches!(g.kind(value), NodeKind::Const { value } if *value == Tarval::I32(5)));
    assert!(g.is_bad(add));
    assert_idempotent(&mut g);
}

#[test]
fn test_dead_branch_elimination() {
    // if (true) { x = 1 } else { x = 2 }; return x  ==>  return 1
    let mut g = Graph::new("e2");
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
    let ret = finish(&mut g, b3, vec![phi]);

    assert!(optimize(&mut g));
    // the phi is gone, the return yields the constant directly
    let value = g.input(ret, 1);
    assert!(matches!(g.kind(value), NodeKind::Const { value } if *value == Tarval::I32(1)));
    // all control flow collapsed into the start block
    assert_eq!(g.block_of(ret), b0);
    assert!(!block_is_reachable(&g, b2));
    assert_idempotent(&mut g);
}

#[test]
fn test_cse_redirects_second_computation() {
    let mut g = Graph::new("e3");
    let b0 = g.start_block();
    let start = g.start();
    let a = g.new_proj(start, Mode::I32, 1);
    let b = g.new_proj(start, Mode::I32, 2);
    let c = g.new_proj(start, Mode::I32, 3);
    let add1 = g.new_binop(Opcode::Add, b0, Mode::I32, a, b);
    let mul1 = g.new_binop(Opcode::Mul, b0, Mode::I32, add1, c);
    let add2 = g.new_binop(Opcode::Add, b0, Mode::I32, a, b);
    let mul2 = g.new_binop(Opcode::Mul, b0, Mode::I32, add2, c);
    let ret = finish(&mut g, b0, vec![mul1, mul2]);

    assert!(optimize(&mut g));
    assert_eq!(g.input(ret, 1), g.input(ret, 2));
    assert_eq!(g.input(ret, 1), mul1);
    assert!(g.is_bad(mul2));
    assert!(g.is_bad(add2));
    assert_idempotent(&mut g);
}

#[test]
fn test_commutative_merge() {
    let mut g = Graph::new("e4");
    let b0 = g.start_block();
    let start = g.start();
    let a = g.new_proj(start, Mode::I32, 1);
    let b = g.new_proj(start, Mode::I32, 2);
    let ab = g.new_binop(Opcode::Add, b0, Mode::I32, a, b);
    let ba = g.new_binop(Opcode::Add, b0, Mode::I32, b, a);
    let ret = finish(&mut g, b0, vec![ab, ba]);

    assert!(optimize(&mut g));
    assert_eq!(g.input(ret, 1), g.input(ret, 2));
    assert_idempotent(&mut g);
}

#[test]
fn test_algebraic_followers_collapse() {
    // Sub(a, 0) and And(x, ~0) are discovered as copies
    let mut g = Graph::new("e5");
    let b0 = g.start_block();
    let start = g.start();
    let a = g.new_proj(start, Mode::I32, 1);
    let x = g.new_proj(start, Mode::U8, 2);
    let zero = g.new_const(Tarval::I32(0));
    let mask = g.new_const(Tarval::U8(0xFF));
    let sub = g.new_binop(Opcode::Sub, b0, Mode::I32, a, zero);
    let and = g.new_binop(Opcode::And, b0, Mode::U8, x, mask);
    let ret = finish(&mut g, b0, vec![sub, and]);

    assert!(optimize(&mut g));
    assert_eq!(g.input(ret, 1), a);
    assert_eq!(g.input(ret, 2), x);
    assert!(g.is_bad(sub));
    assert!(g.is_bad(and));
    assert_idempotent(&mut g);
}

#[test]
fn test_dead_store_survives_as_keepalive() {
    // a store whose only consumer sits in dead code must be kept alive
    let mut g = Graph::new("keep");
    let b0 = g.start_block();
    let start = g.start();
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let ptr = g.new_unknown(Mode::P);
    let val = g.new_const(Tarval::I32(7));
    let store = g.new_store(b0, mem, ptr, val);
    let sel = g.new_const(Tarval::Bool(true));
    let cond = g.new_cond(b0, sel);
    let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
    let pf = g.new_proj(cond, Mode::X, PN_COND_FALSE);
    let b1 = g.new_block(false);
    let b2 = g.new_block(false);
    g.add_block_pred(b1, pt);
    g.add_block_pred(b2, pf);
    let c = g.new_const(Tarval::I32(0));
    // the live path returns the old memory, the dead one the store
    let r1 = g.new_return(b1, mem, vec![c]);
    let r2 = g.new_return(b2, store, vec![c]);
    let eb = g.end_block();
    g.add_block_pred(eb, r1);
    g.add_block_pred(eb, r2);

    assert!(optimize(&mut g));
    assert!(g.keepalives().contains(&store), "live side effect was dropped");
    assert!(!g.is_bad(store));
    assert_idempotent(&mut g);
}

#[test]
fn test_value_from_dead_branch_ignored() {
    // the phi only sees its live input, so the whole expression folds
    let mut g = Graph::new("deadval");
    let b0 = g.start_block();
    let sel = g.new_const(Tarval::Bool(false));
    let cond = g.new_cond(b0, sel);
    let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
    let pf = g.new_proj(cond, Mode::X, PN_COND_FALSE);
    let b1 = g.new_block(false);
    let b2 = g.new_block(false);
    g.add_block_pred(b1, pt);
    g.add_block_pred(b2, pf);
    // dead block defines a value used by the live one
    let c1 = g.new_const(Tarval::I32(1));
    let dead = g.new_binop(Opcode::Add, b1, Mode::I32, c1, c1);
    let j1 = g.new_jmp(b1);
    let j2 = g.new_jmp(b2);
    let b3 = g.new_block(false);
    g.add_block_pred(b3, j1);
    g.add_block_pred(b3, j2);
    let phi = g.new_phi(b3, Mode::I32, vec![dead, c1]);
    let use_dead = g.new_binop(Opcode::Mul, b3, Mode::I32, phi, phi);
    let ret = finish(&mut g, b3, vec![use_dead]);

    assert!(optimize(&mut g));
    // the phi reduces to c1, the Mul folds to 1
    let value = g.input(ret, 1);
    assert!(matches!(g.kind(value), NodeKind::Const { value } if *value == Tarval::I32(1)));
    assert_idempotent(&mut g);
}

#[test]
fn test_phi_with_unknown_is_not_collapsed() {
    let mut g = Graph::new("unknown_phi");
    let b0 = g.start_block();
    let start = g.start();
    let sel = g.new_proj(start, Mode::Bool, 1);
    let a = g.new_proj(start, Mode::I32, 2);
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
    let unk = g.new_unknown(Mode::I32);
    let phi = g.new_phi(b3, Mode::I32, vec![a, unk]);
    let ret = finish(&mut g, b3, vec![phi]);

    // both branches stay live and the phi must not be strengthened to
    // plain `a`
    assert!(!optimize(&mut g));
    assert_eq!(g.input(ret, 1), phi);
    assert_ne!(g.input(ret, 1), a);
}

#[test]
fn test_unreachable_switch_case_pruned() {
    use seaopt::ir::node::{SwitchEntry, SwitchTable};
    let mut g = Graph::new("switch");
    let b0 = g.start_block();
    let sel = g.new_const(Tarval::I32(1));
    let table = SwitchTable { entries: vec![SwitchEntry { value: Tarval::I32(1), pn: 1 }] };
    let switch = g.new_switch(b0, sel, table);
    let pd = g.new_proj(switch, Mode::X, 0);
    let p1 = g.new_proj(switch, Mode::X, 1);
    let bd = g.new_block(false);
    let b1 = g.new_block(false);
    g.add_block_pred(bd, pd);
    g.add_block_pred(b1, p1);
    let c_dead = g.new_const(Tarval::I32(11));
    let c_live = g.new_const(Tarval::I32(22));
    let start = g.start();
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let rd = g.new_return(bd, mem, vec![c_dead]);
    let r1 = g.new_return(b1, mem, vec![c_live]);
    let eb = g.end_block();
    g.add_block_pred(eb, rd);
    g.add_block_pred(eb, r1);

    assert!(optimize(&mut g));
    // only the matching case survives, rejoined by a plain jump
    assert!(!block_is_reachable(&g, bd));
    assert!(g.is_bad(rd));
    assert!(!g.is_bad(r1));
    assert_eq!(g.block_of(r1), b0);
    assert_idempotent(&mut g);
}

#[test]
fn test_reflexive_cmp_folds_branch() {
    // if (x <= x) return 1; else return 2  ==>  return 1
    let mut g = Graph::new("refl_branch");
    let b0 = g.start_block();
    let start = g.start();
    let x = g.new_proj(start, Mode::I32, 1);
    let cmp = g.new_cmp(b0, Relation::LessEqual, x, x);
    let cond = g.new_cond(b0, cmp);
    let pt = g.new_proj(cond, Mode::X, PN_COND_TRUE);
    let pf = g.new_proj(cond, Mode::X, PN_COND_FALSE);
    let b1 = g.new_block(false);
    let b2 = g.new_block(false);
    g.add_block_pred(b1, pt);
    g.add_block_pred(b2, pf);
    let c1 = g.new_const(Tarval::I32(1));
    let c2 = g.new_const(Tarval::I32(2));
    let mem = g.new_proj(start, Mode::M, PN_MEM);
    let r1 = g.new_return(b1, mem, vec![c1]);
    let r2 = g.new_return(b2, mem, vec![c2]);
    let eb = g.end_block();
    g.add_block_pred(eb, r1);
    g.add_block_pred(eb, r2);

    assert!(optimize(&mut g));
    assert!(!g.is_bad(r1));
    assert!(g.is_bad(r2));
    assert_eq!(g.block_of(r1), b0);
    assert_idempotent(&mut g);
}
