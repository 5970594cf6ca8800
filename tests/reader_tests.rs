// Tests for the textual IR reader
use seaopt::ir::mode::Mode;
use seaopt::ir::node::{NodeKind, Opcode};
use seaopt::ir::tarval::Tarval;
use seaopt::ir::verify::verify;
use seaopt::reader::parse_module;

#[test]
fn test_parse_minimal_graph() {
    let module = parse_module("m", "graph @main {\n  b0:\n    m0 = initmem\n    t0 = const i32 5\n    return m0, t0\n}\n")
        .expect("parse failed");
    assert_eq!(module.graphs.len(), 1);
    let g = module.get_graph("main").unwrap();
    assert!(verify(g).is_ok());
    // the return reaches the end block
    assert_eq!(g.arity(g.end_block()), 1);
    let ret = g.input(g.end_block(), 0);
    assert_eq!(g.opcode(ret), Opcode::Return);
    assert!(matches!(g.kind(g.input(ret, 1)), NodeKind::Const { value } if *value == Tarval::I32(5)));
}

#[test]
fn test_parse_diamond_with_phi() {
    let text = "
graph @f {
  b0:
    m0 = initmem
    t0 = arg i32 0
    t1 = const i32 10
    t2 = cmp lt t0, t1
    cond t2, b1, b2
  b1:
    jmp b3
  b2:
    jmp b3
  b3:
    t3 = phi i32 [b1: t0, b2: t1]
    return m0, t3
}
";
    let module = parse_module("m", text).expect("parse failed");
    let g = module.get_graph("f").unwrap();
    assert!(verify(g).is_ok());
    let ret = g.input(g.end_block(), 0);
    let phi = g.input(ret, 1);
    assert_eq!(g.opcode(phi), Opcode::Phi);
    assert_eq!(g.arity(phi), 2);
    assert_eq!(g.mode(phi), Mode::I32);
}

#[test]
fn test_parse_forward_references() {
    // t1 is used before its definition
    let text = "
graph @fwd {
  b0:
    m0 = initmem
    t0 = add i32 t1, t1
    t1 = const i32 21
    return m0, t0
}
";
    let module = parse_module("m", text).expect("parse failed");
    let g = module.get_graph("fwd").unwrap();
    assert!(verify(g).is_ok());
}

#[test]
fn test_parse_loop() {
    let text = "
graph @count {
  b0:
    m0 = initmem
    t0 = const i32 0
    t1 = const i32 10
    jmp b1
  b1:
    t2 = phi i32 [b0: t0, b1: t3]
    t3 = add i32 t2, t1
    t4 = cmp lt t3, t1
    cond t4, b1, b2
  b2:
    return m0, t2
}
";
    let module = parse_module("m", text).expect("parse failed");
    assert!(verify(module.get_graph("count").unwrap()).is_ok());
}

#[test]
fn test_parse_entities_and_memory() {
    let text = "
entity @counter size 4 align 4

graph @bump {
  b0:
    m0 = initmem
    p0 = symconst @counter
    v0, m1 = load i32 m0, p0
    t0 = const i32 1
    v1 = add i32 v0, t0
    m2 = store m1, p0, v1
    return m2, v1
}
";
    let module = parse_module("m", text).expect("parse failed");
    assert!(module.entities.find_by_name("counter").is_some());
    let g = module.get_graph("bump").unwrap();
    assert!(verify(g).is_ok());
    let ret = g.input(g.end_block(), 0);
    let store = g.input(ret, 0);
    assert_eq!(g.opcode(store), Opcode::Store);
    assert_eq!(g.mode(store), Mode::M);
}

#[test]
fn test_parse_switch_and_keep() {
    let text = "
graph @sw {
  b0:
    m0 = initmem
    t0 = arg i32 0
    keep t0
    switch t0, default b1, [0: b2, 1: b3]
  b1:
    jmp b4
  b2:
    jmp b4
  b3:
    jmp b4
  b4:
    t1 = const i32 0
    return m0, t1
}
";
    let module = parse_module("m", text).expect("parse failed");
    let g = module.get_graph("sw").unwrap();
    assert!(verify(g).is_ok());
    assert_eq!(g.keepalives().len(), 1);
}

#[test]
fn test_error_reports_line() {
    let err = parse_module("m", "graph @x {\n  b0:\n    t0 = frobnicate i32 t1\n}\n").unwrap_err();
    assert_eq!(err.line(), Some(3));
    assert!(err.to_string().contains("frobnicate"));
}

#[test]
fn test_error_on_undefined_value() {
    let err = parse_module("m", "graph @x {\n  b0:\n    m0 = initmem\n    return m0, t9\n}\n").unwrap_err();
    assert!(err.to_string().contains("t9"));
}

#[test]
fn test_error_on_missing_terminator() {
    let err = parse_module("m", "graph @x {\n  b0:\n    m0 = initmem\n}\n").unwrap_err();
    assert!(err.to_string().contains("terminator"));
}

#[test]
fn test_error_on_duplicate_value() {
    let err =
        parse_module("m", "graph @x {\n  b0:\n    t0 = const i32 1\n    t0 = const i32 2\n    return t0\n}\n")
            .unwrap_err();
    assert!(err.to_string().contains("defined twice"));
}

#[test]
fn test_error_on_bad_phi_pred() {
    let text = "
graph @x {
  b0:
    m0 = initmem
    jmp b1
  b1:
    t0 = phi i32 [b9: m0]
    return m0, t0
}
";
    assert!(parse_module("m", text).is_err());
}

#[test]
fn test_comments_are_skipped() {
    let text = "# leading comment\ngraph @c {\n  b0: # block comment\n    m0 = initmem\n    return m0 # done\n}\n";
    assert!(parse_module("m", text).is_ok());
}
