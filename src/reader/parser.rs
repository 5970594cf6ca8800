// src/reader/parser.rs
//! Parser for the textual IR format.
//!
//! A module file holds entity declarations followed by graphs:
//!
//! ```text
//! entity @g size 4 align 4
//!
//! graph @main {
//!   b0:
//!     m0 = initmem
//!     t0 = arg i32 0
//!     t1 = const i32 3
//!     t2 = add i32 t0, t1
//!     t3 = cmp lt t2, t1
//!     cond t3, b1, b2
//!   b1:
//!     jmp b3
//!   b2:
//!     jmp b3
//!   b3:
//!     t4 = phi i32 [b1: t2, b2: t1]
//!     return m0, t4
//! }
//! ```
//!
//! The first block of a graph is its start block. Values may be referenced
//! before their definition; graphs are built in two passes (allocate, then
//! patch inputs), so loops and mutually recursive Phis parse naturally.

use super::token::{Token, TokenKind, tokenize};
use crate::error::IrError;
use crate::ir::graph::{Graph, NodeId};
use crate::ir::mode::Mode;
use crate::ir::node::{
    NodeKind, Opcode, PN_COND_FALSE, PN_COND_TRUE, PN_LOAD_RES, PN_MEM, Relation, SwitchEntry, SwitchTable, SymKind,
};
use crate::ir::tarval::Tarval;
use crate::ir::{Entity, Module};
use std::collections::HashMap;

/// Parses a whole module from source text.
///
/// # Errors
/// Returns [`IrError::Parse`] with the offending line on any lexical or
/// structural problem (unknown opcode, undefined value, arity mismatch,
/// missing terminator, unresolved Phi predecessor).
pub fn parse_module(name: &str, source: &str) -> Result<Module, IrError> {
    let tokens = tokenize(source).map_err(|line| err("unrecognized character", line))?;
    Parser { tokens, pos: 0 }.module(name)
}

fn err(message: impl Into<String>, line: usize) -> IrError {
    IrError::Parse { message: message.into(), line }
}

const TERMINATORS: [&str; 4] = ["jmp", "cond", "switch", "return"];
const BINOPS: [(&str, Opcode); 10] = [
    ("add", Opcode::Add),
    ("sub", Opcode::Sub),
    ("mul", Opcode::Mul),
    ("and", Opcode::And),
    ("or", Opcode::Or),
    ("eor", Opcode::Eor),
    ("shl", Opcode::Shl),
    ("shr", Opcode::Shr),
    ("shrs", Opcode::Shrs),
    ("rotl", Opcode::Rotl),
];

fn parse_mode(text: &str) -> Option<Mode> {
    Some(match text {
        "i8" => Mode::I8,
        "i16" => Mode::I16,
        "i32" => Mode::I32,
        "i64" => Mode::I64,
        "u8" => Mode::U8,
        "u16" => Mode::U16,
        "u32" => Mode::U32,
        "u64" => Mode::U64,
        "f32" => Mode::F32,
        "f64" => Mode::F64,
        "b" => Mode::Bool,
        "p" => Mode::P,
        _ => return None,
    })
}

// -- parse-tree types --------------------------------------------------------

struct GraphAst<'a> {
    name: &'a str,
    blocks: Vec<BlockAst<'a>>,
}

struct BlockAst<'a> {
    name: &'a str,
    labeled: bool,
    line: usize,
    stmts: Vec<Stmt<'a>>,
    term: Option<Term<'a>>,
    term_line: usize,
}

enum Stmt<'a> {
    Assign { results: Vec<&'a str>, op: OpAst<'a>, line: usize },
    Keep { value: &'a str, line: usize },
}

enum OpAst<'a> {
    InitMem,
    Arg { mode: Mode, index: u32 },
    Const { mode: Mode, literal: &'a str },
    SymAddr { entity: &'a str },
    SymSize { mode: Mode, entity: &'a str },
    SymAlign { mode: Mode, entity: &'a str },
    Binop { op: Opcode, mode: Mode, left: &'a str, right: &'a str },
    Cmp { relation: Relation, left: &'a str, right: &'a str },
    Conv { mode: Mode, value: &'a str },
    Confirm { relation: Relation, mode: Mode, value: &'a str, bound: &'a str },
    Mux { mode: Mode, sel: &'a str, if_false: &'a str, if_true: &'a str },
    Phi { mode: Mode, pairs: Vec<(&'a str, &'a str)> },
    Load { mode: Mode, mem: &'a str, ptr: &'a str },
    Store { mem: &'a str, ptr: &'a str, value: &'a str },
    Call { callee: &'a str, mem: &'a str, args: Vec<&'a str>, ret_modes: Vec<Mode> },
    Sync { mems: Vec<&'a str> },
    Unknown { mode: Mode },
}

enum Term<'a> {
    Jmp { target: &'a str },
    Cond { sel: &'a str, if_true: &'a str, if_false: &'a str },
    Switch { sel: &'a str, default: &'a str, cases: Vec<(&'a str, &'a str)> },
    Return { values: Vec<&'a str> },
}

// -- the parser --------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, ahead: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + ahead).map(|t| t.kind)
    }

    fn line(&self) -> usize {
        self.peek().map_or_else(|| self.tokens.last().map_or(1, |t| t.line), |t| t.line)
    }

    fn next(&mut self) -> Result<Token<'a>, IrError> {
        let token = self.tokens.get(self.pos).cloned().ok_or_else(|| err("unexpected end of input", self.line()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'a>, IrError> {
        let token = self.next()?;
        if token.kind == kind { Ok(token) } else { Err(err(format!("expected {what}"), token.line)) }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn ident(&mut self, what: &str) -> Result<&'a str, IrError> {
        Ok(self.expect(TokenKind::Ident, what)?.text)
    }

    fn at_name(&mut self, what: &str) -> Result<&'a str, IrError> {
        Ok(&self.expect(TokenKind::AtName, what)?.text[1..])
    }

    fn mode(&mut self) -> Result<Mode, IrError> {
        let token = self.expect(TokenKind::Ident, "a mode")?;
        parse_mode(token.text).ok_or_else(|| err(format!("unknown mode '{}'", token.text), token.line))
    }

    fn relation(&mut self) -> Result<Relation, IrError> {
        let token = self.expect(TokenKind::Ident, "a relation")?;
        Relation::parse(token.text).ok_or_else(|| err(format!("unknown relation '{}'", token.text), token.line))
    }

    fn module(mut self, name: &str) -> Result<Module, IrError> {
        let mut module = Module::new(name);
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Entity => {
                    self.pos += 1;
                    let ent_name = self.at_name("an entity name")?;
                    self.expect(TokenKind::Size, "'size'")?;
                    let size = self.number("entity size")?;
                    self.expect(TokenKind::Align, "'align'")?;
                    let align = self.number("entity alignment")?;
                    module.entities.add(Entity::new(ent_name, size, align));
                }
                TokenKind::Graph => {
                    self.pos += 1;
                    let ast = self.graph()?;
                    let graph = build_graph(&module, &ast)?;
                    module.add_graph(graph);
                }
                _ => return Err(err("expected 'entity' or 'graph'", token.line)),
            }
        }
        Ok(module)
    }

    fn number(&mut self, what: &str) -> Result<u32, IrError> {
        let token = self.expect(TokenKind::Number, what)?;
        token.text.parse().map_err(|_| err(format!("invalid {what}"), token.line))
    }

    fn graph(&mut self) -> Result<GraphAst<'a>, IrError> {
        let name = self.at_name("a graph name")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut blocks: Vec<BlockAst<'a>> = Vec::new();
        loop {
            let token = self.peek().cloned().ok_or_else(|| err("unterminated graph", self.line()))?;
            match token.kind {
                TokenKind::RBrace => {
                    self.pos += 1;
                    break;
                }
                TokenKind::Ident
                    if self.peek_kind(1) == Some(TokenKind::Colon)
                        || (self.peek_kind(1) == Some(TokenKind::Labeled)
                            && self.peek_kind(2) == Some(TokenKind::Colon)) =>
                {
                    self.pos += 1;
                    let labeled = self.eat(TokenKind::Labeled);
                    self.expect(TokenKind::Colon, "':'")?;
                    blocks.push(BlockAst {
                        name: token.text,
                        labeled,
                        line: token.line,
                        stmts: Vec::new(),
                        term: None,
                        term_line: token.line,
                    });
                }
                _ => {
                    let mut block =
                        blocks.pop().ok_or_else(|| err("statement outside of a block", token.line))?;
                    if block.term.is_some() {
                        return Err(err("statement after the block terminator", token.line));
                    }
                    self.statement(&mut block)?;
                    blocks.push(block);
                }
            }
        }
        if blocks.is_empty() {
            return Err(err("graph has no blocks", self.line()));
        }
        Ok(GraphAst { name, blocks })
    }

    fn statement(&mut self, block: &mut BlockAst<'a>) -> Result<(), IrError> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Keep => {
                let value = self.ident("a value to keep")?;
                block.stmts.push(Stmt::Keep { value, line: token.line });
                Ok(())
            }
            TokenKind::Ident if TERMINATORS.contains(&token.text) => {
                block.term = Some(self.terminator(token.text)?);
                block.term_line = token.line;
                Ok(())
            }
            TokenKind::Ident => {
                let mut results = vec![token.text];
                while self.eat(TokenKind::Comma) {
                    results.push(self.ident("a result name")?);
                }
                self.expect(TokenKind::Equals, "'='")?;
                let op = self.operation()?;
                block.stmts.push(Stmt::Assign { results, op, line: token.line });
                Ok(())
            }
            _ => Err(err("expected a statement", token.line)),
        }
    }

    fn terminator(&mut self, keyword: &str) -> Result<Term<'a>, IrError> {
        match keyword {
            "jmp" => Ok(Term::Jmp { target: self.ident("a target block")? }),
            "cond" => {
                let sel = self.ident("a selector")?;
                self.expect(TokenKind::Comma, "','")?;
                let if_true = self.ident("the true target")?;
                self.expect(TokenKind::Comma, "','")?;
                let if_false = self.ident("the false target")?;
                Ok(Term::Cond { sel, if_true, if_false })
            }
            "switch" => {
                let sel = self.ident("a selector")?;
                self.expect(TokenKind::Comma, "','")?;
                self.expect(TokenKind::Default, "'default'")?;
                let default = self.ident("the default target")?;
                self.expect(TokenKind::Comma, "','")?;
                self.expect(TokenKind::LBracket, "'['")?;
                let mut cases = Vec::new();
                if !self.eat(TokenKind::RBracket) {
                    loop {
                        let lit = self.expect(TokenKind::Number, "a case value")?.text;
                        self.expect(TokenKind::Colon, "':'")?;
                        let target = self.ident("a case target")?;
                        cases.push((lit, target));
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RBracket, "']'")?;
                }
                Ok(Term::Switch { sel, default, cases })
            }
            "return" => {
                let mut values = Vec::new();
                if self.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
                    values.push(self.ident("a value")?);
                    while self.eat(TokenKind::Comma) {
                        values.push(self.ident("a value")?);
                    }
                }
                Ok(Term::Return { values })
            }
            _ => unreachable!(),
        }
    }

    fn operation(&mut self) -> Result<OpAst<'a>, IrError> {
        let token = self.next()?;
        let (kind, text) = (token.kind, token.text);
        if kind != TokenKind::Ident {
            return Err(err("expected an operation", token.line));
        }
        if let Some(&(_, op)) = BINOPS.iter().find(|&&(name, _)| name == text) {
            let mode = self.mode()?;
            let left = self.ident("an operand")?;
            self.expect(TokenKind::Comma, "','")?;
            let right = self.ident("an operand")?;
            return Ok(OpAst::Binop { op, mode, left, right });
        }
        match text {
            "initmem" => Ok(OpAst::InitMem),
            "arg" => {
                let mode = self.mode()?;
                let index = self.number("an argument index")?;
                Ok(OpAst::Arg { mode, index })
            }
            "const" => {
                let mode = self.mode()?;
                let lit = self.next()?;
                if !matches!(lit.kind, TokenKind::Number | TokenKind::Ident) {
                    return Err(err("expected a literal", lit.line));
                }
                Ok(OpAst::Const { mode, literal: lit.text })
            }
            "symconst" => {
                if self.eat(TokenKind::Size) {
                    let mode = self.mode()?;
                    Ok(OpAst::SymSize { mode, entity: self.at_name("an entity")? })
                } else if self.eat(TokenKind::Align) {
                    let mode = self.mode()?;
                    Ok(OpAst::SymAlign { mode, entity: self.at_name("an entity")? })
                } else {
                    Ok(OpAst::SymAddr { entity: self.at_name("an entity")? })
                }
            }
            "cmp" => {
                let relation = self.relation()?;
                let left = self.ident("an operand")?;
                self.expect(TokenKind::Comma, "','")?;
                let right = self.ident("an operand")?;
                Ok(OpAst::Cmp { relation, left, right })
            }
            "conv" => {
                let mode = self.mode()?;
                Ok(OpAst::Conv { mode, value: self.ident("an operand")? })
            }
            "confirm" => {
                let relation = self.relation()?;
                let mode = self.mode()?;
                let value = self.ident("a value")?;
                self.expect(TokenKind::Comma, "','")?;
                let bound = self.ident("a bound")?;
                Ok(OpAst::Confirm { relation, mode, value, bound })
            }
            "mux" => {
                let mode = self.mode()?;
                let sel = self.ident("a selector")?;
                self.expect(TokenKind::Comma, "','")?;
                let if_false = self.ident("the false value")?;
                self.expect(TokenKind::Comma, "','")?;
                let if_true = self.ident("the true value")?;
                Ok(OpAst::Mux { mode, sel, if_false, if_true })
            }
            "phi" => {
                let mode = self.mode()?;
                self.expect(TokenKind::LBracket, "'['")?;
                let mut pairs = Vec::new();
                loop {
                    let pred = self.ident("a predecessor block")?;
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.ident("a value")?;
                    pairs.push((pred, value));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(OpAst::Phi { mode, pairs })
            }
            "load" => {
                let mode = self.mode()?;
                let mem = self.ident("a memory value")?;
                self.expect(TokenKind::Comma, "','")?;
                let ptr = self.ident("an address")?;
                Ok(OpAst::Load { mode, mem, ptr })
            }
            "store" => {
                let mem = self.ident("a memory value")?;
                self.expect(TokenKind::Comma, "','")?;
                let ptr = self.ident("an address")?;
                self.expect(TokenKind::Comma, "','")?;
                let value = self.ident("a value")?;
                Ok(OpAst::Store { mem, ptr, value })
            }
            "call" => {
                let callee = self.at_name("a callee entity")?;
                let mem = self.ident("a memory value")?;
                self.expect(TokenKind::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.eat(TokenKind::RParen) {
                    loop {
                        args.push(self.ident("an argument")?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                }
                let mut ret_modes = Vec::new();
                if self.eat(TokenKind::Colon) {
                    self.expect(TokenKind::LParen, "'('")?;
                    if !self.eat(TokenKind::RParen) {
                        loop {
                            ret_modes.push(self.mode()?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                        self.expect(TokenKind::RParen, "')'")?;
                    }
                }
                Ok(OpAst::Call { callee, mem, args, ret_modes })
            }
            "sync" => {
                let mut mems = vec![self.ident("a memory value")?];
                while self.eat(TokenKind::Comma) {
                    mems.push(self.ident("a memory value")?);
                }
                Ok(OpAst::Sync { mems })
            }
            "unknown" => Ok(OpAst::Unknown { mode: self.mode()? }),
            _ => Err(err(format!("unknown operation '{text}'"), token.line)),
        }
    }
}

// -- graph construction ------------------------------------------------------

struct GraphBuilder<'a, 'm> {
    module: &'m Module,
    graph: Graph,
    placeholder: NodeId,
    blocks: HashMap<&'a str, NodeId>,
    values: HashMap<&'a str, NodeId>,
    /// Position of the control edge `source -> target` in the target's
    /// predecessor list; `usize::MAX` marks an ambiguous duplicate.
    pred_pos: HashMap<(NodeId, NodeId), usize>,
}

fn build_graph(module: &Module, ast: &GraphAst<'_>) -> Result<Graph, IrError> {
    let mut graph = Graph::new(ast.name);
    let placeholder = graph.new_bad(Mode::I64);
    let mut builder =
        GraphBuilder { module, graph, placeholder, blocks: HashMap::new(), values: HashMap::new(), pred_pos: HashMap::new() };

    // blocks first so jumps can resolve forward
    for (i, block) in ast.blocks.iter().enumerate() {
        let id = if i == 0 {
            if block.labeled {
                return Err(err("the start block cannot be labeled", block.line));
            }
            builder.graph.start_block()
        } else {
            builder.graph.new_block(block.labeled)
        };
        if builder.blocks.insert(block.name, id).is_some() {
            return Err(err(format!("duplicate block '{}'", block.name), block.line));
        }
    }

    builder.allocate_values(ast)?;
    builder.build_terminators(ast)?;
    builder.patch_inputs(ast)?;
    Ok(builder.graph)
}

impl<'a> GraphBuilder<'a, '_> {
    fn block(&self, name: &str, line: usize) -> Result<NodeId, IrError> {
        self.blocks.get(name).copied().ok_or_else(|| err(format!("undefined block '{name}'"), line))
    }

    fn value(&self, name: &str, line: usize) -> Result<NodeId, IrError> {
        self.values.get(name).copied().ok_or_else(|| err(format!("undefined value '{name}'"), line))
    }

    fn entity(&self, name: &str, line: usize) -> Result<crate::ir::EntityRef, IrError> {
        self.module.entities.find_by_name(name).ok_or_else(|| err(format!("undefined entity '@{name}'"), line))
    }

    fn define(&mut self, name: &'a str, node: NodeId, line: usize) -> Result<(), IrError> {
        if self.values.insert(name, node).is_some() {
            return Err(err(format!("value '{name}' defined twice"), line));
        }
        Ok(())
    }

    fn expect_results(results: &[&str], n: usize, line: usize) -> Result<(), IrError> {
        if results.len() == n { Ok(()) } else { Err(err(format!("expected {n} result name(s)"), line)) }
    }

    /// First build pass: allocate every value node, forward references
    /// pointing at a placeholder that the patch pass replaces.
    fn allocate_values(&mut self, ast: &GraphAst<'a>) -> Result<(), IrError> {
        for block_ast in &ast.blocks {
            let block = self.block(block_ast.name, block_ast.line)?;
            for stmt in &block_ast.stmts {
                let Stmt::Assign { results, op, line } = stmt else { continue };
                let (results, line) = (results.as_slice(), *line);
                let ph = self.placeholder;
                match op {
                    OpAst::InitMem => {
                        Self::expect_results(results, 1, line)?;
                        let start = self.graph.start();
                        let node = self.graph.new_proj(start, Mode::M, PN_MEM);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Arg { mode, index } => {
                        Self::expect_results(results, 1, line)?;
                        let start = self.graph.start();
                        let node = self.graph.new_proj(start, *mode, 1 + index);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Const { mode, literal } => {
                        Self::expect_results(results, 1, line)?;
                        let value = Tarval::parse(*mode, literal)
                            .ok_or_else(|| err(format!("invalid {mode} literal '{literal}'"), line))?;
                        let node = self.graph.new_const(value);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::SymAddr { entity } => {
                        Self::expect_results(results, 1, line)?;
                        let e = self.entity(entity, line)?;
                        let node = self.graph.new_symconst(SymKind::Address(e), Mode::P);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::SymSize { mode, entity } => {
                        Self::expect_results(results, 1, line)?;
                        let e = self.entity(entity, line)?;
                        let node = self.graph.new_symconst(SymKind::Size(e), *mode);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::SymAlign { mode, entity } => {
                        Self::expect_results(results, 1, line)?;
                        let e = self.entity(entity, line)?;
                        let node = self.graph.new_symconst(SymKind::Align(e), *mode);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Binop { op, mode, .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_binop(*op, block, *mode, ph, ph);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Cmp { relation, .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_cmp(block, *relation, ph, ph);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Conv { mode, .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_conv(block, ph, *mode);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Confirm { relation, mode, .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_node(
                            NodeKind::Confirm { relation: *relation },
                            *mode,
                            block,
                            vec![ph, ph],
                        );
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Mux { mode, .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_node(NodeKind::Mux, *mode, block, vec![ph, ph, ph]);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Phi { mode, pairs } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_phi(block, *mode, vec![ph; pairs.len()]);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Load { mode, .. } => {
                        Self::expect_results(results, 2, line)?;
                        let tuple = self.graph.new_load(block, ph, ph);
                        let value = self.graph.new_proj(tuple, *mode, PN_LOAD_RES);
                        let mem = self.graph.new_proj(tuple, Mode::M, PN_MEM);
                        self.define(results[0], value, line)?;
                        self.define(results[1], mem, line)?;
                    }
                    OpAst::Store { .. } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_store(block, ph, ph, ph);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Call { callee, args, ret_modes, .. } => {
                        Self::expect_results(results, 1 + ret_modes.len(), line)?;
                        let e = self.entity(callee, line)?;
                        let tuple = self.graph.new_call(block, ph, e, vec![ph; args.len()]);
                        let mem = self.graph.new_proj(tuple, Mode::M, PN_MEM);
                        self.define(results[0], mem, line)?;
                        for (i, mode) in ret_modes.iter().enumerate() {
                            let proj = self.graph.new_proj(tuple, *mode, 1 + i as u32);
                            self.define(results[1 + i], proj, line)?;
                        }
                    }
                    OpAst::Sync { mems } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_sync(block, vec![ph; mems.len()]);
                        self.define(results[0], node, line)?;
                    }
                    OpAst::Unknown { mode } => {
                        Self::expect_results(results, 1, line)?;
                        let node = self.graph.new_unknown(*mode);
                        self.define(results[0], node, line)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn record_edge(&mut self, target: NodeId, pred_x: NodeId) {
        let source = self.graph.block_of(pred_x);
        let pos = self.graph.add_block_pred(target, pred_x);
        self.pred_pos
            .entry((target, source))
            .and_modify(|p| *p = usize::MAX)
            .or_insert(pos);
    }

    fn build_terminators(&mut self, ast: &GraphAst<'a>) -> Result<(), IrError> {
        for block_ast in &ast.blocks {
            let block = self.block(block_ast.name, block_ast.line)?;
            let term =
                block_ast.term.as_ref().ok_or_else(|| err("block has no terminator", block_ast.term_line))?;
            let line = block_ast.term_line;
            match term {
                Term::Jmp { target } => {
                    let t = self.block(target, line)?;
                    let jmp = self.graph.new_jmp(block);
                    self.record_edge(t, jmp);
                }
                Term::Cond { sel, if_true, if_false } => {
                    let sel = self.value(sel, line)?;
                    let t = self.block(if_true, line)?;
                    let f = self.block(if_false, line)?;
                    let cond = self.graph.new_cond(block, sel);
                    let proj_t = self.graph.new_proj(cond, Mode::X, PN_COND_TRUE);
                    let proj_f = self.graph.new_proj(cond, Mode::X, PN_COND_FALSE);
                    self.record_edge(t, proj_t);
                    self.record_edge(f, proj_f);
                }
                Term::Switch { sel, default, cases } => {
                    let sel = self.value(sel, line)?;
                    let sel_mode = self.graph.mode(sel);
                    if !sel_mode.is_int() {
                        return Err(err("switch selector must be an integer", line));
                    }
                    let mut entries = Vec::new();
                    for (i, (lit, _)) in cases.iter().enumerate() {
                        let value = Tarval::parse(sel_mode, lit)
                            .ok_or_else(|| err(format!("invalid case value '{lit}'"), line))?;
                        entries.push(SwitchEntry { value, pn: 1 + i as u32 });
                    }
                    let switch = self.graph.new_switch(block, sel, SwitchTable { entries });
                    let proj_default = self.graph.new_proj(switch, Mode::X, 0);
                    let d = self.block(default, line)?;
                    self.record_edge(d, proj_default);
                    for (i, (_, target)) in cases.iter().enumerate() {
                        let proj = self.graph.new_proj(switch, Mode::X, 1 + i as u32);
                        let t = self.block(target, line)?;
                        self.record_edge(t, proj);
                    }
                }
                Term::Return { values } => {
                    if values.is_empty() {
                        return Err(err("return needs at least its memory operand", line));
                    }
                    let mem = self.value(values[0], line)?;
                    let rest = values[1..]
                        .iter()
                        .map(|v| self.value(v, line))
                        .collect::<Result<Vec<_>, _>>()?;
                    let ret = self.graph.new_return(block, mem, rest);
                    let end_block = self.graph.end_block();
                    self.graph.add_block_pred(end_block, ret);
                }
            }
        }
        Ok(())
    }

    /// Final pass: point every placeholder input at the real operand.
    fn patch_inputs(&mut self, ast: &GraphAst<'a>) -> Result<(), IrError> {
        for block_ast in &ast.blocks {
            let block = self.block(block_ast.name, block_ast.line)?;
            for stmt in &block_ast.stmts {
                match stmt {
                    Stmt::Keep { value, line } => {
                        let v = self.value(value, *line)?;
                        self.graph.add_end_keepalive(v);
                    }
                    Stmt::Assign { results, op, line } => {
                        let line = *line;
                        match op {
                            OpAst::Binop { left, right, .. } | OpAst::Cmp { left, right, .. } => {
                                let node = self.value(results[0], line)?;
                                let (l, r) = (self.value(left, line)?, self.value(right, line)?);
                                self.graph.set_input(node, 0, l);
                                self.graph.set_input(node, 1, r);
                            }
                            OpAst::Conv { value, .. } => {
                                let node = self.value(results[0], line)?;
                                let v = self.value(value, line)?;
                                self.graph.set_input(node, 0, v);
                            }
                            OpAst::Confirm { value, bound, .. } => {
                                let node = self.value(results[0], line)?;
                                let (v, b) = (self.value(value, line)?, self.value(bound, line)?);
                                self.graph.set_input(node, 0, v);
                                self.graph.set_input(node, 1, b);
                            }
                            OpAst::Mux { sel, if_false, if_true, .. } => {
                                let node = self.value(results[0], line)?;
                                for (i, name) in [sel, if_false, if_true].into_iter().enumerate() {
                                    let v = self.value(name, line)?;
                                    self.graph.set_input(node, i, v);
                                }
                            }
                            OpAst::Phi { pairs, .. } => {
                                let phi = self.value(results[0], line)?;
                                if self.graph.arity(phi) != self.graph.arity(block) {
                                    return Err(err(
                                        "phi arity differs from block predecessor count",
                                        line,
                                    ));
                                }
                                for (pred_name, value_name) in pairs {
                                    let source = self.block(pred_name, line)?;
                                    let pos = match self.pred_pos.get(&(block, source)) {
                                        Some(&usize::MAX) => {
                                            return Err(err(
                                                format!("ambiguous phi predecessor '{pred_name}'"),
                                                line,
                                            ));
                                        }
                                        Some(&pos) => pos,
                                        None => {
                                            return Err(err(
                                                format!("'{pred_name}' is not a predecessor"),
                                                line,
                                            ));
                                        }
                                    };
                                    let v = self.value(value_name, line)?;
                                    self.graph.set_input(phi, pos, v);
                                }
                            }
                            OpAst::Load { mem, ptr, .. } => {
                                let tuple = self.graph.input(self.value(results[0], line)?, 0);
                                let (m, p) = (self.value(mem, line)?, self.value(ptr, line)?);
                                self.graph.set_input(tuple, 0, m);
                                self.graph.set_input(tuple, 1, p);
                            }
                            OpAst::Store { mem, ptr, value } => {
                                let node = self.value(results[0], line)?;
                                for (i, name) in [mem, ptr, value].into_iter().enumerate() {
                                    let v = self.value(name, line)?;
                                    self.graph.set_input(node, i, v);
                                }
                            }
                            OpAst::Call { mem, args, .. } => {
                                let tuple = self.graph.input(self.value(results[0], line)?, 0);
                                let m = self.value(mem, line)?;
                                self.graph.set_input(tuple, 0, m);
                                for (i, name) in args.iter().enumerate() {
                                    let v = self.value(name, line)?;
                                    self.graph.set_input(tuple, 1 + i, v);
                                }
                            }
                            OpAst::Sync { mems } => {
                                let node = self.value(results[0], line)?;
                                for (i, name) in mems.iter().enumerate() {
                                    let v = self.value(name, line)?;
                                    self.graph.set_input(node, i, v);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
