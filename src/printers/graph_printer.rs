// src/printers/graph_printer.rs
//! Deterministic textual dumps of graphs and modules.
//!
//! Blocks appear in reverse post-order (kept-alive blocks after them),
//! nodes within a block in arena order, so the output is stable for a
//! fixed construction order and usable in snapshot tests.

use crate::ir::cfg::CfgView;
use crate::ir::graph::{Graph, NodeId};
use crate::ir::module::Module;
use crate::ir::node::{NodeKind, SymKind};
use std::fmt;
use std::fmt::Write as _;

fn fmt_node(ir: &Graph, n: NodeId, out: &mut String) {
    let _ = write!(out, "    {n}: {} = ", ir.mode(n));
    match ir.kind(n) {
        NodeKind::Const { value } => {
            let _ = write!(out, "const[{value}]");
        }
        NodeKind::SymConst { kind } => {
            let (what, e) = match kind {
                SymKind::Address(e) => ("", e),
                SymKind::Size(e) => ("size ", e),
                SymKind::Align(e) => ("align ", e),
            };
            let _ = write!(out, "symconst[{what}e{}]", e.0);
        }
        NodeKind::Proj { pn } => {
            let _ = write!(out, "proj[{pn}]");
        }
        NodeKind::Cmp { relation } => {
            let _ = write!(out, "cmp[{relation}]");
        }
        NodeKind::Confirm { relation } => {
            let _ = write!(out, "confirm[{relation}]");
        }
        NodeKind::Call { callee } => {
            let _ = write!(out, "call[e{}]", callee.0);
        }
        NodeKind::Switch { table } => {
            let _ = out.write_str("switch[");
            for (i, entry) in table.entries.iter().enumerate() {
                if i > 0 {
                    let _ = out.write_str(", ");
                }
                let _ = write!(out, "{}: {}", entry.value, entry.pn);
            }
            let _ = out.write_str("]");
        }
        kind => {
            let _ = out.write_str(kind.opcode().mnemonic());
        }
    }
    let _ = out.write_str("(");
    for (i, pred) in ir.inputs(n).iter().enumerate() {
        if i > 0 {
            let _ = out.write_str(", ");
        }
        let _ = write!(out, "{pred}");
    }
    let _ = out.write_str(")\n");
}

/// Renders one graph.
#[must_use]
pub fn print_graph(ir: &Graph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "graph @{} {{", ir.name);

    let view = CfgView::build(ir);
    let mut blocks = view.reverse_post_order();
    blocks.extend(view.unreached_blocks());

    // group live nodes by containing block, in arena order
    let mut live = ir.walk_live();
    live.sort_unstable();
    for &block in &blocks {
        let _ = write!(out, "  block {block}");
        if ir.arity(block) > 0 {
            let _ = out.write_str(" <-");
            for (i, pred) in ir.inputs(block).iter().enumerate() {
                let _ = write!(out, "{}{pred}", if i > 0 { ", " } else { " " });
            }
        }
        let _ = out.write_str(":\n");
        for &n in &live {
            if n != block && ir.block_of(n) == block && !matches!(ir.kind(n), NodeKind::Block { .. }) {
                fmt_node(ir, n, &mut out);
            }
        }
    }

    if !ir.keepalives().is_empty() {
        let _ = out.write_str("  keep:");
        for (i, k) in ir.keepalives().iter().enumerate() {
            let _ = write!(out, "{}{k}", if i > 0 { ", " } else { " " });
        }
        let _ = out.write_str("\n");
    }
    let _ = out.write_str("}\n");
    out
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_graph(self))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {} {{", self.name)?;
        for (er, entity) in self.entities.iter() {
            writeln!(f, "  entity e{} @{} size {} align {}", er.0, entity.name, entity.size, entity.align)?;
        }
        for graph in &self.graphs {
            for line in print_graph(graph).trim_end_matches('\n').lines() {
                writeln!(f, "  {line}")?;
            }
        }
        write!(f, "}}")
    }
}
