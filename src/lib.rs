// src/lib.rs
/// # seaopt Optimization Library
///
/// The seaopt library is a middle-end for a graph-based SSA intermediate
/// representation. It provides the IR surface, a textual reader, and an
/// optimization pipeline whose centerpiece is a combined pass performing
/// sparse conditional constant propagation, global value numbering and
/// unreachable-code elimination in one fixed point.
///
/// ## Important modules:
/// * `ir` - The SSA graph, modes, target values, entities and verification
/// * `ir::optimizer` - The optimization phases and the pipeline driver
/// * `reader` - Parses the textual IR format into modules
/// * `printers` - Renders graphs and modules back to text
/// * `error` - Error types and console reporting utilities
/// * `cli` - Command-line interface of the `seaopt` binary
/// * `time` - Phase timing for the `--timings` flag
pub mod cli;
pub mod error;
pub mod ir;
pub mod printers;
pub mod reader;
pub mod time;
