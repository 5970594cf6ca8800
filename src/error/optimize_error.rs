// src/error/optimize_error.rs
use super::ir_error::IrError;
use thiserror::Error;

/// Errors surfaced by optimization phases.
///
/// Internal solver invariants (non-monotone retyping, malformed partitions)
/// are programming errors and assert instead; only conditions caused by the
/// input graph are reported through this type.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("graph '{graph}' failed verification before optimization: {source}")]
    RejectedInput {
        graph: String,
        #[source]
        source: IrError,
    },

    #[error("phase '{phase}' failed on graph '{graph}': {message}")]
    PhaseFailed { phase: &'static str, graph: String, message: String },
}
