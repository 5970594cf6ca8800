// src/error/ir_error.rs
use thiserror::Error;

/// Errors raised while reading or verifying IR.
#[derive(Debug, Error)]
pub enum IrError {
    #[error("parse error: {message} at line {line}")]
    Parse { message: String, line: usize },

    #[error("invalid graph '{graph}': {message} ({node})")]
    InvalidGraph { graph: String, node: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IrError {
    /// The source line the error points at, when it carries one.
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            IrError::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}
