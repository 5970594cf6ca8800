// src/error/error_reporter.rs
use console::style;

use crate::error::ir_error::IrError;

/// Error reporter with source context display for IR text files.
pub struct ErrorReporter<'a> {
    file_name: &'a str,
    source: &'a str,
}

impl<'a> ErrorReporter<'a> {
    #[must_use]
    pub const fn new(file_name: &'a str, source: &'a str) -> Self {
        Self { file_name, source }
    }

    /// Reports an IR error with source context when the error carries a line.
    pub fn report(&self, error: &IrError) {
        eprintln!("{} {}: {}", style("ERROR").red().bold(), style(self.file_name).red(), style(error).yellow());

        let Some(line) = error.line() else { return };
        let Some(source_line) = self.source.lines().nth(line.saturating_sub(1)) else { return };

        eprintln!("{line:4} │ {source_line}");
        let marker = "^".repeat(source_line.trim_end().len().max(1));
        eprintln!("     │ {}", style(marker).red().bold());
    }
}
