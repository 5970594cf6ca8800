use crate::error::OptimizeError;
use crate::ir::Module;

/// One optimization phase over a module.
pub trait Phase {
    fn name(&self) -> &'static str;

    /// Runs the phase; returns whether any graph was modified.
    ///
    /// # Errors
    /// Propagates the phase's failure; the pipeline stops at the first one.
    fn run(&mut self, module: &mut Module) -> Result<bool, OptimizeError>;
}

/// Runs the phases in order, reporting whether anything changed.
///
/// # Errors
/// Returns the first phase error; later phases do not run.
pub fn run_pipeline(module: &mut Module, phases: &mut [Box<dyn Phase>]) -> Result<bool, OptimizeError> {
    let mut changed = false;
    for phase in phases {
        changed |= phase.run(module)?;
    }
    Ok(changed)
}
