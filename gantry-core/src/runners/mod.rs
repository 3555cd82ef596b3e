// Step runners
// Shell command execution and pluggable action handlers.

pub mod action;
pub mod shell;

pub use action::{ActionOutcome, ActionRegistry, ActionRunner};
pub use shell::{CommandOutput, OutputLineFn, Shell, ShellRunner};
