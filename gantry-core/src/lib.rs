// Gantry Core Library
// Workflow parsing, matrix expansion and local execution

pub mod condition;
pub mod error;
pub mod execution;
pub mod platform;
pub mod runners;
pub mod workflow;

// Re-export commonly used types
pub use error::{RunnerError, RunnerResult};

// Re-export workflow types
pub use workflow::{
    AxisValue, EventConfig, Job, Matrix, Step, Strategy, Trigger, Workflow, WorkflowParser,
};

// Re-export condition types
pub use condition::{ConditionError, ConditionEvaluator, Guard};

// Re-export execution types
pub use execution::{
    progress_channel, ExecutionEvent, JobConfig, JobId, JobResult, JobRunner, JobStatus,
    MatrixExpander, OrchestratorConfig, ProgressReceiver, ProgressSender, StepOutcome, StepResult,
    WorkflowOrchestrator, WorkflowReport, WorkflowResult, WorkflowStatus,
};

// Re-export runner types
pub use runners::{ActionRegistry, ActionRunner, Shell, ShellRunner};

pub use platform::OsFamily;

// Cancellation is part of the public execution API
pub use tokio_util::sync::CancellationToken;
