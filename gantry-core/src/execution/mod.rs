// Execution engine
// Matrix expansion, job scheduling and result aggregation.

pub mod context;
pub mod events;
pub mod job;
pub mod matrix;
pub mod orchestrator;
pub mod report;

pub use context::ExecutionContext;
pub use events::{
    progress_channel, EventSender, ExecutionEvent, ProgressReceiver, ProgressSender,
};
pub use job::JobRunner;
pub use matrix::{AxisAssignment, GuardSpec, JobConfig, JobId, MatrixExpander, StepAction, StepSpec};
pub use orchestrator::{OrchestratorConfig, WorkflowOrchestrator};
pub use report::{
    FailReason, JobReport, JobResult, JobStatus, SkipReason, StepOutcome, StepReport, StepResult,
    WorkflowReport, WorkflowResult, WorkflowStatus,
};
