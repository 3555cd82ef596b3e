// Execution events
// Progress reporting and event types for workflow execution

use crate::execution::matrix::JobId;
use crate::execution::report::{JobStatus, SkipReason, StepOutcome, WorkflowStatus};

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted during workflow execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Workflow execution started
    WorkflowStarted { name: String, total_jobs: usize },

    /// Workflow execution completed
    WorkflowCompleted {
        name: String,
        status: WorkflowStatus,
        duration: Duration,
    },

    /// Job execution started
    JobStarted {
        job_id: JobId,
        display_name: String,
        total_steps: usize,
    },

    /// Job execution completed
    JobCompleted {
        job_id: JobId,
        status: JobStatus,
        duration: Duration,
    },

    /// Job was skipped before any step ran
    JobSkipped { job_id: JobId, reason: SkipReason },

    /// Step execution started
    StepStarted {
        job_id: JobId,
        step_name: String,
        step_index: usize,
    },

    /// Step output (stdout/stderr)
    StepOutput {
        job_id: JobId,
        step_index: usize,
        line: String,
        is_error: bool,
    },

    /// Step execution completed
    StepCompleted {
        job_id: JobId,
        step_name: String,
        step_index: usize,
        outcome: StepOutcome,
        duration: Duration,
        exit_code: Option<i32>,
    },

    /// Step was skipped
    StepSkipped {
        job_id: JobId,
        step_name: String,
        step_index: usize,
        reason: SkipReason,
    },
}

impl ExecutionEvent {
    /// Create a workflow started event
    pub fn workflow_started(name: impl Into<String>, total_jobs: usize) -> Self {
        Self::WorkflowStarted {
            name: name.into(),
            total_jobs,
        }
    }

    /// Create a workflow completed event
    pub fn workflow_completed(
        name: impl Into<String>,
        status: WorkflowStatus,
        duration: Duration,
    ) -> Self {
        Self::WorkflowCompleted {
            name: name.into(),
            status,
            duration,
        }
    }

    /// Create a job started event
    pub fn job_started(job_id: JobId, display_name: impl Into<String>, total_steps: usize) -> Self {
        Self::JobStarted {
            job_id,
            display_name: display_name.into(),
            total_steps,
        }
    }

    /// Create a job completed event
    pub fn job_completed(job_id: JobId, status: JobStatus, duration: Duration) -> Self {
        Self::JobCompleted {
            job_id,
            status,
            duration,
        }
    }

    /// Create a job skipped event
    pub fn job_skipped(job_id: JobId, reason: SkipReason) -> Self {
        Self::JobSkipped { job_id, reason }
    }

    /// Create a step started event
    pub fn step_started(job_id: JobId, step_name: impl Into<String>, step_index: usize) -> Self {
        Self::StepStarted {
            job_id,
            step_name: step_name.into(),
            step_index,
        }
    }

    /// Create a step output event
    pub fn step_output(
        job_id: JobId,
        step_index: usize,
        line: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::StepOutput {
            job_id,
            step_index,
            line: line.into(),
            is_error,
        }
    }

    /// Create a step completed event
    pub fn step_completed(
        job_id: JobId,
        step_name: impl Into<String>,
        step_index: usize,
        outcome: StepOutcome,
        duration: Duration,
        exit_code: Option<i32>,
    ) -> Self {
        Self::StepCompleted {
            job_id,
            step_name: step_name.into(),
            step_index,
            outcome,
            duration,
            exit_code,
        }
    }

    /// Create a step skipped event
    pub fn step_skipped(
        job_id: JobId,
        step_name: impl Into<String>,
        step_index: usize,
        reason: SkipReason,
    ) -> Self {
        Self::StepSkipped {
            job_id,
            step_name: step_name.into(),
            step_index,
            reason,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
