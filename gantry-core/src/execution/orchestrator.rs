// Workflow orchestrator
// Expands a workflow into jobs and runs them concurrently under an admission
// limit, with fail-fast and cooperative cancellation.

use crate::error::{RunnerError, RunnerResult};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::job::{skipped_result, JobRunner};
use crate::execution::matrix::MatrixExpander;
use crate::execution::report::{JobStatus, SkipReason, WorkflowResult, WorkflowStatus};
use crate::runners::action::ActionRegistry;
use crate::workflow::models::Workflow;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum jobs running at once; zero means no limit.
    pub max_parallel_jobs: usize,
    /// Timeout applied to steps that do not declare their own.
    pub default_step_timeout: Duration,
    /// Cancel remaining jobs once one fails, regardless of per-job strategy.
    pub fail_fast: bool,
    /// Directory jobs execute in.
    pub working_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_parallel_jobs: 0,
            default_step_timeout: Duration::from_secs(60 * 60),
            fail_fast: false,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Runs a whole workflow: expansion, scheduling, aggregation.
pub struct WorkflowOrchestrator {
    config: OrchestratorConfig,
    actions: Arc<ActionRegistry>,
    events: Option<ProgressSender>,
    cancel: CancellationToken,
}

impl WorkflowOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        WorkflowOrchestrator {
            config,
            actions: Arc::new(ActionRegistry::with_builtins()),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: ProgressSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = Arc::new(actions);
        self
    }

    /// Token that cancels the run when triggered. Running steps are killed
    /// and jobs that have not started are marked skipped.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute the workflow to completion.
    ///
    /// Matrix expansion errors abort the run before anything executes. Once
    /// jobs start, every failure is contained in the result: the returned
    /// `WorkflowResult` enumerates all expanded jobs in declaration order.
    pub async fn run(&self, workflow: &Workflow) -> RunnerResult<WorkflowResult> {
        let started = Instant::now();
        let configs = MatrixExpander::expand(workflow)?;

        self.events.send_event(ExecutionEvent::workflow_started(
            workflow.name.clone().unwrap_or_default(),
            configs.len(),
        ));

        let permits = if self.config.max_parallel_jobs == 0 {
            configs.len().max(1)
        } else {
            self.config.max_parallel_jobs
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let fail_fast = self.config.fail_fast || configs.iter().any(|c| c.fail_fast);

        let runner = Arc::new(JobRunner::new(
            self.actions.clone(),
            self.events.clone(),
            self.config.default_step_timeout,
        ));

        let mut handles = Vec::with_capacity(configs.len());
        let mut tolerated = Vec::with_capacity(configs.len());
        for config in configs {
            tolerated.push(config.continue_on_error);

            let runner = runner.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();
            let events = self.events.clone();
            let working_dir = self.config.working_dir.clone();
            let continue_on_error = config.continue_on_error;

            // Admission is FIFO: tasks queue on the semaphore in spawn order,
            // and cancellation releases the queue without running the job.
            handles.push(tokio::spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return skipped_result(&config, SkipReason::Cancelled),
                    },
                    _ = cancel.cancelled() => {
                        events.send_event(ExecutionEvent::job_skipped(
                            config.id.clone(),
                            SkipReason::Cancelled,
                        ));
                        return skipped_result(&config, SkipReason::Cancelled);
                    }
                };

                if cancel.is_cancelled() {
                    events.send_event(ExecutionEvent::job_skipped(
                        config.id.clone(),
                        SkipReason::Cancelled,
                    ));
                    return skipped_result(&config, SkipReason::Cancelled);
                }

                let result = runner.run(&config, &working_dir, &cancel).await;
                if fail_fast && result.status == JobStatus::Failed && !continue_on_error {
                    cancel.cancel();
                }
                result
            }));
        }

        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| RunnerError::Internal(format!("job task panicked: {}", e)))?;
            jobs.push(result);
        }

        let failed = jobs
            .iter()
            .zip(&tolerated)
            .any(|(job, tolerated)| job.status == JobStatus::Failed && !tolerated);
        let cancelled = self.cancel.is_cancelled()
            || jobs
                .iter()
                .any(|job| job.skip_reason == Some(SkipReason::Cancelled));
        let status = if failed {
            WorkflowStatus::Failed
        } else if cancelled {
            WorkflowStatus::Cancelled
        } else {
            WorkflowStatus::Succeeded
        };

        let duration = started.elapsed();
        self.events.send_event(ExecutionEvent::workflow_completed(
            workflow.name.clone().unwrap_or_default(),
            status,
            duration,
        ));

        Ok(WorkflowResult {
            status,
            jobs,
            duration,
        })
    }
}
