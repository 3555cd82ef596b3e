// Job runner
// Executes one expanded job's steps in order, recording every step's result.

use crate::condition::ConditionEvaluator;
use crate::execution::context::ExecutionContext;
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::matrix::{JobConfig, StepAction, StepSpec};
use crate::execution::report::{
    FailReason, JobResult, JobStatus, SkipReason, StepOutcome, StepResult,
};
use crate::runners::action::ActionRegistry;
use crate::runners::shell::{OutputLineFn, Shell, ShellRunner};

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Runs one job configuration to completion.
///
/// The runner never returns an error: every way a step can go wrong is
/// captured in its `StepResult`, and the job's status is derived from them.
pub struct JobRunner {
    shell: ShellRunner,
    actions: Arc<ActionRegistry>,
    events: Option<ProgressSender>,
    default_step_timeout: Duration,
}

impl JobRunner {
    pub fn new(
        actions: Arc<ActionRegistry>,
        events: Option<ProgressSender>,
        default_step_timeout: Duration,
    ) -> Self {
        JobRunner {
            shell: ShellRunner::new(),
            actions,
            events,
            default_step_timeout,
        }
    }

    pub async fn run(
        &self,
        config: &JobConfig,
        working_dir: &Path,
        cancel: &CancellationToken,
    ) -> JobResult {
        let started = Instant::now();
        let mut ctx = ExecutionContext::new(config, working_dir.to_path_buf());

        // Job-level guard decides whether any step runs at all. A guard that
        // failed to parse fails this job and leaves siblings untouched.
        if let Some(guard) = &config.guard {
            let verdict = match &guard.parsed {
                Ok(parsed) => ConditionEvaluator::new(&ctx)
                    .evaluate(parsed)
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            match verdict {
                Ok(true) => {}
                Ok(false) => {
                    self.events
                        .send_event(ExecutionEvent::job_skipped(
                            config.id.clone(),
                            SkipReason::GuardFalse,
                        ));
                    return skipped_result(config, SkipReason::GuardFalse);
                }
                Err(message) => {
                    let result = JobResult {
                        id: config.id.clone(),
                        display_name: config.display_name.clone(),
                        axes: config.axes.clone(),
                        status: JobStatus::Failed,
                        skip_reason: None,
                        fail_reason: Some(format!("invalid job condition: {}", message)),
                        steps: Vec::new(),
                        duration: started.elapsed(),
                    };
                    self.events.send_event(ExecutionEvent::job_completed(
                        config.id.clone(),
                        JobStatus::Failed,
                        result.duration,
                    ));
                    return result;
                }
            }
        }

        self.events.send_event(ExecutionEvent::job_started(
            config.id.clone(),
            config.display_name.clone(),
            config.steps.len(),
        ));

        let mut failed = false;
        for (index, step) in config.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                self.record_skip(&mut ctx, config, step, index, SkipReason::Cancelled);
                continue;
            }
            if failed {
                self.record_skip(&mut ctx, config, step, index, SkipReason::PriorStepFailed);
                continue;
            }

            match self.step_guard_allows(&ctx, step) {
                GuardDecision::Run => {}
                GuardDecision::Skip => {
                    self.record_skip(&mut ctx, config, step, index, SkipReason::GuardFalse);
                    continue;
                }
                GuardDecision::Invalid(message) => {
                    let result = StepResult::failed(
                        step.id.clone(),
                        step.name.clone(),
                        FailReason::InvalidCondition(message),
                        String::new(),
                        String::new(),
                        None,
                        Duration::ZERO,
                    );
                    self.events.send_event(ExecutionEvent::step_completed(
                        config.id.clone(),
                        step.name.clone(),
                        index,
                        StepOutcome::Failed,
                        Duration::ZERO,
                        None,
                    ));
                    ctx.record_step(result);
                    if !step.continue_on_error {
                        failed = true;
                    }
                    continue;
                }
            }

            self.events.send_event(ExecutionEvent::step_started(
                config.id.clone(),
                step.name.clone(),
                index,
            ));

            let result = self.run_step(&ctx, config, step, index, cancel).await;

            self.events.send_event(ExecutionEvent::step_completed(
                config.id.clone(),
                step.name.clone(),
                index,
                result.outcome,
                result.duration,
                result.exit_code,
            ));

            if result.outcome == StepOutcome::Failed && !step.continue_on_error {
                failed = true;
            }
            ctx.record_step(result);
        }

        let cancelled = ctx
            .step_results
            .iter()
            .any(|r| r.skip_reason == Some(SkipReason::Cancelled));
        let status = if failed {
            JobStatus::Failed
        } else if cancelled {
            JobStatus::Skipped
        } else {
            JobStatus::Succeeded
        };
        let duration = started.elapsed();

        self.events.send_event(ExecutionEvent::job_completed(
            config.id.clone(),
            status,
            duration,
        ));

        let fail_reason = if failed {
            ctx.step_results
                .iter()
                .find(|r| r.outcome == StepOutcome::Failed)
                .and_then(|r| r.fail_reason.as_ref())
                .map(|r| r.to_string())
        } else {
            None
        };

        JobResult {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            axes: config.axes.clone(),
            status,
            skip_reason: (status == JobStatus::Skipped).then_some(SkipReason::Cancelled),
            fail_reason,
            steps: ctx.into_results(),
            duration,
        }
    }

    fn step_guard_allows(&self, ctx: &ExecutionContext, step: &StepSpec) -> GuardDecision {
        let Some(guard) = &step.guard else {
            return GuardDecision::Run;
        };
        let parsed = match &guard.parsed {
            Ok(parsed) => parsed,
            Err(e) => return GuardDecision::Invalid(e.to_string()),
        };
        match ConditionEvaluator::new(ctx).evaluate(parsed) {
            Ok(true) => GuardDecision::Run,
            Ok(false) => GuardDecision::Skip,
            Err(e) => GuardDecision::Invalid(e.to_string()),
        }
    }

    async fn run_step(
        &self,
        ctx: &ExecutionContext,
        config: &JobConfig,
        step: &StepSpec,
        index: usize,
        cancel: &CancellationToken,
    ) -> StepResult {
        let started = Instant::now();
        let env = ctx.step_env(step);
        let working_dir = ctx.step_working_dir(step);
        let timeout = step.timeout.unwrap_or(self.default_step_timeout);

        match &step.action {
            StepAction::Run { command, shell } => {
                let on_line = self.line_forwarder(config, index);
                let output = self
                    .shell
                    .run(
                        command,
                        Shell::from_name(shell),
                        &env,
                        &working_dir,
                        timeout,
                        cancel,
                        on_line,
                    )
                    .await;
                output.into_step_result(step.id.clone(), step.name.clone(), started.elapsed())
            }
            StepAction::Use { action, with } => {
                let Some(runner) = self.actions.get(action) else {
                    return StepResult::failed(
                        step.id.clone(),
                        step.name.clone(),
                        FailReason::LaunchError(format!("unregistered action '{}'", action)),
                        String::new(),
                        String::new(),
                        None,
                        started.elapsed(),
                    );
                };

                match tokio::time::timeout(timeout, runner.run(with, &env, &working_dir)).await {
                    Ok(outcome) if outcome.success => StepResult::succeeded(
                        step.id.clone(),
                        step.name.clone(),
                        outcome.output,
                        String::new(),
                        None,
                        started.elapsed(),
                    ),
                    Ok(outcome) => StepResult::failed(
                        step.id.clone(),
                        step.name.clone(),
                        FailReason::LaunchError(
                            outcome
                                .error
                                .unwrap_or_else(|| format!("action '{}' failed", action)),
                        ),
                        outcome.output,
                        String::new(),
                        None,
                        started.elapsed(),
                    ),
                    Err(_) => StepResult::failed(
                        step.id.clone(),
                        step.name.clone(),
                        FailReason::Timeout,
                        String::new(),
                        String::new(),
                        None,
                        started.elapsed(),
                    ),
                }
            }
        }
    }

    fn line_forwarder(&self, config: &JobConfig, index: usize) -> Option<OutputLineFn> {
        let sender = self.events.clone()?;
        let job_id = config.id.clone();
        Some(Arc::new(move |line: &str, is_error: bool| {
            sender.send_event(ExecutionEvent::step_output(
                job_id.clone(),
                index,
                line,
                is_error,
            ));
        }))
    }

    fn record_skip(
        &self,
        ctx: &mut ExecutionContext,
        config: &JobConfig,
        step: &StepSpec,
        index: usize,
        reason: SkipReason,
    ) {
        self.events.send_event(ExecutionEvent::step_skipped(
            config.id.clone(),
            step.name.clone(),
            index,
            reason,
        ));
        ctx.record_step(StepResult::skipped(
            step.id.clone(),
            step.name.clone(),
            reason,
        ));
    }
}

enum GuardDecision {
    Run,
    Skip,
    Invalid(String),
}

/// Result for a job that was skipped before any step ran.
pub fn skipped_result(config: &JobConfig, reason: SkipReason) -> JobResult {
    JobResult {
        id: config.id.clone(),
        display_name: config.display_name.clone(),
        axes: config.axes.clone(),
        status: JobStatus::Skipped,
        skip_reason: Some(reason),
        fail_reason: None,
        steps: config
            .steps
            .iter()
            .map(|step| StepResult::skipped(step.id.clone(), step.name.clone(), reason))
            .collect(),
        duration: Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::matrix::MatrixExpander;
    use crate::workflow::parser::WorkflowParser;

    fn runner() -> JobRunner {
        JobRunner::new(
            Arc::new(ActionRegistry::with_builtins()),
            None,
            Duration::from_secs(30),
        )
    }

    async fn run_yaml(yaml: &str) -> Vec<JobResult> {
        let workflow = WorkflowParser::parse_and_validate(yaml).unwrap();
        let configs = MatrixExpander::expand(&workflow).unwrap();
        let runner = runner();
        let working_dir = std::env::current_dir().unwrap();
        let cancel = CancellationToken::new();

        let mut results = Vec::new();
        for config in &configs {
            results.push(runner.run(config, &working_dir, &cancel).await);
        }
        results
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: echo first
      - run: echo second
"#,
        )
        .await;

        assert_eq!(results[0].status, JobStatus::Succeeded);
        assert_eq!(results[0].steps.len(), 2);
        assert!(results[0].steps[0].stdout.contains("first"));
        assert!(results[0].steps[1].stdout.contains("second"));
    }

    #[tokio::test]
    async fn test_failure_skips_remaining_steps() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: exit 1
      - run: echo never
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.steps[0].outcome, StepOutcome::Failed);
        assert_eq!(job.steps[0].fail_reason, Some(FailReason::NonZeroExit(1)));
        assert_eq!(job.steps[1].outcome, StepOutcome::Skipped);
        assert_eq!(job.steps[1].skip_reason, Some(SkipReason::PriorStepFailed));
    }

    #[tokio::test]
    async fn test_continue_on_error_keeps_going() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: exit 1
        continue-on-error: true
      - run: echo survived
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.steps[0].outcome, StepOutcome::Failed);
        assert_eq!(job.steps[1].outcome, StepOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_guard_skips_step_by_os() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: echo on-linux
        if: os == 'linux'
      - run: echo on-windows
        if: os == 'windows'
      - run: echo always
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.steps[0].outcome, StepOutcome::Succeeded);
        assert_eq!(job.steps[1].outcome, StepOutcome::Skipped);
        assert_eq!(job.steps[1].skip_reason, Some(SkipReason::GuardFalse));
        assert_eq!(job.steps[2].outcome, StepOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_outcome_guard_after_skip() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    runs-on: windows-latest
    steps:
      - id: setup
        run: echo setup
        if: os == 'linux'
      - run: echo dependent
        if: outcome('setup') == succeeded
      - run: echo fallback
        if: outcome('setup') == skipped
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.steps[0].outcome, StepOutcome::Skipped);
        assert_eq!(job.steps[1].outcome, StepOutcome::Skipped);
        assert_eq!(job.steps[2].outcome, StepOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_invalid_guard_fails_step() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: echo hello
        if: bogus == 'value'
      - run: echo after
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(matches!(
            job.steps[0].fail_reason,
            Some(FailReason::InvalidCondition(_))
        ));
        assert_eq!(job.steps[1].skip_reason, Some(SkipReason::PriorStepFailed));
    }

    #[tokio::test]
    async fn test_malformed_step_guard_fails_step() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: echo hello
        if: "os == "
      - run: echo after
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(matches!(
            job.steps[0].fail_reason,
            Some(FailReason::InvalidCondition(_))
        ));
        assert_eq!(job.steps[1].skip_reason, Some(SkipReason::PriorStepFailed));
    }

    #[tokio::test]
    async fn test_invalid_guard_tolerated_with_continue_on_error() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: echo hello
        if: bogus == 'value'
        continue-on-error: true
      - run: echo after
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(matches!(
            job.steps[0].fail_reason,
            Some(FailReason::InvalidCondition(_))
        ));
        assert_eq!(job.steps[1].outcome, StepOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_malformed_job_guard_fails_job() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    if: "&& broken"
    steps:
      - run: echo never
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .fail_reason
            .as_deref()
            .unwrap()
            .starts_with("invalid job condition"));
    }

    #[tokio::test]
    async fn test_job_guard_skips_whole_job() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    if: os == 'windows'
    steps:
      - run: echo never
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Skipped);
        assert_eq!(job.skip_reason, Some(SkipReason::GuardFalse));
        assert_eq!(job.steps.len(), 1);
        assert_eq!(job.steps[0].outcome, StepOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_uses_step_runs_builtin_action() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - uses: setup-toolchain@v1
        with:
          toolchain: stable
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.steps[1].stdout.contains("stable"));
    }

    #[tokio::test]
    async fn test_unregistered_action_fails_contained() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - uses: some/unknown-action@v1
"#,
        )
        .await;

        let job = &results[0];
        assert_eq!(job.status, JobStatus::Failed);
        assert!(matches!(
            job.steps[0].fail_reason,
            Some(FailReason::LaunchError(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_job_skips_all_steps() {
        let workflow = WorkflowParser::parse_and_validate(
            r#"
name: ci
on: push
jobs:
  build:
    steps:
      - run: echo one
      - run: echo two
"#,
        )
        .unwrap();
        let configs = MatrixExpander::expand(&workflow).unwrap();
        let runner = runner();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner
            .run(&configs[0], &std::env::current_dir().unwrap(), &cancel)
            .await;

        // The job records every step as cancelled rather than running them.
        assert_eq!(result.status, JobStatus::Skipped);
        assert_eq!(result.skip_reason, Some(SkipReason::Cancelled));
        assert!(result
            .steps
            .iter()
            .all(|s| s.skip_reason == Some(SkipReason::Cancelled)));
    }

    #[tokio::test]
    async fn test_step_env_visible_to_command() {
        let results = run_yaml(
            r#"
name: ci
on: push
jobs:
  build:
    env:
      GREETING: hello
    steps:
      - run: echo "$GREETING world"
"#,
        )
        .await;

        assert!(results[0].steps[0].stdout.contains("hello world"));
    }
}
