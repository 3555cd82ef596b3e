// Per-job execution context
// Carries the axis assignment, resolved environment and accumulated step
// results while a job runs.

use crate::execution::matrix::{AxisAssignment, JobConfig, JobId, StepSpec};
use crate::execution::report::{StepOutcome, StepResult};
use crate::platform::OsFamily;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// State visible to guards and steps while a job executes.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub job_id: JobId,
    pub axes: AxisAssignment,
    pub os_family: OsFamily,
    pub env: HashMap<String, String>,
    pub working_dir: PathBuf,
    pub step_results: Vec<StepResult>,
}

impl ExecutionContext {
    pub fn new(config: &JobConfig, working_dir: PathBuf) -> Self {
        ExecutionContext {
            job_id: config.id.clone(),
            axes: config.axes.clone(),
            os_family: config.os_family,
            env: config.env.clone(),
            working_dir,
            step_results: Vec::new(),
        }
    }

    /// Record a completed step so later guards can reference its outcome.
    pub fn record_step(&mut self, result: StepResult) {
        self.step_results.push(result);
    }

    /// Look up a recorded step's outcome by id, falling back to name.
    pub fn outcome_of(&self, step: &str) -> Option<StepOutcome> {
        self.step_results
            .iter()
            .find(|r| r.id.as_deref() == Some(step))
            .or_else(|| self.step_results.iter().find(|r| r.name == step))
            .map(|r| r.outcome)
    }

    /// Environment for one step: the job environment with step-level
    /// overrides applied on top.
    pub fn step_env(&self, step: &StepSpec) -> HashMap<String, String> {
        let mut env = self.env.clone();
        env.extend(step.env.clone());
        env
    }

    /// Working directory for one step.
    pub fn step_working_dir(&self, step: &StepSpec) -> PathBuf {
        match &step.working_directory {
            Some(dir) => {
                let path = Path::new(dir);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.working_dir.join(path)
                }
            }
            None => self.working_dir.clone(),
        }
    }

    pub fn into_results(self) -> Vec<StepResult> {
        self.step_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::matrix::{StepAction, StepSpec};
    use crate::execution::report::SkipReason;

    use indexmap::IndexMap;
    use std::time::Duration;

    fn test_step(env: &[(&str, &str)], working_directory: Option<&str>) -> StepSpec {
        StepSpec {
            id: None,
            name: "step".to_string(),
            guard: None,
            action: StepAction::Run {
                command: "true".to_string(),
                shell: String::new(),
            },
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            continue_on_error: false,
            timeout: None,
            working_directory: working_directory.map(String::from),
        }
    }

    fn test_context() -> ExecutionContext {
        ExecutionContext {
            job_id: JobId::new("test"),
            axes: IndexMap::new(),
            os_family: OsFamily::Linux,
            env: [("BASE".to_string(), "job".to_string())].into(),
            working_dir: PathBuf::from("/work"),
            step_results: Vec::new(),
        }
    }

    #[test]
    fn test_step_env_overrides_job_env() {
        let ctx = test_context();
        let step = test_step(&[("BASE", "step"), ("EXTRA", "1")], None);
        let env = ctx.step_env(&step);
        assert_eq!(env.get("BASE").map(String::as_str), Some("step"));
        assert_eq!(env.get("EXTRA").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_step_working_dir_relative_and_absolute() {
        let ctx = test_context();
        let step = test_step(&[], Some("sub"));
        assert_eq!(ctx.step_working_dir(&step), PathBuf::from("/work/sub"));

        let step = test_step(&[], Some("/elsewhere"));
        assert_eq!(ctx.step_working_dir(&step), PathBuf::from("/elsewhere"));

        let step = test_step(&[], None);
        assert_eq!(ctx.step_working_dir(&step), PathBuf::from("/work"));
    }

    #[test]
    fn test_outcome_of_prefers_id_over_name() {
        let mut ctx = test_context();
        ctx.record_step(StepResult::skipped(
            Some("build".to_string()),
            "Build".to_string(),
            SkipReason::GuardFalse,
        ));
        ctx.record_step(StepResult::succeeded(
            None,
            "build".to_string(),
            String::new(),
            String::new(),
            Some(0),
            Duration::ZERO,
        ));

        assert_eq!(ctx.outcome_of("build"), Some(StepOutcome::Skipped));
        assert_eq!(ctx.outcome_of("Build"), Some(StepOutcome::Skipped));
        assert_eq!(ctx.outcome_of("missing"), None);
    }
}
