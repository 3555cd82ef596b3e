// Execution result types
// Step, job and workflow results plus the serializable report emitted at the
// end of a run.

use crate::execution::matrix::JobId;
use crate::workflow::models::AxisValue;

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Terminal outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded => write!(f, "succeeded"),
            StepOutcome::Failed => write!(f, "failed"),
            StepOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a step failed. Process-level failures are captured here instead of
/// being propagated as errors, so one bad step never tears down the runner.
#[derive(Debug, Clone, PartialEq)]
pub enum FailReason {
    NonZeroExit(i32),
    Timeout,
    LaunchError(String),
    InvalidCondition(String),
    Terminated,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::NonZeroExit(code) => write!(f, "exited with code {}", code),
            FailReason::Timeout => write!(f, "timed out"),
            FailReason::LaunchError(msg) => write!(f, "failed to launch: {}", msg),
            FailReason::InvalidCondition(msg) => write!(f, "invalid condition: {}", msg),
            FailReason::Terminated => write!(f, "terminated"),
        }
    }
}

/// Why a step or job was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    GuardFalse,
    PriorStepFailed,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::GuardFalse => write!(f, "condition evaluated to false"),
            SkipReason::PriorStepFailed => write!(f, "a previous step failed"),
            SkipReason::Cancelled => write!(f, "run was cancelled"),
        }
    }
}

/// Result of executing (or skipping) one step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub id: Option<String>,
    pub name: String,
    pub outcome: StepOutcome,
    pub fail_reason: Option<FailReason>,
    pub skip_reason: Option<SkipReason>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl StepResult {
    pub fn succeeded(
        id: Option<String>,
        name: String,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        StepResult {
            id,
            name,
            outcome: StepOutcome::Succeeded,
            fail_reason: None,
            skip_reason: None,
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn failed(
        id: Option<String>,
        name: String,
        reason: FailReason,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        duration: Duration,
    ) -> Self {
        StepResult {
            id,
            name,
            outcome: StepOutcome::Failed,
            fail_reason: Some(reason),
            skip_reason: None,
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    pub fn skipped(id: Option<String>, name: String, reason: SkipReason) -> Self {
        StepResult {
            id,
            name,
            outcome: StepOutcome::Skipped,
            fail_reason: None,
            skip_reason: Some(reason),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            duration: Duration::ZERO,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Result of one expanded job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub id: JobId,
    pub display_name: String,
    pub axes: IndexMap<String, AxisValue>,
    pub status: JobStatus,
    pub skip_reason: Option<SkipReason>,
    pub fail_reason: Option<String>,
    pub steps: Vec<StepResult>,
    pub duration: Duration,
}

/// Terminal status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Succeeded => write!(f, "succeeded"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Aggregate result of a workflow run. Always enumerates every expanded job,
/// including the ones that never started.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub jobs: Vec<JobResult>,
    pub duration: Duration,
}

impl WorkflowResult {
    /// Process exit code for this run: zero only on full success.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            WorkflowStatus::Succeeded => 0,
            WorkflowStatus::Failed | WorkflowStatus::Cancelled => 1,
        }
    }
}

/// JSON-serializable view of a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub status: String,
    pub duration_ms: u64,
    pub jobs: Vec<JobReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: String,
    pub name: String,
    pub axes: IndexMap<String, String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    pub duration_ms: u64,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl WorkflowReport {
    pub fn from_result(result: &WorkflowResult) -> Self {
        WorkflowReport {
            status: result.status.to_string(),
            duration_ms: result.duration.as_millis() as u64,
            jobs: result.jobs.iter().map(JobReport::from_result).collect(),
        }
    }
}

impl JobReport {
    fn from_result(job: &JobResult) -> Self {
        JobReport {
            id: job.id.to_string(),
            name: job.display_name.clone(),
            axes: job
                .axes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            status: job.status.to_string(),
            skip_reason: job.skip_reason.map(|r| r.to_string()),
            fail_reason: job.fail_reason.clone(),
            duration_ms: job.duration.as_millis() as u64,
            steps: job.steps.iter().map(StepReport::from_result).collect(),
        }
    }
}

impl StepReport {
    fn from_result(step: &StepResult) -> Self {
        StepReport {
            id: step.id.clone(),
            name: step.name.clone(),
            outcome: step.outcome.to_string(),
            fail_reason: step.fail_reason.as_ref().map(|r| r.to_string()),
            skip_reason: step.skip_reason.map(|r| r.to_string()),
            exit_code: step.exit_code,
            duration_ms: step.duration.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_zero_only_on_success() {
        let result = WorkflowResult {
            status: WorkflowStatus::Succeeded,
            jobs: Vec::new(),
            duration: Duration::ZERO,
        };
        assert_eq!(result.exit_code(), 0);

        let result = WorkflowResult {
            status: WorkflowStatus::Failed,
            ..result
        };
        assert_eq!(result.exit_code(), 1);

        let result = WorkflowResult {
            status: WorkflowStatus::Cancelled,
            ..result
        };
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_fail_reason_display() {
        assert_eq!(FailReason::NonZeroExit(42).to_string(), "exited with code 42");
        assert_eq!(FailReason::Timeout.to_string(), "timed out");
        assert_eq!(
            FailReason::LaunchError("not found".to_string()).to_string(),
            "failed to launch: not found"
        );
    }

    #[test]
    fn test_report_serialization() {
        let mut axes = IndexMap::new();
        axes.insert("os".to_string(), AxisValue::String("linux".to_string()));

        let result = WorkflowResult {
            status: WorkflowStatus::Failed,
            jobs: vec![JobResult {
                id: JobId::new("build-linux"),
                display_name: "build (linux)".to_string(),
                axes,
                status: JobStatus::Failed,
                skip_reason: None,
                fail_reason: Some("exited with code 1".to_string()),
                steps: vec![StepResult::failed(
                    None,
                    "cargo test".to_string(),
                    FailReason::NonZeroExit(1),
                    String::new(),
                    String::new(),
                    Some(1),
                    Duration::from_millis(1500),
                )],
                duration: Duration::from_millis(1500),
            }],
            duration: Duration::from_millis(1600),
        };

        let report = WorkflowReport::from_result(&result);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["jobs"][0]["id"], "build-linux");
        assert_eq!(json["jobs"][0]["axes"]["os"], "linux");
        assert_eq!(json["jobs"][0]["steps"][0]["exit_code"], 1);
        // Absent optional reasons are omitted entirely
        assert!(json["jobs"][0]["steps"][0].get("skip_reason").is_none());
    }
}
