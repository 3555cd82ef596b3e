use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use std::collections::HashMap;
use std::fmt;

/// A declarative workflow definition.
///
/// This is the top-level structure of a workflow YAML file: trigger
/// predicates, workflow-level environment, and an ordered map of jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Display name for the workflow
    pub name: Option<String>,

    /// Trigger configuration deciding whether this workflow runs at all
    #[serde(rename = "on")]
    pub on: Trigger,

    /// Workflow-level environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// The jobs that make up this workflow, in declaration order
    pub jobs: IndexMap<String, Job>,
}

/// Trigger configuration for when the workflow should run.
///
/// Supports three YAML shapes:
/// - Simple: `on: push`
/// - List: `on: [push, pull_request]`
/// - Detailed: `on: { push: { branches: [main] } }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Trigger {
    Single(String),
    Multiple(Vec<String>),
    Detailed(IndexMap<String, Option<EventConfig>>),
}

impl Trigger {
    /// Decide whether an incoming event should start this workflow.
    ///
    /// `git_ref` accepts both full refs (`refs/heads/main`) and bare branch
    /// names. Trigger predicates gate invocation only; they play no part in
    /// execution once the orchestrator starts.
    pub fn matches(&self, event: &str, git_ref: Option<&str>) -> bool {
        match self {
            Trigger::Single(e) => e == event,
            Trigger::Multiple(events) => events.iter().any(|e| e == event),
            Trigger::Detailed(events) => match events.get(event) {
                None => false,
                Some(None) => true,
                Some(Some(config)) => config.matches_ref(git_ref),
            },
        }
    }
}

/// Filter configuration for a single trigger event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventConfig {
    /// Branch patterns that allow the event (empty = any branch)
    #[serde(default)]
    pub branches: Vec<String>,

    /// Branch patterns that suppress the event
    #[serde(default, rename = "branches-ignore")]
    pub branches_ignore: Vec<String>,

    /// Activity types for events that have them
    #[serde(default)]
    pub types: Vec<String>,
}

impl EventConfig {
    fn matches_ref(&self, git_ref: Option<&str>) -> bool {
        let branch = match git_ref {
            Some(r) => r
                .strip_prefix("refs/heads/")
                .or_else(|| r.strip_prefix("refs/tags/"))
                .unwrap_or(r),
            // No ref to filter on: only an unconditional filter passes.
            None => return self.branches.is_empty() && self.branches_ignore.is_empty(),
        };

        if self.branches_ignore.iter().any(|p| glob_match(p, branch)) {
            return false;
        }
        if self.branches.is_empty() {
            return true;
        }
        self.branches.iter().any(|p| glob_match(p, branch))
    }
}

/// Minimal glob matching for branch filters: `*` matches any sequence.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

/// A job within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Display name for the job
    #[serde(default)]
    pub name: Option<String>,

    /// Target platform identifier, possibly a `${{ matrix.<axis> }}` reference
    #[serde(default, rename = "runs-on")]
    pub runs_on: Option<String>,

    /// Guard expression gating whether the job executes
    #[serde(default, rename = "if")]
    pub if_condition: Option<String>,

    /// Job-level environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Matrix strategy for expanding this job into multiple instances
    #[serde(default)]
    pub strategy: Option<Strategy>,

    /// The steps that make up this job
    #[serde(default)]
    pub steps: Vec<Step>,

    /// Whether a failure of this job leaves the aggregate untouched
    #[serde(default, rename = "continue-on-error")]
    pub continue_on_error: bool,
}

/// Strategy configuration for matrix expansion.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Strategy {
    /// Matrix axes plus include/exclude adjustments
    #[serde(default)]
    pub matrix: Option<Matrix>,

    /// Explicit opt-in: cancel remaining jobs once one fails.
    /// Absent means fail-slow (all jobs run to completion).
    #[serde(default, rename = "fail-fast")]
    pub fail_fast: Option<bool>,
}

/// Matrix specification: named axes in declaration order, plus explicit
/// include entries (added after expansion) and exclude entries (removed
/// before includes are processed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matrix {
    /// Matrix axes (dynamic keys, declaration order preserved)
    #[serde(flatten)]
    pub axes: IndexMap<String, Vec<AxisValue>>,

    /// Combinations to add after exclusion; never themselves excluded
    #[serde(default)]
    pub include: Vec<IndexMap<String, AxisValue>>,

    /// Full or partial combinations to remove from the expansion
    #[serde(default)]
    pub exclude: Vec<IndexMap<String, AxisValue>>,
}

/// A single scalar value on a matrix axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Bool(b) => write!(f, "{}", b),
            AxisValue::Int(n) => write!(f, "{}", n),
            AxisValue::Float(n) => write!(f, "{}", n),
            AxisValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// A step within a job: either a shell command or a reusable action
/// reference, with an optional guard expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Identifier used by later guards to reference this step's outcome
    #[serde(default)]
    pub id: Option<String>,

    /// Display name for the step
    #[serde(default)]
    pub name: Option<String>,

    /// Guard expression gating whether the step executes
    #[serde(default, rename = "if")]
    pub if_condition: Option<String>,

    /// Shell command to run
    #[serde(default)]
    pub run: Option<String>,

    /// Shell to use for the run command (`sh`, `bash`, `pwsh`)
    #[serde(default)]
    pub shell: Option<String>,

    /// Working directory for the step, relative to the job's
    #[serde(default, rename = "working-directory")]
    pub working_directory: Option<String>,

    /// Reusable action reference (e.g. `checkout`)
    #[serde(default)]
    pub uses: Option<String>,

    /// Named parameters passed to the action
    #[serde(default)]
    pub with: IndexMap<String, AxisValue>,

    /// Step-level environment overrides
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Whether the job keeps running if this step fails
    #[serde(default, rename = "continue-on-error")]
    pub continue_on_error: bool,

    /// Step timeout in minutes
    #[serde(default, rename = "timeout-minutes")]
    pub timeout_minutes: Option<u64>,
}

impl Step {
    /// Get a display name for the step.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            name.clone()
        } else if let Some(uses) = &self.uses {
            format!("Run {}", uses)
        } else if let Some(run) = &self.run {
            let first_line = run.lines().next().unwrap_or(run);
            if first_line.len() > 50 {
                // Back off to a char boundary so multi-byte text cannot panic
                let mut cut = 47;
                while !first_line.is_char_boundary(cut) {
                    cut -= 1;
                }
                format!("{}...", &first_line[..cut])
            } else {
                format!("Run {}", first_line)
            }
        } else {
            "Unnamed step".to_string()
        }
    }

    pub fn is_run(&self) -> bool {
        self.run.is_some()
    }

    pub fn is_uses(&self) -> bool {
        self.uses.is_some()
    }
}
