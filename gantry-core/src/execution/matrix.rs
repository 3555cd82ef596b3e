// Matrix expansion
// Expands each job's strategy matrix into concrete job configurations with
// deterministic ordering and identity.

use crate::condition::{ConditionError, Guard};
use crate::error::{RunnerError, RunnerResult};
use crate::platform::OsFamily;
use crate::workflow::models::{AxisValue, Job, Step, Workflow};

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

/// Stable identity of an expanded job within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One concrete axis assignment for an expanded job.
pub type AxisAssignment = IndexMap<String, AxisValue>;

/// What a step does when it runs.
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Execute a shell command.
    Run { command: String, shell: String },
    /// Invoke a named action with inputs.
    Use {
        action: String,
        with: IndexMap<String, String>,
    },
}

/// Guard expression attached to a job or step. Parsing happens once at
/// expansion time, but a parse failure is carried along instead of aborting
/// the run: the job runner reports it as a failure of that job alone.
#[derive(Debug, Clone)]
pub struct GuardSpec {
    pub source: String,
    pub parsed: Result<Guard, ConditionError>,
}

impl GuardSpec {
    fn parse(source: &str) -> Self {
        GuardSpec {
            source: source.to_string(),
            parsed: Guard::parse(source),
        }
    }
}

/// Fully resolved step, ready for execution.
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub id: Option<String>,
    pub name: String,
    pub guard: Option<GuardSpec>,
    pub action: StepAction,
    pub env: HashMap<String, String>,
    pub continue_on_error: bool,
    pub timeout: Option<Duration>,
    pub working_directory: Option<String>,
}

/// Fully resolved job produced by matrix expansion. Everything the job runner
/// needs is captured here; the original workflow is no longer consulted.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub id: JobId,
    pub job_key: String,
    pub display_name: String,
    pub axes: AxisAssignment,
    pub os_family: OsFamily,
    pub runs_on: Option<String>,
    pub guard: Option<GuardSpec>,
    pub env: HashMap<String, String>,
    pub steps: Vec<StepSpec>,
    pub continue_on_error: bool,
    pub fail_fast: bool,
}

impl JobConfig {
    /// Guard parse failures in this configuration, phrased with their site.
    /// Used by up-front validation; at run time the same failures surface as
    /// contained job failures instead.
    pub fn guard_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(guard) = &self.guard {
            if let Err(e) = &guard.parsed {
                errors.push(format!("invalid condition on job '{}': {}", self.job_key, e));
            }
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let Some(guard) = &step.guard {
                if let Err(e) = &guard.parsed {
                    errors.push(format!(
                        "invalid condition on step {} of job '{}': {}",
                        index + 1,
                        self.job_key,
                        e
                    ));
                }
            }
        }
        errors
    }
}

/// Expands workflow jobs into concrete job configurations.
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand every job in the workflow, preserving declaration order.
    ///
    /// Jobs without a matrix expand to exactly one configuration. Jobs with a
    /// matrix expand to the cartesian product of their axes, filtered by
    /// `exclude` and augmented by `include`.
    pub fn expand(workflow: &Workflow) -> RunnerResult<Vec<JobConfig>> {
        let mut configs = Vec::new();
        let mut seen = HashSet::new();

        for (job_key, job) in &workflow.jobs {
            let expanded = Self::expand_job(workflow, job_key, job)?;
            for config in expanded {
                if !seen.insert(config.id.clone()) {
                    return Err(RunnerError::InvalidMatrix(format!(
                        "duplicate job id '{}' after expansion",
                        config.id
                    )));
                }
                configs.push(config);
            }
        }

        Ok(configs)
    }

    fn expand_job(workflow: &Workflow, job_key: &str, job: &Job) -> RunnerResult<Vec<JobConfig>> {
        let matrix = job.strategy.as_ref().and_then(|s| s.matrix.as_ref());
        let fail_fast = job
            .strategy
            .as_ref()
            .and_then(|s| s.fail_fast)
            .unwrap_or(false);

        let Some(matrix) = matrix else {
            let config = Self::build_config(
                workflow,
                job_key,
                job,
                JobId::new(job_key),
                AxisAssignment::new(),
                fail_fast,
            )?;
            return Ok(vec![config]);
        };

        for (axis, values) in &matrix.axes {
            if values.is_empty() {
                return Err(RunnerError::InvalidMatrix(format!(
                    "axis '{}' in job '{}' has no values",
                    axis, job_key
                )));
            }
        }

        let axis_names: Vec<&String> = matrix.axes.keys().collect();
        for exclude in &matrix.exclude {
            for key in exclude.keys() {
                if !matrix.axes.contains_key(key) {
                    return Err(RunnerError::InvalidMatrix(format!(
                        "exclude entry in job '{}' references undeclared axis '{}'",
                        job_key, key
                    )));
                }
            }
        }

        // Cartesian product with the first declared axis varying slowest.
        let mut combinations: Vec<AxisAssignment> = vec![AxisAssignment::new()];
        for (axis, values) in &matrix.axes {
            let mut next = Vec::with_capacity(combinations.len() * values.len());
            for combo in &combinations {
                for value in values {
                    let mut extended = combo.clone();
                    extended.insert(axis.clone(), value.clone());
                    next.push(extended);
                }
            }
            combinations = next;
        }

        // Exclude entries match on partial assignments: a combination is
        // dropped when every key of some exclude entry agrees with it.
        combinations.retain(|combo| {
            !matrix.exclude.iter().any(|exclude| {
                exclude
                    .iter()
                    .all(|(key, value)| combo.get(key) == Some(value))
            })
        });

        // Includes run after excludes and are never themselves excluded.
        // An include that matches existing combinations on the declared axes
        // augments all of them; one that matches none is appended as a new
        // combination.
        let mut appended: Vec<(usize, AxisAssignment)> = Vec::new();
        for (idx, include) in matrix.include.iter().enumerate() {
            if !axis_names.is_empty()
                && !include.keys().any(|k| matrix.axes.contains_key(k))
            {
                return Err(RunnerError::InvalidMatrix(format!(
                    "include entry in job '{}' references no declared axis",
                    job_key
                )));
            }

            let mut matched = false;
            for combo in combinations.iter_mut() {
                let agrees = include.iter().all(|(key, value)| {
                    match combo.get(key) {
                        Some(existing) => existing == value,
                        // Keys outside the declared axes never disqualify a match
                        None => !matrix.axes.contains_key(key),
                    }
                });
                if agrees {
                    matched = true;
                    for (key, value) in include {
                        combo.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
            }

            if !matched {
                appended.push((idx, include.clone()));
            }
        }

        if combinations.is_empty() && appended.is_empty() {
            return Err(RunnerError::InvalidMatrix(format!(
                "job '{}' expands to zero configurations",
                job_key
            )));
        }

        let mut configs = Vec::new();
        for combo in combinations {
            let id = Self::job_id(job_key, &matrix.axes, &combo);
            configs.push(Self::build_config(workflow, job_key, job, id, combo, fail_fast)?);
        }
        for (idx, combo) in appended {
            let mut id = Self::job_id(job_key, &matrix.axes, &combo).0;
            id.push_str(&format!("-inc{}", idx));
            configs.push(Self::build_config(
                workflow,
                job_key,
                job,
                JobId::new(id),
                combo,
                fail_fast,
            )?);
        }

        Ok(configs)
    }

    /// Identity is derived from the declared axis order so it stays stable
    /// regardless of include entry key order.
    fn job_id(
        job_key: &str,
        axes: &IndexMap<String, Vec<AxisValue>>,
        combo: &AxisAssignment,
    ) -> JobId {
        let mut id = job_key.to_string();
        for axis in axes.keys() {
            if let Some(value) = combo.get(axis) {
                id.push('-');
                id.push_str(&sanitize(&value.to_string()));
            }
        }
        JobId(id)
    }

    fn build_config(
        workflow: &Workflow,
        job_key: &str,
        job: &Job,
        id: JobId,
        axes: AxisAssignment,
        fail_fast: bool,
    ) -> RunnerResult<JobConfig> {
        let runs_on = job
            .runs_on
            .as_ref()
            .map(|r| substitute_axes(r, &axes));
        let os_family = resolve_os_family(runs_on.as_deref(), &axes);

        let display_name = if axes.is_empty() {
            job.name.clone().unwrap_or_else(|| job_key.to_string())
        } else {
            let values: Vec<String> = axes.values().map(|v| v.to_string()).collect();
            format!(
                "{} ({})",
                job.name.as_deref().unwrap_or(job_key),
                values.join(", ")
            )
        };

        let mut env = workflow.env.clone();
        env.extend(job.env.clone());
        for (axis, value) in &axes {
            let key = format!("MATRIX_{}", axis.to_uppercase().replace(['-', '.'], "_"));
            env.insert(key, value.to_string());
        }
        env.insert("GANTRY_JOB".to_string(), id.to_string());
        env.insert("GANTRY_OS".to_string(), os_family.to_string());

        let guard = job.if_condition.as_deref().map(GuardSpec::parse);

        let mut steps = Vec::with_capacity(job.steps.len());
        for (index, step) in job.steps.iter().enumerate() {
            steps.push(Self::build_step(step, index, job_key, &axes)?);
        }

        Ok(JobConfig {
            id,
            job_key: job_key.to_string(),
            display_name,
            axes,
            os_family,
            runs_on,
            guard,
            env,
            steps,
            continue_on_error: job.continue_on_error,
            fail_fast,
        })
    }

    fn build_step(
        step: &Step,
        index: usize,
        job_key: &str,
        axes: &AxisAssignment,
    ) -> RunnerResult<StepSpec> {
        let action = if let Some(run) = &step.run {
            StepAction::Run {
                command: substitute_axes(run, axes),
                shell: step.shell.clone().unwrap_or_default(),
            }
        } else if let Some(uses) = &step.uses {
            StepAction::Use {
                action: uses.clone(),
                with: step
                    .with
                    .iter()
                    .map(|(k, v)| (k.clone(), substitute_axes(&v.to_string(), axes)))
                    .collect(),
            }
        } else {
            return Err(RunnerError::InvalidWorkflow(format!(
                "step {} in job '{}' has neither 'run' nor 'uses'",
                index + 1,
                job_key
            )));
        };

        let guard = step.if_condition.as_deref().map(GuardSpec::parse);

        Ok(StepSpec {
            id: step.id.clone(),
            name: step.display_name(),
            guard,
            action,
            env: step.env.clone(),
            continue_on_error: step.continue_on_error,
            timeout: step
                .timeout_minutes
                .map(|m| Duration::from_secs(m * 60)),
            working_directory: step.working_directory.clone(),
        })
    }
}

/// Replace `${{ matrix.<axis> }}` references with the assigned axis value.
fn substitute_axes(input: &str, axes: &AxisAssignment) -> String {
    let mut output = input.to_string();
    for (axis, value) in axes {
        let needle = format!("${{{{ matrix.{} }}}}", axis);
        output = output.replace(&needle, &value.to_string());
        let tight = format!("${{{{matrix.{}}}}}", axis);
        output = output.replace(&tight, &value.to_string());
    }
    output
}

fn resolve_os_family(runs_on: Option<&str>, axes: &AxisAssignment) -> OsFamily {
    if let Some(label) = runs_on {
        if let Some(family) = OsFamily::classify(label) {
            return family;
        }
    }
    for axis in ["os", "platform"] {
        if let Some(value) = axes.get(axis) {
            if let Some(family) = OsFamily::classify(&value.to_string()) {
                return family;
            }
        }
    }
    OsFamily::host()
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
