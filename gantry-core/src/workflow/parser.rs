use crate::error::{RunnerError, RunnerResult};
use crate::workflow::models::Workflow;

use std::fs;
use std::path::Path;

/// Parser for workflow declaration YAML files.
pub struct WorkflowParser;

impl WorkflowParser {
    /// Parse a workflow from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RunnerResult<Workflow> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a workflow from a YAML string.
    pub fn parse(content: &str) -> RunnerResult<Workflow> {
        let workflow: Workflow = serde_yaml::from_str(content)?;
        Ok(workflow)
    }

    /// Parse and validate a workflow from a YAML string.
    pub fn parse_and_validate(content: &str) -> RunnerResult<Workflow> {
        let workflow = Self::parse(content)?;
        Self::validate(&workflow)?;
        Ok(workflow)
    }

    /// Validate a parsed workflow for semantic correctness.
    ///
    /// Matrix-level validation (empty axes, undeclared exclude keys,
    /// duplicate identities) belongs to the expander, which is the component
    /// that resolves those structures.
    pub fn validate(workflow: &Workflow) -> RunnerResult<()> {
        if workflow.jobs.is_empty() {
            return Err(RunnerError::InvalidWorkflow(
                "workflow declares no jobs".to_string(),
            ));
        }

        for (job_id, job) in &workflow.jobs {
            if job.steps.is_empty() {
                return Err(RunnerError::InvalidWorkflow(format!(
                    "job '{}' has no steps",
                    job_id
                )));
            }

            for (step_idx, step) in job.steps.iter().enumerate() {
                let has_run = step.is_run();
                let has_uses = step.is_uses();

                if !has_run && !has_uses {
                    return Err(RunnerError::InvalidWorkflow(format!(
                        "step {} '{}' in job '{}' must have either 'run' or 'uses'",
                        step_idx,
                        step.display_name(),
                        job_id
                    )));
                }

                if has_run && has_uses {
                    return Err(RunnerError::InvalidWorkflow(format!(
                        "step {} '{}' in job '{}' cannot have both 'run' and 'uses'",
                        step_idx,
                        step.display_name(),
                        job_id
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - run: echo "Hello"
"#;
        let workflow = WorkflowParser::parse(yaml).unwrap();
        assert!(workflow.name.is_none());
        assert!(workflow.jobs.contains_key("build"));
    }

    #[test]
    fn test_validate_no_jobs() {
        let yaml = r#"
on: push
jobs: {}
"#;
        let workflow = WorkflowParser::parse(yaml).unwrap();
        let result = WorkflowParser::validate(&workflow);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no jobs"));
    }

    #[test]
    fn test_validate_empty_job() {
        let yaml = r#"
on: push
jobs:
  empty:
    runs-on: ubuntu-latest
    steps: []
"#;
        let workflow = WorkflowParser::parse(yaml).unwrap();
        let result = WorkflowParser::validate(&workflow);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no steps"));
    }

    #[test]
    fn test_validate_step_without_run_or_uses() {
        let yaml = r#"
on: push
jobs:
  build:
    steps:
      - name: Invalid step
        env:
          FOO: bar
"#;
        let workflow = WorkflowParser::parse(yaml).unwrap();
        let result = WorkflowParser::validate(&workflow);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must have either 'run' or 'uses'"));
    }

    #[test]
    fn test_validate_step_with_both_run_and_uses() {
        let yaml = r#"
on: push
jobs:
  build:
    steps:
      - name: Invalid step
        run: echo "Hello"
        uses: checkout
"#;
        let workflow = WorkflowParser::parse(yaml).unwrap();
        let result = WorkflowParser::validate(&workflow);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot have both 'run' and 'uses'"));
    }

    #[test]
    fn test_parse_and_validate_full_workflow() {
        let yaml = r#"
name: CI

on:
  push:
    branches: [main]
  pull_request:

env:
  CARGO_TERM_COLOR: always

jobs:
  test:
    runs-on: ${{ matrix.os }}
    strategy:
      matrix:
        os: [ubuntu-latest, macos-latest, windows-latest]
    steps:
      - uses: checkout
      - name: Install ALSA headers
        if: os == 'linux'
        run: sudo apt-get install -y libasound2-dev
      - uses: setup-toolchain
        with:
          toolchain: stable
      - name: Run tests
        run: cargo test --verbose
"#;
        let workflow = WorkflowParser::parse_and_validate(yaml).unwrap();
        assert_eq!(workflow.name, Some("CI".to_string()));
        assert_eq!(workflow.jobs.len(), 1);

        let job = &workflow.jobs["test"];
        assert_eq!(job.steps.len(), 4);
        assert_eq!(job.steps[1].if_condition, Some("os == 'linux'".to_string()));
    }

    #[test]
    fn test_from_file_round_trip() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "on: push\njobs:\n  build:\n    steps:\n      - run: echo hi\n"
        )
        .unwrap();

        let workflow = WorkflowParser::from_file(file.path()).unwrap();
        assert!(workflow.jobs.contains_key("build"));
    }

    #[test]
    fn test_from_file_missing_path() {
        let result = WorkflowParser::from_file("/nonexistent/ci.yml");
        assert!(matches!(result, Err(RunnerError::Io(_))));
    }

    #[test]
    fn test_parse_yaml_error_propagates() {
        let result = WorkflowParser::parse("on: push\njobs: [not, a, map]");
        assert!(matches!(result, Err(RunnerError::Yaml(_))));
    }
}
