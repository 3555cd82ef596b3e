use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use gantry_core::{MatrixExpander, WorkflowParser};

/// Validate a workflow YAML file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the workflow YAML file
    pub workflow: PathBuf,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let workflow_path = &args.workflow;

    if !workflow_path.exists() {
        color_eyre::eyre::bail!("Workflow file not found: {}", workflow_path.display());
    }

    // Step 1: Parse YAML syntax and structure
    output::status("Validating", &format!("{}", workflow_path.display()));

    let workflow = match WorkflowParser::from_file(workflow_path) {
        Ok(w) => w,
        Err(e) => {
            output::error(&format!("{}", e));
            std::process::exit(1);
        }
    };

    output::check("YAML syntax valid");

    let jobs_count = workflow.jobs.len();
    let steps_count: usize = workflow.jobs.values().map(|j| j.steps.len()).sum();
    output::check(&format!(
        "Structure: {} jobs, {} steps",
        jobs_count, steps_count
    ));

    // Step 2: Semantic validation
    if let Err(e) = WorkflowParser::validate(&workflow) {
        output::error(&format!("{}", e));
        std::process::exit(1);
    }
    output::check("Semantic validation passed");

    // Step 3: Matrix expansion catches bad strategies
    let configs = match MatrixExpander::expand(&workflow) {
        Ok(configs) => {
            output::check(&format!("Matrix expansion: {} jobs", configs.len()));
            configs
        }
        Err(e) => {
            output::error(&format!("{}", e));
            std::process::exit(1);
        }
    };

    // Step 4: Guard syntax; at run time these fail only their own job, but
    // validation rejects them up front
    let guard_errors: Vec<String> = configs.iter().flat_map(|c| c.guard_errors()).collect();
    if !guard_errors.is_empty() {
        for error in &guard_errors {
            output::error(error);
        }
        std::process::exit(1);
    }
    output::check("Conditions parsed");

    output::verdict(true, "Workflow is valid");
    Ok(())
}
