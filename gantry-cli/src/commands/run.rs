use crate::output;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use color_eyre::Result;

use gantry_core::execution::events::progress_channel;
use gantry_core::{
    ExecutionEvent, JobStatus, OrchestratorConfig, StepOutcome, WorkflowOrchestrator,
    WorkflowParser, WorkflowReport,
};

/// Run a workflow locally
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the workflow YAML file
    pub workflow: PathBuf,

    /// Set an environment variable (can be repeated, format: name=value)
    #[arg(long = "env", short = 'e', value_name = "NAME=VALUE")]
    pub env: Vec<String>,

    /// Maximum number of jobs to run in parallel (0 = unlimited)
    #[arg(long, short = 'j', value_name = "N", default_value_t = 0)]
    pub max_parallel: usize,

    /// Cancel remaining jobs as soon as one fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Default step timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 3600)]
    pub step_timeout: u64,

    /// Trigger event to gate the run on (e.g. push, pull_request)
    #[arg(long, value_name = "EVENT")]
    pub event: Option<String>,

    /// Git ref for trigger branch filters (e.g. refs/heads/main)
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// Working directory for execution
    #[arg(long, short = 'w', value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Print the JSON report to stdout after the run
    #[arg(long)]
    pub json: bool,

    /// Write a JSON report to this path after the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let workflow_path = &args.workflow;

    if !workflow_path.exists() {
        color_eyre::eyre::bail!("Workflow file not found: {}", workflow_path.display());
    }

    // Parse environment overrides from --env flags
    let mut env = HashMap::new();
    for var_str in &args.env {
        if let Some((name, value)) = var_str.split_once('=') {
            env.insert(name.to_string(), value.to_string());
        } else {
            color_eyre::eyre::bail!("Invalid env format '{}'. Expected name=value", var_str);
        }
    }

    let working_dir = match &args.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    output::status("Parsing", &format!("{}", workflow_path.display()));
    let mut workflow = WorkflowParser::from_file(workflow_path)?;
    WorkflowParser::validate(&workflow)?;
    workflow.env.extend(env);

    let workflow_name = workflow.name.clone().unwrap_or_else(|| {
        workflow_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workflow")
            .to_string()
    });

    // Gate on the trigger when an event was given
    if let Some(event) = &args.event {
        if !workflow.on.matches(event, args.git_ref.as_deref()) {
            output::info(&format!(
                "Workflow '{}' is not triggered by '{}'{}",
                workflow_name,
                event,
                args.git_ref
                    .as_deref()
                    .map(|r| format!(" on '{}'", r))
                    .unwrap_or_default()
            ));
            return Ok(());
        }
    }

    let jobs_count = workflow.jobs.len();
    let steps_count: usize = workflow.jobs.values().map(|j| j.steps.len()).sum();
    output::info(&format!(
        "Workflow '{}': {} jobs, {} steps",
        workflow_name, jobs_count, steps_count
    ));

    let (tx, mut rx) = progress_channel();

    let orchestrator = WorkflowOrchestrator::new(OrchestratorConfig {
        max_parallel_jobs: args.max_parallel,
        default_step_timeout: Duration::from_secs(args.step_timeout),
        fail_fast: args.fail_fast,
        working_dir,
    })
    .with_events(tx);

    // Ctrl-C triggers cooperative cancellation instead of killing the process
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!();
            output::warning("Interrupt received, cancelling run...");
            cancel.cancel();
        }
    });

    // Run in the background; render events in the foreground
    let exec_handle = tokio::spawn(async move { orchestrator.run(&workflow).await });

    while let Some(event) = rx.recv().await {
        render_event(&event);
    }

    let result = exec_handle.await??;

    if args.json || args.report.is_some() {
        let report = WorkflowReport::from_result(&result);
        let json = serde_json::to_string_pretty(&report)?;
        if args.json {
            println!("{}", json);
        }
        if let Some(report_path) = &args.report {
            std::fs::write(report_path, &json)?;
            output::info(&format!("Report written to {}", report_path.display()));
        }
    }

    let exit_code = result.exit_code();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn render_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::WorkflowStarted { name, total_jobs } => {
            println!();
            output::banner(&format!("Workflow '{}' ({} jobs)", name, total_jobs));
        }

        ExecutionEvent::WorkflowCompleted {
            status, duration, ..
        } => {
            println!();
            match status {
                gantry_core::WorkflowStatus::Succeeded => output::verdict(
                    true,
                    &format!(
                        "Workflow completed successfully in {:.2}s",
                        duration.as_secs_f64()
                    ),
                ),
                gantry_core::WorkflowStatus::Failed => output::verdict(
                    false,
                    &format!("Workflow failed after {:.2}s", duration.as_secs_f64()),
                ),
                gantry_core::WorkflowStatus::Cancelled => output::warning(&format!(
                    "Workflow cancelled after {:.2}s",
                    duration.as_secs_f64()
                )),
            }
        }

        ExecutionEvent::JobStarted {
            display_name,
            total_steps,
            ..
        } => {
            println!("  Job '{}' ({} steps)", display_name, total_steps);
        }

        ExecutionEvent::JobCompleted {
            job_id,
            status,
            duration,
        } => {
            let symbol = match status {
                JobStatus::Succeeded => "OK",
                JobStatus::Failed => "FAIL",
                _ => "DONE",
            };
            let line = format!(
                "  Job '{}' {} ({:.2}s)",
                job_id,
                symbol,
                duration.as_secs_f64()
            );
            output::outcome_line(*status == JobStatus::Succeeded, &line);
        }

        ExecutionEvent::JobSkipped { job_id, reason } => {
            output::warning(&format!("  Job '{}' skipped: {}", job_id, reason));
        }

        ExecutionEvent::StepStarted {
            step_name,
            step_index,
            ..
        } => {
            println!("    [Step {}] {}", step_index + 1, step_name);
        }

        ExecutionEvent::StepOutput { line, is_error, .. } => {
            if *is_error {
                output::step_stderr(line);
            } else {
                output::step_stdout(line);
            }
        }

        ExecutionEvent::StepCompleted {
            outcome,
            duration,
            exit_code,
            ..
        } => {
            let symbol = match outcome {
                StepOutcome::Succeeded => "OK",
                StepOutcome::Failed => "FAIL",
                StepOutcome::Skipped => "SKIP",
            };
            let exit_info = match exit_code {
                Some(code) if *code != 0 => format!(" (exit code: {})", code),
                _ => String::new(),
            };
            let line = format!(
                "      {} ({:.2}s){}",
                symbol,
                duration.as_secs_f64(),
                exit_info
            );
            match outcome {
                StepOutcome::Skipped => output::detail(&line),
                other => output::outcome_line(*other == StepOutcome::Succeeded, &line),
            }
        }

        ExecutionEvent::StepSkipped {
            step_name, reason, ..
        } => {
            output::warning(&format!("      {} skipped: {}", step_name, reason));
        }
    }
}
