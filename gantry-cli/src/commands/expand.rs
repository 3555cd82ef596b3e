use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;

use gantry_core::{MatrixExpander, WorkflowParser};

/// Show the jobs a workflow expands to, without running anything
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Path to the workflow YAML file
    pub workflow: PathBuf,

    /// Emit the expansion as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ExpandArgs) -> Result<()> {
    let workflow_path = &args.workflow;

    if !workflow_path.exists() {
        color_eyre::eyre::bail!("Workflow file not found: {}", workflow_path.display());
    }

    let workflow = WorkflowParser::from_file(workflow_path)?;
    WorkflowParser::validate(&workflow)?;
    let configs = MatrixExpander::expand(&workflow)?;

    if args.json {
        let expansion: Vec<serde_json::Value> = configs
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id.to_string(),
                    "name": c.display_name,
                    "axes": c.axes
                        .iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_string())))
                        .collect::<serde_json::Map<String, serde_json::Value>>(),
                    "os": c.os_family.to_string(),
                    "steps": c.steps.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&expansion)?);
        return Ok(());
    }

    output::banner(&format!("{} jobs", configs.len()));
    for config in &configs {
        println!("  {}", config.id);
        if !config.axes.is_empty() {
            let axes: Vec<String> = config
                .axes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            output::detail(&format!("    {}", axes.join(" ")));
        }
    }

    Ok(())
}
