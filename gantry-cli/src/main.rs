mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;

#[derive(Parser, Debug)]
#[command(name = "gantry", version, about = "Run CI workflows locally")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a workflow
    Run(commands::run::RunArgs),
    /// Validate a workflow file without running it
    Validate(commands::validate::ValidateArgs),
    /// Show the jobs a workflow expands to
    Expand(commands::expand::ExpandArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => commands::run::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args),
        Command::Expand(args) => commands::expand::execute(args),
    }
}
