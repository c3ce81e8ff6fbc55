// ABOUTME: Binary entry point: tracing setup, argument parsing and command dispatch.
// ABOUTME: Any command error is printed through Output and exits with a status derived from its kind.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use dockside::error::Result;
use dockside::output::Output;
use dockside::pipeline::DeployOverrides;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output);
    if let Err(e) = run(cli).await {
        output.error(&e.to_string());
        std::process::exit(e.kind().exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(cli.output);
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Init {
            with_profile,
            force,
        } => commands::init(with_profile.as_deref().or(profile), force, output),
        Commands::Targets => commands::targets(profile, output).await,
        Commands::Run {
            target,
            operation,
            paths,
        } => {
            let overrides = DeployOverrides {
                local_path: paths.local_path,
                remote_path: paths.remote_path,
            };
            commands::run(&target, &operation, overrides, profile, output).await
        }
        Commands::Batch { plan, on_failure } => {
            commands::batch(&plan, on_failure, profile, output).await
        }
        Commands::Profiles { command } => commands::profiles(command, output),
    }
}
