// ABOUTME: The dockside command line, declared with clap derive.
// ABOUTME: Global output, verbosity and profile flags plus the init/targets/run/batch/profiles tree.

use clap::{Args, Parser, Subcommand, ValueEnum};
use dockside::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockside")]
#[command(about = "Run container operations, build pipelines and batches on remote hosts over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputMode::Normal)]
    pub output: OutputMode,

    /// Connection profile to use (overrides the config file)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new dockside.yml configuration file
    Init {
        /// Connection profile to write into the template
        #[arg(long)]
        with_profile: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// List containers on the remote host
    Targets,

    /// Run one operation against a target
    ///
    /// Operations: start, stop, restart, inspect, logs, build:<env>,
    /// deploy:<env>, build-and-deploy:<env>, export:<database>
    Run {
        /// Container id or unique id prefix
        target: String,

        /// Operation to run
        operation: String,

        #[command(flatten)]
        paths: PathOverrides,
    },

    /// Run a batch plan sequentially
    Batch {
        /// Plan file (YAML)
        plan: PathBuf,

        /// What to do when an operation fails
        #[arg(long, value_enum, default_value_t = OnFailure::Prompt)]
        on_failure: OnFailure,
    },

    /// Manage saved connection profiles
    Profiles {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Args, Default)]
pub struct PathOverrides {
    /// Local directory to package for deploys
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Remote directory the artifact is activated into
    #[arg(long)]
    pub remote_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnFailure {
    /// Ask on the terminal after each failure
    Prompt,
    /// Record the failure and keep going
    Continue,
    /// Skip everything after the first failure
    Abort,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// List profiles, most recently used first
    List,

    /// Save a profile, replacing any with the same name
    Add {
        name: String,

        /// Address as [user@]host[:port]
        address: String,

        /// Password authentication
        #[arg(long, conflicts_with = "key")]
        password: Option<String>,

        /// Private key file
        #[arg(long)]
        key: Option<PathBuf>,

        /// Accept the host key on first connection
        #[arg(long)]
        trust_first_connection: bool,
    },

    /// Delete a profile
    Remove { name: String },

    /// Store database credentials for data exports from a target
    Credentials {
        target: String,
        username: String,
        password: String,
    },
}
