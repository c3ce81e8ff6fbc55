// ABOUTME: Init command implementation.
// ABOUTME: Writes a starter dockside.yml into the working directory.

use dockside::config;
use dockside::error::Result;
use dockside::output::Output;
use std::env;

pub fn init(profile: Option<&str>, force: bool, output: Output) -> Result<()> {
    let cwd = env::current_dir()?;
    let path = config::init_config(&cwd, profile, force)?;
    output.success(&format!("Created {}", path.display()));
    Ok(())
}
