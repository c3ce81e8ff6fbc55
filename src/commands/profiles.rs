// ABOUTME: Profiles command implementation.
// ABOUTME: Lists, saves and removes connection profiles and per-target database credentials.

use super::console::open_store;
use crate::cli::ProfileCommands;
use dockside::config::ConnectionProfile;
use dockside::error::{Error, Result};
use dockside::output::Output;
use dockside::store::DatabaseCredentials;
use dockside::types::TargetId;
use std::env;

pub fn profiles(command: ProfileCommands, output: Output) -> Result<()> {
    let store = open_store()?;

    match command {
        ProfileCommands::List => {
            let profiles = store.profiles()?;
            if profiles.is_empty() {
                output.progress("No profiles saved. Add one with `dockside profiles add`.");
            }
            output.profiles(&profiles);
        }
        ProfileCommands::Add {
            name,
            address,
            password,
            key,
            trust_first_connection,
        } => {
            let default_user = env::var("USER").unwrap_or_else(|_| "root".to_string());
            let mut profile = ConnectionProfile::parse(&name, &address, &default_user)
                .map_err(Error::InvalidArgument)?;
            profile.secret = password;
            profile.key_path = key;
            profile.trust_first_connection = trust_first_connection;
            let address = profile.address();
            store.save_profile(profile)?;
            output.success(&format!("Saved profile {name} ({address})"));
        }
        ProfileCommands::Remove { name } => {
            if !store.remove_profile(&name)? {
                return Err(Error::UnknownProfile(name));
            }
            output.success(&format!("Removed profile {name}"));
        }
        ProfileCommands::Credentials {
            target,
            username,
            password,
        } => {
            let target =
                TargetId::new(&target).map_err(|e| Error::InvalidArgument(e.to_string()))?;
            store.save_database_credentials(DatabaseCredentials {
                target: target.clone(),
                username,
                password,
                last_used: None,
            })?;
            output.success(&format!("Saved database credentials for {target}"));
        }
    }
    Ok(())
}
