use std::path::Path;

use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://school.db";

/// Loads the dotenv files for the active profile; later files override
/// earlier ones.
pub fn load_environment() -> anyhow::Result<()> {
    for env_file in env_files_for_profile(&active_profile()) {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn active_profile() -> String {
    dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string())
}

fn env_files_for_profile(profile: &str) -> [&'static str; 3] {
    match profile {
        "production" => ["config/common.env", "config/prod.env", ".secrets.env"],
        _ => ["config/common.env", "config/dev.env", ".secrets.env"],
    }
}

fn load_env_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        warn!(path, "Environment file not found, skipping");
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!(path, "Loaded environment file");
    Ok(())
}

pub fn database_url() -> String {
    dotenvy::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}
