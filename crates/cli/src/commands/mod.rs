//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_acquisition;
pub use validate::run_validate;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::Settings;
use std::path::Path;
use tracing::info;

/// Load settings from `path`, or fall back to the built-in defaults
fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(Settings::default())
        }
    }
}
