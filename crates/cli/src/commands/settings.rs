//! Settings resolution: file, then command-line overrides.

use std::path::Path;

use config_loader::{ConfigLoader, RuntimeSettings};
use tracing::info;

use crate::cli::RunArgs;
use crate::error::{CliError, Result};

/// Load settings from `path`, or defaults when no file is given
pub fn load(path: Option<&Path>) -> Result<RuntimeSettings> {
    let Some(path) = path else {
        return Ok(RuntimeSettings::default());
    };
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }

    let settings = ConfigLoader::load_from_path(path)?;
    info!(config = %path.display(), "Settings loaded");
    Ok(settings)
}

/// Settings for `run`: file values overridden by flags, then validated
pub fn resolve(args: &RunArgs) -> Result<RuntimeSettings> {
    let mut settings = load(args.config.as_deref())?;
    apply_overrides(&mut settings, args);
    config_loader::validate(&settings)?;
    Ok(settings)
}

fn apply_overrides(settings: &mut RuntimeSettings, args: &RunArgs) {
    if args.watchdog {
        settings.watchdog.enabled = true;
    }
    if let Some(interval) = args.check_interval_ms {
        settings.watchdog.check_interval_ms = interval;
    }
    if let Some(checks) = args.stall_checks {
        settings.watchdog.stall_checks = checks;
    }
    if args.fast {
        settings.teardown.fast = true;
    }
    if let Some(size) = args.buffer_size {
        settings.limits.buffer_size = size;
    }
}
