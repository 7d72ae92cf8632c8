//! `validate` command implementation.

use contracts::{ExitStatus, RuntimeSettings};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::Result;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<RuntimeSettings>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<ExitStatus> {
    info!(config = %args.config.display(), "Validating settings");

    let result = validate_settings(args);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(ExitStatus::Success)
    } else {
        Ok(ExitStatus::SetupFailure)
    }
}

fn validate_settings(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            settings: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(settings) => {
            let warnings = collect_warnings(&settings);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                settings: Some(settings),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            settings: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(settings: &RuntimeSettings) -> Vec<String> {
    let mut warnings = Vec::new();

    let window = settings.watchdog.stall_window();
    if settings.watchdog.enabled && window < settings.teardown.grace() {
        warnings.push(format!(
            "watchdog stall window ({}ms) is shorter than the teardown grace period ({}ms)",
            window.as_millis(),
            settings.teardown.grace().as_millis()
        ));
    }

    if settings.teardown.fast {
        warnings.push(format!(
            "teardown.fast is set - grace_ms ({}) is ignored",
            settings.teardown.grace_ms
        ));
    }

    if !settings.limits.buffer_size.is_power_of_two() {
        warnings.push(format!(
            "limits.buffer_size ({}) is not a power of two",
            settings.limits.buffer_size
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Settings are valid: {}", result.config_path);

        if let Some(ref settings) = result.settings {
            println!("\n  Marker: {}", settings.marker);
            println!(
                "  Watchdog: {} (interval {}ms x {} checks)",
                if settings.watchdog.enabled { "on" } else { "off" },
                settings.watchdog.check_interval_ms,
                settings.watchdog.stall_checks
            );
            println!("  Grace: {}ms", settings.teardown.grace().as_millis());
            println!("  Max stages: {}", settings.limits.max_stages);
            println!("  Buffer size: {} bytes", settings.limits.buffer_size);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Settings are invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
