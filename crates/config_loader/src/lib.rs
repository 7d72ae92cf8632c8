//! # Config Loader
//!
//! Runtime settings loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON settings files
//! - Validate watchdog, teardown and limit values
//! - Generate `RuntimeSettings`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let settings = ConfigLoader::load_from_path(Path::new("sockwrap.toml")).unwrap();
//! println!("Buffer size: {}", settings.limits.buffer_size);
//! ```

mod parser;
mod validator;

pub use contracts::RuntimeSettings;
pub use parser::ConfigFormat;
pub use validator::{
    validate, MAX_BUFFER_SIZE, MAX_STAGES_LIMIT, MAX_STALL_WINDOW_MS, MIN_BUFFER_SIZE,
};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load settings from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RuntimeSettings, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load settings from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RuntimeSettings, ContractError> {
        Self::parse_and_validate(content, format)
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<RuntimeSettings, ContractError> {
        let settings = parser::parse(content, format)?;
        validator::validate(&settings)?;
        Ok(settings)
    }
}
