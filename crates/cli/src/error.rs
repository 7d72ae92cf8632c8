//! Error types for CLI operations.

use std::path::Path;

use compiler::CompileError;
use contracts::{ContractError, ErrorClass, ExitStatus};
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Settings could not be loaded or are invalid
    #[error(transparent)]
    Settings(#[from] ContractError),

    /// Template could not be compiled or its resources allocated
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Result could not be rendered
    #[error("cannot render output: {0}")]
    Output(#[from] serde_json::Error),

    /// Logging or metrics could not be set up
    #[error("{0:#}")]
    Setup(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ConfigNotFound { .. } => ErrorClass::Configuration,
            Self::Settings(e) => e.class(),
            Self::Compile(e) => e.class(),
            Self::Output(_) | Self::Setup(_) => ErrorClass::Resource,
        }
    }

    /// Exit status reported for this error
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_class(Some(self.class()))
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
