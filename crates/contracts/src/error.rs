//! Layered error definitions
//!
//! Settings errors, plus the error classes that pick the exit status

use thiserror::Error;

/// Error class, used to pick the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad template or unsupported option, fatal before any stage starts
    Configuration,
    /// Socket/pipe/handle allocation, connection or spawn failure
    Resource,
    /// A mover or child process failed while running
    StageFailure,
    /// No forward progress within the watchdog window
    StallTimeout,
}

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Error class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } => ErrorClass::Configuration,
            Self::Io(_) => ErrorClass::Resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            ContractError::config_validation("limits.max_stages", "must be >= 1").class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            ContractError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
                .class(),
            ErrorClass::Resource
        );
    }

    #[test]
    fn test_error_display() {
        let err = ContractError::config_validation("marker", "marker cannot be empty");
        assert_eq!(
            err.to_string(),
            "config validation error at 'marker': marker cannot be empty"
        );
    }
}
