//! Compiler error types

use contracts::ErrorClass;
use endpoint::EndpointError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed command template
    #[error("invalid command template: {message}")]
    Template { message: String },

    /// Plan violates the single reader / single writer rule
    #[error("inconsistent plan: {message}")]
    Plan { message: String },

    /// Resource allocation for a stage failed
    #[error("stage {stage}: {source}")]
    Endpoint {
        stage: usize,
        #[source]
        source: EndpointError,
    },
}

impl CompileError {
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    pub(crate) fn endpoint(stage: usize) -> impl FnOnce(EndpointError) -> Self {
        move |source| Self::Endpoint { stage, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Template { .. } | Self::Plan { .. } => ErrorClass::Configuration,
            Self::Endpoint { .. } => ErrorClass::Resource,
        }
    }
}
