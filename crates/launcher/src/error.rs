//! Launcher error types

use endpoint::EndpointError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("stage {stage} has an empty command")]
    EmptyCommand { stage: usize },

    /// Endpoint cannot become a standard handle
    #[error("stage {stage}: {source}")]
    Endpoint {
        stage: usize,
        #[source]
        source: EndpointError,
    },

    #[error("cannot spawn stage {stage} ({command}): {source}")]
    Spawn {
        stage: usize,
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    pub fn stage(&self) -> usize {
        match self {
            Self::EmptyCommand { stage }
            | Self::Endpoint { stage, .. }
            | Self::Spawn { stage, .. } => *stage,
        }
    }
}
