//! Stage completion events and supervisor outcomes.

use serde::{Deserialize, Serialize};

use crate::ErrorClass;

/// How a single stage finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StageOutcome {
    /// Mover saw orderly end-of-data
    EndOfData { bytes: u64 },
    /// Child process exited (`code` is `None` when killed by a signal)
    Exited { code: Option<i32>, success: bool },
    /// Mover I/O failure or process wait failure
    Failed { message: String },
}

impl StageOutcome {
    /// Whether the stage ended without error
    pub fn is_clean(&self) -> bool {
        match self {
            Self::EndOfData { .. } => true,
            Self::Exited { success, .. } => *success,
            Self::Failed { .. } => false,
        }
    }
}

/// Completion signal sent by a mover task or a process watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
    pub stage: usize,
    pub outcome: StageOutcome,
}

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Starting,
    Running,
    Draining,
    Terminated,
}

/// Why the supervisor left `Running`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum CompletionReason {
    /// Stage 0 (the source) ended cleanly
    SourceExhausted { stage: usize },
    /// A downstream stage ended cleanly before the source
    StageEnded { stage: usize },
    /// A stage failed
    StageFailed { stage: usize, message: String },
    /// Watchdog saw no progress
    Stalled { idle_ms: u64 },
    /// A stage could not be started
    LaunchFailed { stage: usize, message: String },
    /// The wrapper received a shutdown signal
    Interrupted,
}

impl CompletionReason {
    /// Classify the first completion event
    pub fn from_event(event: &StageEvent, source_stage: usize) -> Self {
        match &event.outcome {
            outcome if outcome.is_clean() && event.stage == source_stage => {
                Self::SourceExhausted { stage: event.stage }
            }
            outcome if outcome.is_clean() => Self::StageEnded { stage: event.stage },
            StageOutcome::Failed { message } => Self::StageFailed {
                stage: event.stage,
                message: message.clone(),
            },
            StageOutcome::Exited { code, .. } => Self::StageFailed {
                stage: event.stage,
                message: match code {
                    Some(code) => format!("exited with status {code}"),
                    None => "terminated by signal".to_string(),
                },
            },
            StageOutcome::EndOfData { .. } => Self::StageEnded { stage: event.stage },
        }
    }

    /// Error class, `None` for a normal completion
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::SourceExhausted { .. } => None,
            Self::StageEnded { .. } | Self::StageFailed { .. } | Self::Interrupted => {
                Some(ErrorClass::StageFailure)
            }
            Self::Stalled { .. } => Some(ErrorClass::StallTimeout),
            Self::LaunchFailed { .. } => Some(ErrorClass::Resource),
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::from_class(self.error_class())
    }
}

/// Process exit status of the wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Source exhausted, pipeline drained
    Success,
    /// A stage ended or failed before the source
    StageFailure,
    /// Configuration or resource error
    SetupFailure,
    /// Watchdog stall
    Stalled,
}

impl ExitStatus {
    pub fn from_class(class: Option<ErrorClass>) -> Self {
        match class {
            None => Self::Success,
            Some(ErrorClass::StageFailure) => Self::StageFailure,
            Some(ErrorClass::Configuration | ErrorClass::Resource) => Self::SetupFailure,
            Some(ErrorClass::StallTimeout) => Self::Stalled,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::StageFailure => 1,
            Self::SetupFailure => 2,
            Self::Stalled => 3,
        }
    }
}
