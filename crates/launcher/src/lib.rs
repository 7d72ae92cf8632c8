//! # Launcher
//!
//! Spawns the external commands of a pipeline. Each child gets its stdin and
//! stdout from its stage endpoints and inherits the wrapper's stderr. A
//! watcher task per child waits for it to exit, or kills it on request, and
//! reports one completion event.

mod error;

pub use error::LaunchError;

use std::process::Stdio;

use compiler::ProcessStage;
use contracts::{StageEvent, StageKind, StageOutcome};
use endpoint::EndpointError;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// How a child ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub index: usize,
    pub outcome: StageOutcome,
    /// Terminated by a kill order
    pub killed: bool,
}

/// Handle to a running child and its watcher
pub struct ProcessHandle {
    index: usize,
    pid: Option<u32>,
    command: String,
    kill_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<ProcessExit>,
}

impl ProcessHandle {
    /// Spawn the stage's command
    ///
    /// The parent's copies of the child's pipe ends are closed before this
    /// returns, so end-of-data propagates once the child exits.
    #[instrument(name = "launch", skip_all, fields(stage = stage.index))]
    pub fn launch(
        stage: ProcessStage,
        events: mpsc::Sender<StageEvent>,
    ) -> Result<Self, LaunchError> {
        let ProcessStage {
            index,
            command,
            argv,
            stdin,
            stdout,
        } = stage;

        let (program, args) = argv
            .split_first()
            .ok_or(LaunchError::EmptyCommand { stage: index })?;

        let endpoint_error = |source: EndpointError| LaunchError::Endpoint {
            stage: index,
            source,
        };
        let stdin = stdin.into_stdio().map_err(endpoint_error)?;
        let stdout = stdout.into_stdio().map_err(endpoint_error)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            stage: index,
            command: command.clone(),
            source,
        })?;
        drop(cmd);

        let pid = child.id();
        info!(pid = ?pid, command = %command, "Process started");

        let (kill_tx, kill_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch(index, child, kill_rx, events));

        Ok(Self {
            index,
            pid,
            command,
            kill_tx: Some(kill_tx),
            watcher,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Order the watcher to kill the child
    ///
    /// Returns false if the order was already given or the child is gone.
    pub fn kill(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait for the child until `deadline`; `None` if it is still running
    pub async fn join_until(
        &mut self,
        deadline: Instant,
    ) -> Option<Result<ProcessExit, JoinError>> {
        tokio::time::timeout_at(deadline, &mut self.watcher)
            .await
            .ok()
    }

    /// Wait for the watcher to reap the child
    pub async fn join(self) -> Result<ProcessExit, JoinError> {
        self.watcher.await
    }
}

/// Watcher task: wait for exit or a kill order, report, return the exit
#[instrument(name = "process_watcher", skip(child, kill_rx, events), fields(stage = index))]
async fn watch(
    index: usize,
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    events: mpsc::Sender<StageEvent>,
) -> ProcessExit {
    let (status, killed) = tokio::select! {
        status = child.wait() => (status, false),
        Ok(()) = kill_rx => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Kill failed");
            }
            (child.wait().await, true)
        }
    };

    let outcome = match status {
        Ok(status) => StageOutcome::Exited {
            code: status.code(),
            success: status.success(),
        },
        Err(e) => {
            warn!(error = %e, "Wait failed");
            StageOutcome::Failed {
                message: format!("wait failed: {e}"),
            }
        }
    };

    if killed {
        observability::record_process_killed(index);
    }
    observability::record_stage_completion(index, StageKind::Process, outcome.is_clean());

    let event = StageEvent {
        stage: index,
        outcome: outcome.clone(),
    };
    if events.send(event).await.is_err() {
        debug!("Completion channel closed");
    }

    debug!(outcome = ?outcome, killed, "Process reaped");
    ProcessExit {
        index,
        outcome,
        killed,
    }
}
