//! MoverHandle - runs one mover stage in its own task

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use compiler::MoverStage;
use contracts::{MoverRole, StageEvent, StageKind, StageOutcome};
use endpoint::Endpoint;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::liveness::Liveness;

/// What a mover hands back when it stops
#[derive(Debug)]
pub struct MoverReport {
    pub index: usize,
    pub role: MoverRole,
    pub outcome: StageOutcome,
    /// Endpoints left open for teardown (sockets)
    pub retained: Vec<Endpoint>,
}

/// Handle to a running mover task
pub struct MoverHandle {
    index: usize,
    role: MoverRole,
    liveness: Arc<Liveness>,
    /// FIFO the mover may be waiting on
    named_pipe: Option<PathBuf>,
    worker_handle: JoinHandle<MoverReport>,
}

impl MoverHandle {
    /// Spawn the mover task
    ///
    /// The task sends exactly one `StageEvent` on `events` when it stops.
    pub fn spawn(stage: MoverStage, events: mpsc::Sender<StageEvent>, buffer_size: usize) -> Self {
        let index = stage.index;
        let role = stage.role;
        let named_pipe = stage.input.named_pipe_path().map(Path::to_path_buf);
        let liveness = Arc::new(Liveness::new());

        let worker_liveness = Arc::clone(&liveness);
        let worker_handle = tokio::spawn(async move {
            mover_worker(stage, events, worker_liveness, buffer_size).await
        });

        debug!(stage = index, role = ?role, "Mover spawned");
        Self {
            index,
            role,
            liveness,
            named_pipe,
            worker_handle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn role(&self) -> MoverRole {
        self.role
    }

    pub fn liveness(&self) -> &Arc<Liveness> {
        &self.liveness
    }

    pub fn named_pipe(&self) -> Option<&Path> {
        self.named_pipe.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.worker_handle.is_finished()
    }

    /// Wait for the task until `deadline`
    ///
    /// Returns `None` if the task is still running at the deadline.
    pub async fn join_until(
        &mut self,
        deadline: Instant,
    ) -> Option<Result<MoverReport, JoinError>> {
        tokio::time::timeout_at(deadline, &mut self.worker_handle)
            .await
            .ok()
    }

    /// Cancel the task and collect whatever it returns
    ///
    /// Cancellation drops the in-flight read or write at its await point,
    /// closing the endpoints the task still owns.
    #[instrument(name = "mover_abort", skip(self), fields(stage = self.index))]
    pub async fn abort(self) -> Option<MoverReport> {
        self.worker_handle.abort();
        match self.worker_handle.await {
            Ok(report) => Some(report),
            Err(e) if e.is_cancelled() => {
                debug!("Mover cancelled");
                None
            }
            Err(e) => {
                error!(error = ?e, "Mover task panicked");
                None
            }
        }
    }
}

/// Worker task: handshake, forward until end-of-data, then report
#[instrument(
    name = "mover_worker",
    skip(stage, events, liveness),
    fields(stage = stage.index, role = ?stage.role)
)]
async fn mover_worker(
    stage: MoverStage,
    events: mpsc::Sender<StageEvent>,
    liveness: Arc<Liveness>,
    buffer_size: usize,
) -> MoverReport {
    let MoverStage {
        index,
        role,
        mut input,
        mut output,
    } = stage;

    let mut outcome = match input.accept().await {
        Ok(()) => forward(&mut input, &mut output, &liveness, index, buffer_size).await,
        Err(e) => {
            error!(error = %e, "Named pipe handshake failed");
            StageOutcome::Failed {
                message: e.to_string(),
            }
        }
    };

    let mut retained = Vec::new();
    let (kept, finished) = output.finish().await;
    if let Err(e) = finished {
        warn!(error = %e, "Closing output failed");
        if outcome.is_clean() {
            outcome = StageOutcome::Failed {
                message: format!("closing output failed: {e}"),
            };
        }
    }
    retained.extend(kept);
    retained.extend(input.retire());

    observability::record_stage_completion(index, StageKind::Mover, outcome.is_clean());
    let event = StageEvent {
        stage: index,
        outcome: outcome.clone(),
    };
    if events.send(event).await.is_err() {
        debug!("Completion channel closed");
    }

    debug!(outcome = ?outcome, "Mover stopped");
    MoverReport {
        index,
        role,
        outcome,
        retained,
    }
}

/// Read/forward loop
async fn forward(
    input: &mut Endpoint,
    output: &mut Endpoint,
    liveness: &Liveness,
    index: usize,
    buffer_size: usize,
) -> StageOutcome {
    let mut buf = BytesMut::zeroed(buffer_size);
    let mut total: u64 = 0;

    loop {
        let n = match input.read(&mut buf).await {
            Ok(0) => {
                debug!(bytes = total, "End of data");
                return StageOutcome::EndOfData { bytes: total };
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, bytes = total, "Read failed");
                return StageOutcome::Failed {
                    message: format!("read failed: {e}"),
                };
            }
        };

        if let Err(e) = output.write_all(&buf[..n]).await {
            let message = if e.kind() == io::ErrorKind::WriteZero {
                format!("short write: {e}")
            } else {
                format!("write failed: {e}")
            };
            warn!(error = %e, bytes = total, "Forward failed");
            return StageOutcome::Failed { message };
        }

        total += n as u64;
        liveness.record(n);
        observability::record_mover_forward(index, n);
    }
}
