//! Ordered, bounded, idempotent teardown
//!
//! 1. wait for movers until a shared deadline
//! 2. wait for processes until a fresh deadline, then kill and reap survivors
//! 3. release a pending named-pipe handshake, abort remaining movers
//! 4. close retained endpoints, flush stdout, unlink the FIFO
//!
//! Each step is best-effort; failures are logged and the next step runs.

use std::io;

use contracts::SupervisorState;
use launcher::ProcessExit;
use mover::MoverReport;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::Supervisor;

/// What teardown had to do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    /// Movers that stopped on their own
    pub movers_joined: usize,
    /// Movers cancelled after the grace period
    pub movers_aborted: usize,
    /// Processes that exited on their own
    pub processes_exited: usize,
    /// Processes killed after the grace period
    pub processes_killed: usize,
    /// Retained endpoints closed
    pub endpoints_closed: usize,
    /// Completion events received after the first one was acted on
    pub late_events: usize,
}

impl Supervisor {
    /// Tear the pipeline down
    ///
    /// A second call returns an empty report.
    #[instrument(name = "supervisor_teardown", skip_all)]
    pub async fn teardown(&mut self) -> TeardownReport {
        if self.state == SupervisorState::Terminated {
            debug!("Teardown already done");
            return TeardownReport::default();
        }
        self.state = SupervisorState::Draining;
        self.events_tx = None;

        let mut report = TeardownReport::default();
        let grace = self.config.grace;
        let already_seen = self.completions.len();

        // 1. movers, shared deadline
        let deadline = Instant::now() + grace;
        let mut running_movers = Vec::new();
        for mut mover in self.movers.drain(..) {
            match mover.join_until(deadline).await {
                Some(Ok(done)) => {
                    report.movers_joined += 1;
                    self.retained.extend(done.retained);
                }
                Some(Err(e)) => {
                    error!(stage = mover.index(), error = ?e, "Mover task panicked");
                }
                None => running_movers.push(mover),
            }
        }

        // 2. processes, fresh deadline
        let deadline = Instant::now() + grace;
        let mut survivors = Vec::new();
        for mut process in self.processes.drain(..) {
            match process.join_until(deadline).await {
                Some(Ok(exit)) => {
                    report.processes_exited += 1;
                    log_exit(&exit);
                }
                Some(Err(e)) => {
                    error!(stage = process.index(), error = ?e, "Watcher task panicked");
                }
                None => survivors.push(process),
            }
        }
        for process in &mut survivors {
            warn!(
                stage = process.index(),
                pid = ?process.pid(),
                command = %process.command(),
                "Process did not exit in time, killing"
            );
            if !process.kill() {
                warn!(stage = process.index(), "Kill order not delivered");
            }
        }
        for process in survivors {
            let stage = process.index();
            match process.join().await {
                Ok(exit) => {
                    if exit.killed {
                        report.processes_killed += 1;
                    } else {
                        report.processes_exited += 1;
                    }
                    log_exit(&exit);
                }
                Err(e) => error!(stage, error = ?e, "Watcher task panicked"),
            }
        }

        // 3. movers still running
        for mover in &running_movers {
            if let Some(path) = mover.named_pipe() {
                if !mover.is_finished() && endpoint::release_pending(path) {
                    debug!(stage = mover.index(), "Pending named pipe handshake released");
                }
            }
        }
        for mover in running_movers {
            let stage = mover.index();
            match mover.abort().await {
                Some(MoverReport { retained, .. }) => {
                    report.movers_joined += 1;
                    self.retained.extend(retained);
                }
                None => {
                    warn!(stage, "Mover aborted");
                    report.movers_aborted += 1;
                }
            }
        }

        // 4. endpoints, own stdout, FIFO
        for endpoint in self.retained.drain(..) {
            let kind = endpoint.kind();
            if let Err(e) = endpoint.close().await {
                warn!(kind = ?kind, error = %e, "Closing endpoint failed");
            }
            report.endpoints_closed += 1;
        }
        if let Err(e) = tokio::io::stdout().flush().await {
            warn!(error = %e, "Flushing stdout failed");
        }
        if let Some(path) = self.named_pipe.take() {
            // a handshake started after step 3 would otherwise block forever
            if endpoint::release_pending(&path) {
                debug!(path = %path.display(), "Late named pipe handshake released");
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Named pipe unlinked"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unlinking named pipe failed");
                }
            }
        }

        // late completions are kept in arrival order
        while let Ok(event) = self.events_rx.try_recv() {
            self.completions.push(event);
        }
        report.late_events = self.completions.len().saturating_sub(already_seen);

        observability::record_active_stages(0);
        self.state = SupervisorState::Terminated;
        info!(
            movers_joined = report.movers_joined,
            movers_aborted = report.movers_aborted,
            processes_exited = report.processes_exited,
            processes_killed = report.processes_killed,
            endpoints_closed = report.endpoints_closed,
            "Teardown complete"
        );
        report
    }
}

fn log_exit(exit: &ProcessExit) {
    debug!(stage = exit.index, outcome = ?exit.outcome, killed = exit.killed, "Process reaped");
}
