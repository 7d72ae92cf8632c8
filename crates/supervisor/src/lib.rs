//! # Supervisor
//!
//! Starts every stage of a compiled pipeline, waits for the first completion
//! (or a watchdog stall) and tears the pipeline down.
//!
//! State machine: `Starting -> Running -> Draining -> Terminated`.

mod error;
mod teardown;
mod watchdog;

pub use error::SupervisorError;
pub use teardown::TeardownReport;
pub use watchdog::Watchdog;

use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use compiler::{CompiledPipeline, Stage};
use contracts::{
    CompletionReason, ExitStatus, MoverRole, RuntimeSettings, StageEvent, SupervisorState,
    WatchdogSettings,
};
use endpoint::Endpoint;
use launcher::ProcessHandle;
use mover::{Liveness, MoverHandle};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Longest wait for the source after a downstream stage ends first
const SOURCE_SETTLE: Duration = Duration::from_millis(100);

/// Supervisor tuning, derived from `RuntimeSettings`
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub watchdog: WatchdogSettings,
    /// Time stages get to stop on their own during teardown
    pub grace: Duration,
    pub buffer_size: usize,
}

impl From<&RuntimeSettings> for SupervisorConfig {
    fn from(settings: &RuntimeSettings) -> Self {
        Self {
            watchdog: settings.watchdog.clone(),
            grace: settings.teardown.grace(),
            buffer_size: settings.limits.buffer_size,
        }
    }
}

/// Bytes moved by one mover
#[derive(Debug, Clone, Serialize)]
pub struct MoverSummary {
    pub stage: usize,
    pub role: MoverRole,
    pub bytes: u64,
    pub forwards: u64,
}

/// Result of a supervised run
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorReport {
    pub reason: CompletionReason,
    pub exit_status: ExitStatus,
    /// Completion events in arrival order, including late ones
    pub completions: Vec<StageEvent>,
    pub movers: Vec<MoverSummary>,
    pub teardown: TeardownReport,
}

impl SupervisorReport {
    pub fn exit_code(&self) -> u8 {
        self.exit_status.code()
    }
}

/// Owns every running stage of one pipeline
pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    movers: Vec<MoverHandle>,
    processes: Vec<ProcessHandle>,
    events_tx: Option<mpsc::Sender<StageEvent>>,
    events_rx: mpsc::Receiver<StageEvent>,
    completions: Vec<StageEvent>,
    /// Endpoints handed back by movers, closed once in teardown
    retained: Vec<Endpoint>,
    named_pipe: Option<PathBuf>,
    /// Ordinal of the pipeline's source stage
    source_stage: usize,
    /// Liveness of every mover, kept past teardown for the summary
    counters: Vec<(usize, MoverRole, Arc<Liveness>)>,
}

impl Supervisor {
    /// Create a supervisor for `stage_count` stages
    pub fn new(config: SupervisorConfig, stage_count: usize) -> Self {
        // every stage reports exactly once, so sends never wait
        let (events_tx, events_rx) = mpsc::channel(stage_count.max(1));
        Self {
            config,
            state: SupervisorState::Starting,
            movers: Vec::new(),
            processes: Vec::new(),
            events_tx: Some(events_tx),
            events_rx,
            completions: Vec::new(),
            retained: Vec::new(),
            named_pipe: None,
            source_stage: 0,
            counters: Vec::new(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn completions(&self) -> &[StageEvent] {
        &self.completions
    }

    /// Start all movers, then all processes
    ///
    /// On a launch failure the stages already running stay registered for
    /// teardown and the unstarted ones are dropped, closing their endpoints.
    #[instrument(name = "supervisor_start", skip_all)]
    pub fn start(&mut self, pipeline: CompiledPipeline) -> Result<(), SupervisorError> {
        if self.state != SupervisorState::Starting {
            return Err(SupervisorError::InvalidState {
                expected: SupervisorState::Starting,
                actual: self.state,
            });
        }
        let Some(events) = self.events_tx.take() else {
            return Err(SupervisorError::AlreadyStarted);
        };

        let CompiledPipeline {
            stages, named_pipe, ..
        } = pipeline;
        self.named_pipe = named_pipe;
        self.source_stage = stages.first().map(Stage::index).unwrap_or_default();

        let (movers, processes): (Vec<_>, Vec<_>) = stages
            .into_iter()
            .partition(|stage| matches!(stage, Stage::Mover(_)));

        for stage in movers {
            if let Stage::Mover(stage) = stage {
                let handle = MoverHandle::spawn(stage, events.clone(), self.config.buffer_size);
                self.counters.push((
                    handle.index(),
                    handle.role(),
                    Arc::clone(handle.liveness()),
                ));
                self.movers.push(handle);
            }
        }

        for stage in processes {
            if let Stage::Process(stage) = stage {
                let handle = ProcessHandle::launch(stage, events.clone())?;
                self.processes.push(handle);
            }
        }

        observability::record_active_stages(self.movers.len() + self.processes.len());
        info!(
            movers = self.movers.len(),
            processes = self.processes.len(),
            "Pipeline started"
        );
        Ok(())
    }

    /// Wait for the first completion event or a stall
    pub async fn wait(&mut self) -> CompletionReason {
        self.wait_until(std::future::pending()).await
    }

    /// Like `wait`, but gives up when `shutdown` resolves
    #[instrument(name = "supervisor_wait", skip_all)]
    pub async fn wait_until<F>(&mut self, shutdown: F) -> CompletionReason
    where
        F: Future<Output = ()>,
    {
        self.state = SupervisorState::Running;
        let mut shutdown = pin!(shutdown);

        let counters: Vec<Arc<Liveness>> = self
            .counters
            .iter()
            .map(|(_, _, liveness)| Arc::clone(liveness))
            .collect();
        let mut watchdog = Watchdog::new(&self.config.watchdog, counters);
        if watchdog.is_armed() {
            debug!(
                interval_ms = watchdog.check_interval().as_millis() as u64,
                window_ms = self.config.watchdog.stall_window().as_millis() as u64,
                "Watchdog armed"
            );
        }

        let reason = loop {
            let next = tokio::select! {
                biased;
                () = &mut shutdown => {
                    warn!("Shutdown requested");
                    break CompletionReason::Interrupted;
                }
                next = tokio::time::timeout(watchdog.check_interval(), self.events_rx.recv()) => next,
            };
            match next {
                Ok(Some(event)) => {
                    info!(stage = event.stage, outcome = ?event.outcome, "First stage completed");
                    let reason = CompletionReason::from_event(&event, self.source_stage);
                    self.completions.push(event);
                    if matches!(reason, CompletionReason::StageEnded { .. }) {
                        break self.settle(reason).await;
                    }
                    break reason;
                }
                Ok(None) => {
                    error!("Every stage stopped without reporting");
                    break CompletionReason::StageFailed {
                        stage: self.source_stage,
                        message: "stages stopped without reporting".to_string(),
                    };
                }
                Err(_) => {
                    if let Some(idle) = watchdog.check() {
                        let idle_ms = idle.as_millis() as u64;
                        warn!(idle_ms, "Pipeline stalled");
                        observability::record_stall(idle_ms);
                        break CompletionReason::Stalled { idle_ms };
                    }
                }
            }
        };

        self.state = SupervisorState::Draining;
        reason
    }

    /// A downstream stage ended cleanly before the source reported
    ///
    /// End-of-data reaches a mover as soon as the source closes its output,
    /// which can be before the source's own exit is reaped. Give the source
    /// a short window to report a clean end before calling it an early exit.
    /// A failure reported by any stage inside the window takes precedence.
    async fn settle(&mut self, reason: CompletionReason) -> CompletionReason {
        let window = SOURCE_SETTLE.min(self.config.grace);
        let deadline = tokio::time::Instant::now() + window;

        while let Ok(Some(event)) =
            tokio::time::timeout_at(deadline, self.events_rx.recv()).await
        {
            let settled = CompletionReason::from_event(&event, self.source_stage);
            self.completions.push(event);
            match settled {
                CompletionReason::SourceExhausted { .. } => {
                    debug!("Source ended within the settle window");
                    return settled;
                }
                CompletionReason::StageFailed { stage, .. } => {
                    debug!(stage, "Stage failed within the settle window");
                    return settled;
                }
                _ => {}
            }
        }
        reason
    }

    /// Bytes moved so far by each mover
    pub fn mover_summaries(&self) -> Vec<MoverSummary> {
        self.counters
            .iter()
            .map(|(stage, role, liveness)| {
                let snapshot = liveness.snapshot();
                MoverSummary {
                    stage: *stage,
                    role: *role,
                    bytes: snapshot.bytes,
                    forwards: snapshot.forwards,
                }
            })
            .collect()
    }
}

/// Run a compiled pipeline to completion
///
/// Always tears the pipeline down before returning.
pub async fn run(pipeline: CompiledPipeline, settings: &RuntimeSettings) -> SupervisorReport {
    run_until(pipeline, settings, std::future::pending()).await
}

/// Run a compiled pipeline, stopping early when `shutdown` resolves
pub async fn run_until<F>(
    pipeline: CompiledPipeline,
    settings: &RuntimeSettings,
    shutdown: F,
) -> SupervisorReport
where
    F: Future<Output = ()>,
{
    let mut supervisor = Supervisor::new(SupervisorConfig::from(settings), pipeline.stages.len());

    let reason = match supervisor.start(pipeline) {
        Ok(()) => supervisor.wait_until(shutdown).await,
        Err(e) => {
            error!(error = %e, "Pipeline failed to start");
            let stage = match &e {
                SupervisorError::Launch(launch) => launch.stage(),
                SupervisorError::InvalidState { .. } | SupervisorError::AlreadyStarted => 0,
            };
            CompletionReason::LaunchFailed {
                stage,
                message: e.to_string(),
            }
        }
    };

    let teardown = supervisor.teardown().await;

    let report = SupervisorReport {
        exit_status: reason.exit_status(),
        reason,
        completions: supervisor.completions.clone(),
        movers: supervisor.mover_summaries(),
        teardown,
    };
    info!(
        reason = ?report.reason,
        exit_code = report.exit_code(),
        "Pipeline finished"
    );
    report
}
