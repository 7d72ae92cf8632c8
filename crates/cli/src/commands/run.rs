//! `run` command implementation.

use compiler::PlanRequest;
use contracts::{CompletionReason, ExitStatus};
use supervisor::SupervisorReport;
use tracing::{error, info, warn};

use super::settings;
use crate::cli::RunArgs;
use crate::error::Result;

/// Execute the `run` command
///
/// Standard output may be part of the pipeline, so nothing is printed there.
pub async fn run_pipeline(args: &RunArgs) -> Result<ExitStatus> {
    let settings = settings::resolve(args)?;
    let (input_port, output_port) = args.ports();
    info!(
        template = %args.command,
        input_port = ?input_port,
        output_port = ?output_port,
        watchdog = settings.watchdog.enabled,
        grace_ms = settings.teardown.grace().as_millis() as u64,
        buffer_size = settings.limits.buffer_size,
        "Settings resolved"
    );

    let request = PlanRequest::new(&args.command, &settings).with_ports(input_port, output_port);
    let pipeline = compiler::compile(&request).await?;

    info!(
        processes = pipeline.process_count(),
        movers = pipeline.mover_count(),
        "Starting pipeline..."
    );
    let report = supervisor::run_until(pipeline, &settings, shutdown_signal()).await;
    log_report(&report);

    Ok(report.exit_status)
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn log_report(report: &SupervisorReport) {
    for mover in &report.movers {
        info!(
            stage = mover.stage,
            role = ?mover.role,
            bytes = mover.bytes,
            forwards = mover.forwards,
            "Mover summary"
        );
    }

    let teardown = &report.teardown;
    info!(
        completions = report.completions.len(),
        late_events = teardown.late_events,
        processes_killed = teardown.processes_killed,
        movers_aborted = teardown.movers_aborted,
        exit_code = report.exit_code(),
        "Pipeline finished"
    );

    match &report.reason {
        CompletionReason::SourceExhausted { stage } => {
            info!(stage, "Source exhausted");
        }
        CompletionReason::StageEnded { stage } => {
            warn!(stage, "Stage ended before the source");
        }
        CompletionReason::StageFailed { stage, message } => {
            error!(stage, message = %message, "Stage failed");
        }
        CompletionReason::Stalled { idle_ms } => {
            error!(idle_ms, "Pipeline stalled");
        }
        CompletionReason::LaunchFailed { stage, message } => {
            error!(stage, message = %message, "Pipeline could not start");
        }
        CompletionReason::Interrupted => {
            warn!("Pipeline interrupted");
        }
    }
}
