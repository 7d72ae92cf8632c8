//! # sockwrap CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 运行管道（`run`），退出码反映管道结束原因
//! - 只编译模板、不分配资源（`plan`）
//! - 配置文件校验（`validate`）
//!
//! 日志始终输出到 stderr，stdout 可能是管道本身的输出。

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_pipeline, run_plan, run_validate};
use error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("sockwrap: {e}");
        return ExitCode::from(e.exit_status().code());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "sockwrap starting");

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Plan(args) => run_plan(args),
        Commands::Validate(args) => run_validate(args),
    };

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "Command failed");
            e.exit_status()
        }
    };
    ExitCode::from(status.code())
}

/// Initialize logging (and metrics for `run`) based on CLI options
fn init_logging(cli: &Cli) -> Result<(), CliError> {
    let metrics_port = match &cli.command {
        Commands::Run(args) if args.metrics_port != 0 => Some(args.metrics_port),
        _ => None,
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: cli.log_level().to_string(),
        ignore_env: cli.quiet,
    })?;
    Ok(())
}
