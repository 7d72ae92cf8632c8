//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// sockwrap - run a shell-style command pipeline between loopback sockets
#[derive(Parser, Debug)]
#[command(
    name = "sockwrap",
    author,
    version,
    about = "Run a command pipeline between loopback TCP sockets",
    long_about = "Runs a '|'-separated command template as a pipeline of child processes.\n\n\
                  Optional loopback sockets feed the first command and drain the last one.\n\
                  A '#PIPE#' marker in the first command is replaced by a named pipe whose\n\
                  contents flow to the next stage."
)]
pub struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SOCKWRAP_VERBOSE")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs always go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "SOCKWRAP_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a pipeline until the source is exhausted or a stage ends
    Run(RunArgs),

    /// Print the stage layout of a template without running it
    Plan(PlanArgs),

    /// Validate a runtime settings file without running
    Validate(ValidateArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Command template, stages separated by '|'
    #[arg(short, long, env = "SOCKWRAP_COMMAND")]
    pub command: String,

    /// Loopback port feeding the first command (0 = stdin)
    #[arg(short, long)]
    pub input_port: Option<u16>,

    /// Loopback port receiving the last command's output (0 = stdout)
    #[arg(short, long)]
    pub output_port: Option<u16>,

    /// Fail the pipeline when no data moves for too long
    #[arg(short, long)]
    pub watchdog: bool,

    /// Runtime settings file (TOML or JSON)
    #[arg(long, env = "SOCKWRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use the short teardown grace period
    #[arg(long)]
    pub fast: bool,

    /// Watchdog check interval in milliseconds
    #[arg(long)]
    pub check_interval_ms: Option<u64>,

    /// Idle checks before the watchdog declares a stall
    #[arg(long)]
    pub stall_checks: Option<u32>,

    /// Mover transfer buffer size in bytes
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Prometheus metrics port on 127.0.0.1 (0 = disabled)
    #[arg(long, default_value = "0", env = "SOCKWRAP_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `plan` command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Command template, stages separated by '|'
    #[arg(short, long)]
    pub command: String,

    /// Loopback port feeding the first command (0 = stdin)
    #[arg(short, long)]
    pub input_port: Option<u16>,

    /// Loopback port receiving the last command's output (0 = stdout)
    #[arg(short, long)]
    pub output_port: Option<u16>,

    /// Runtime settings file (TOML or JSON)
    #[arg(long, env = "SOCKWRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the settings file to validate
    #[arg(short, long, default_value = "sockwrap.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

impl RunArgs {
    /// Input and output ports, with 0 meaning no socket
    pub fn ports(&self) -> (Option<u16>, Option<u16>) {
        (given(self.input_port), given(self.output_port))
    }
}

impl PlanArgs {
    /// Input and output ports, with 0 meaning no socket
    pub fn ports(&self) -> (Option<u16>, Option<u16>) {
        (given(self.input_port), given(self.output_port))
    }
}

fn given(port: Option<u16>) -> Option<u16> {
    port.filter(|&port| port != 0)
}

impl Cli {
    /// Default log level picked by -v / -q
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
