//! `plan` command implementation.

use std::fmt::Write;

use compiler::{compile_plan, PlanRequest};
use contracts::{ExitStatus, LinkKind, MoverRole, PipelinePlan, StageBody, StandardStream};
use tracing::info;

use super::settings;
use crate::cli::PlanArgs;
use crate::error::Result;

/// Execute the `plan` command
///
/// Compiles the template only; no socket, pipe or process is created.
pub fn run_plan(args: &PlanArgs) -> Result<ExitStatus> {
    let settings = settings::load(args.config.as_deref())?;
    let (input_port, output_port) = args.ports();
    let request = PlanRequest::new(&args.command, &settings).with_ports(input_port, output_port);
    let plan = compile_plan(&request)?;
    info!(stages = plan.stages.len(), links = plan.links.len(), "Template compiled");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render(&plan));
    }
    Ok(ExitStatus::Success)
}

/// Human-readable stage list
fn render(plan: &PipelinePlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Pipeline: {} stages ({} processes, {} movers)",
        plan.stages.len(),
        plan.process_count(),
        plan.mover_count()
    );

    for stage in &plan.stages {
        let what = match &stage.body {
            StageBody::Process { command, .. } => format!("process  {command}"),
            StageBody::Mover { role } => format!("mover    {}", describe_role(*role)),
        };
        let _ = writeln!(
            out,
            "  [{}] {what}\n      {} -> {}",
            stage.index,
            describe_link(plan, stage.input),
            describe_link(plan, stage.output)
        );
        if let StageBody::Process {
            named_pipe: Some(link),
            ..
        } = &stage.body
        {
            let _ = writeln!(out, "      writes {}", describe_link(plan, *link));
        }
    }
    out
}

fn describe_role(role: MoverRole) -> &'static str {
    match role {
        MoverRole::InputSocket => "input socket",
        MoverRole::NamedPipe => "named pipe",
        MoverRole::OutputSocket => "output socket",
    }
}

fn describe_link(plan: &PipelinePlan, link: usize) -> String {
    match plan.links.get(link) {
        Some(LinkKind::Socket { port }) => format!("socket 127.0.0.1:{port}"),
        Some(LinkKind::Pipe) => format!("pipe #{link}"),
        Some(LinkKind::NamedPipe) => format!("named pipe #{link}"),
        Some(LinkKind::Standard { stream }) => match stream {
            StandardStream::Input => "stdin".to_string(),
            StandardStream::Output => "stdout".to_string(),
            StandardStream::Error => "stderr".to_string(),
        },
        None => format!("missing link #{link}"),
    }
}
