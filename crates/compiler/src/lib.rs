//! # Compiler
//!
//! Turns a command template into a running-ready pipeline in two steps:
//! - `compile_plan`: pure, produces a serializable `PipelinePlan`
//! - `materialize`: allocates sockets, pipes and the FIFO for a plan

mod build;
mod error;
mod planner;
pub mod template;

pub use build::{materialize, materialize_in, CompiledPipeline, MoverStage, ProcessStage, Stage};
pub use error::CompileError;
pub use planner::{compile_plan, PlanRequest};

/// Plan and materialize in one go
pub async fn compile(request: &PlanRequest<'_>) -> Result<CompiledPipeline, CompileError> {
    let plan = compile_plan(request)?;
    materialize(plan, request.marker).await
}
