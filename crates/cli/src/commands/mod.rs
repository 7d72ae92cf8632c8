//! Command implementations.

mod plan;
mod run;
mod settings;
mod validate;

pub use plan::run_plan;
pub use run::run_pipeline;
pub use validate::run_validate;
