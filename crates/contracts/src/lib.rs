//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Stage Model
//! - Stage 0 is the pipeline source; its clean exit is the normal end of a run
//! - Links connect exactly one writer stage to exactly one reader stage,
//!   except boundary links (sockets, standard streams) which have one user

mod error;
mod outcome;
mod plan;
mod settings;

pub use error::*;
pub use outcome::*;
pub use plan::*;
pub use settings::*;
