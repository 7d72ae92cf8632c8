//! # Mover
//!
//! Data movers copy bytes between two endpoints in their own task:
//! - input socket -> pipe feeding the first command
//! - named pipe -> downstream of the first command
//! - pipe from the last command -> output socket
//!
//! Each mover publishes its progress through a `Liveness` counter and
//! reports exactly one completion event.

mod handle;
mod liveness;

pub use handle::{MoverHandle, MoverReport};
pub use liveness::{Liveness, LivenessSnapshot};
