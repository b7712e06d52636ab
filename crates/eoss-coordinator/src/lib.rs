//! Name Encoder, Object Coordinator, and Crash-Recovery Sweeper: the upload
//! lifecycle core (§4.1, §4.4, §4.5).

mod coordinator;
mod encode;
mod sweep;

pub use coordinator::{Existence, ObjectCoordinator};
pub use encode::{decode, encode};
pub use sweep::run_sweep;
