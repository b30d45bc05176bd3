//! SDK Metrics Controllers
mod pull;
mod push;

pub use pull::{pull, PullController, PullControllerBuilder};
pub use push::{push, PushController, PushControllerBuilder, PushControllerWorker};
