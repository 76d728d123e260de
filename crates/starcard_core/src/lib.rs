//! Starcard core: pure run state machine and retry policy arithmetic.
//!
//! Nothing in here performs IO. The engine drives these types from its
//! coordinator and search poller.
mod effect;
mod msg;
mod retry;
mod state;
mod update;

pub use effect::Effect;
pub use msg::Msg;
pub use retry::RetryPolicy;
pub use state::{Phase, RunState};
pub use update::update;
