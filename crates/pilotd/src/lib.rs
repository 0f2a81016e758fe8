//! issue-pilot daemon crate.

pub mod comments;
pub mod context;
pub mod daemon_loop;
pub mod error;
pub mod executor;
pub mod persistence;
pub mod plan_phase;
pub mod poller;
pub mod retry;
pub mod router;
pub mod service;
pub mod state_machine;

#[cfg(test)]
mod test_support;

pub use context::*;
pub use daemon_loop::*;
pub use error::*;
pub use executor::*;
pub use persistence::*;
pub use plan_phase::*;
pub use poller::*;
pub use retry::*;
pub use router::*;
pub use service::*;
pub use state_machine::*;
