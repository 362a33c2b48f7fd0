//! Boundary objects and external-collaborator interfaces for the faasmp worker
//!
//! This crate holds everything the OpenMP runtime shares with the rest of a
//! deployment but does not own:
//!
//! - **FunctionCall**: the message describing one function invocation
//! - **Scheduler**: placement and result transport (interface only)
//! - **StateService**: the cross-host key-value channel, with an in-memory
//!   implementation for single-process use and tests
//! - **SystemConfig**: environment-driven worker configuration
//!
//! The runtime crate consumes these through trait objects so a deployment can
//! plug in its real scheduler and state backend.

pub mod config;
pub mod error;
pub mod message;
pub mod scheduler;
pub mod state;

// Re-export public API
pub use config::{host_parallelism, SystemConfig};
pub use error::{FabricError, Result};
pub use message::FunctionCall;
pub use scheduler::Scheduler;
pub use state::{InMemoryStateService, StateService};
