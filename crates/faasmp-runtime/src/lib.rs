//! OpenMP runtime shim for a WebAssembly function-as-a-service worker
//!
//! This crate implements the host side of the `omp_*` / `__kmpc_*` surface
//! that LLVM-compiled guests import. A parallel region either runs on a
//! worker pool inside this process or fans out across hosts, with team
//! members seeded from a snapshot of the parent's linear memory:
//!
//! ```text
//!                 guest: #pragma omp parallel
//!                          │ __kmpc_fork_call
//!                          ▼
//!                 ┌─────────────────────┐
//!                 │   IntrinsicSurface   │
//!                 └──────────┬──────────┘
//!                 device >= 0│ device < 0
//!            ┌───────────────┴───────────────┐
//!            ▼                               ▼
//!    ┌───────────────┐              ┌─────────────────┐
//!    │   TeamPool    │              │ snapshot + fan- │
//!    │ (host threads)│              │ out (Scheduler) │
//!    └───────────────┘              └─────────────────┘
//! ```
//!
//! The wasm engine, module loading, and the production scheduler and state
//! backends live outside this crate; embedders supply a [`GuestMemory`],
//! register microtasks on an [`OmpModule`], and wire [`surface`] into their
//! linker.
//!
//! # Usage
//!
//! ```rust
//! use faasmp_fabric::{FunctionCall, InMemoryStateService, SystemConfig};
//! use faasmp_runtime::{intrinsics, GuestMemory, OmpModule, SharedLinearMemory};
//! use std::sync::Arc;
//!
//! # struct NoScheduler;
//! # impl faasmp_fabric::Scheduler for NoScheduler {
//! #     fn call_function(&self, c: FunctionCall) -> faasmp_fabric::Result<()> {
//! #         Err(faasmp_fabric::FabricError::Scheduler(c.to_string()))
//! #     }
//! #     fn get_function_result(&self, id: u64, timeout_ms: u64) -> faasmp_fabric::Result<FunctionCall> {
//! #         Err(faasmp_fabric::FabricError::ResultTimeout { id, timeout_ms })
//! #     }
//! # }
//! # fn main() -> faasmp_runtime::Result<()> {
//! let mut config = SystemConfig::default();
//! config.default_team_size = 4;
//!
//! let module = OmpModule::new(
//!     Arc::new(SharedLinearMemory::new(1024)),
//!     Arc::new(NoScheduler),
//!     Arc::new(InMemoryStateService::new()),
//!     config,
//! );
//!
//! // Each team member records its thread number into guest memory.
//! let microtask = module.register_microtask(|tid, _args| {
//!     let ctx = faasmp_runtime::context::current().unwrap();
//!     ctx.module.memory().write_i32(tid as u32 * 4, tid).unwrap();
//!     0
//! });
//!
//! let _scope = module.main_scope(FunctionCall::chained("demo", "tids"));
//! intrinsics::kmpc_fork_call(0, 0, microtask, 0)?;
//!
//! assert_eq!(module.memory().read_i32(4)?, 1);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod fork;
pub mod intrinsics;
pub mod level;
pub mod loops;
pub mod memory;
pub mod module;
pub mod pool;
pub mod reduction;
pub mod surface;
pub mod sync;

// Re-export public API
pub use context::{TaskContext, TaskScope};
pub use error::{Result, RuntimeError};
pub use fork::execute_chained_call;
pub use level::{Level, ReduceKind};
pub use loops::{plan_static_i32, plan_static_i64, ScheduleKind, StaticSpan};
pub use memory::{GuestMemory, SharedLinearMemory};
pub use module::{Microtask, OmpModule};
pub use pool::{TaskFuture, TeamPool};
pub use surface::{HostFunction, HostValue, IntrinsicSurface};
