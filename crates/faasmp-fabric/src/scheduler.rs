//! Scheduler interface
//!
//! The scheduler owns placement and result routing for function calls. The
//! OpenMP runtime only consumes this narrow surface; the real implementation
//! lives outside this workspace.

use crate::error::Result;
use crate::message::FunctionCall;

/// Placement and result transport for function invocations.
///
/// `call_function` is fire-and-forget: the call is queued for some worker and
/// the method returns once the scheduler has accepted it. Results are picked
/// up separately by id.
pub trait Scheduler: Send + Sync {
    /// Hand a call to the scheduler for execution on some host.
    fn call_function(&self, call: FunctionCall) -> Result<()>;

    /// Block until the result of `id` is available, or fail with
    /// [`FabricError::ResultTimeout`](crate::FabricError::ResultTimeout)
    /// after `timeout_ms`.
    fn get_function_result(&self, id: u64, timeout_ms: u64) -> Result<FunctionCall>;
}
