//! Per-thread task context
//!
//! Every intrinsic reads the state of the calling team member from a
//! thread-affine slot: the member's thread number, the level it belongs to,
//! and handles back to the owning module and invocation. The slot is
//! installed once per microtask invocation by the worker entry path and
//! restored on scope exit, so nested regions executed inline on the same
//! host thread see the right level at each depth.

use crate::error::{Result, RuntimeError};
use crate::level::Level;
use crate::module::OmpModule;
use faasmp_fabric::FunctionCall;
use std::cell::RefCell;
use std::sync::Arc;

/// State every intrinsic call anchors on.
#[derive(Clone)]
pub struct TaskContext {
    /// Team-local thread number, in `[0, level.num_threads)`
    pub thread_num: i32,

    /// The level this member executes in
    pub level: Arc<Level>,

    /// Owning module: guest memory, function table, pool, fabric handles
    pub module: Arc<OmpModule>,

    /// The invocation this member descends from
    pub call: Arc<FunctionCall>,
}

thread_local! {
    static CURRENT: RefCell<Option<TaskContext>> = RefCell::new(None);
}

/// Scope guard installing a task context on the current thread.
///
/// Dropping the guard restores whatever context was installed before, which
/// is what lets a serialized nested region run inline on its caller.
pub struct TaskScope {
    previous: Option<TaskContext>,
}

impl TaskScope {
    /// Install `context` as the current thread's task context.
    pub fn enter(context: TaskContext) -> Self {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
        Self { previous }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| {
            *slot.borrow_mut() = previous;
        });
    }
}

/// The calling thread's task context.
///
/// Fails when no scope is installed, which means an intrinsic was invoked
/// outside any guest execution; that is a runtime invariant violation and
/// traps.
pub fn current() -> Result<TaskContext> {
    CURRENT
        .with(|slot| slot.borrow().clone())
        .ok_or(RuntimeError::NoTaskContext)
}

/// Whether the calling thread currently has a task context.
pub fn is_installed() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}
