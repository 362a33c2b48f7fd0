//! Reduction coordination
//!
//! The guest supplies the combiner function and the data pointers; the
//! runtime never dereferences either. Its whole job is choosing a strategy
//! code for the guest and coordinating mutual exclusion for the
//! critical-block path.

use crate::context::TaskContext;
use crate::error::{Result, RuntimeError};
use crate::level::{Level, ReduceKind};
use tracing::debug;

/// Begin a reduction section for the calling team member.
///
/// Returns the strategy code the guest dispatches on: `1` for paths where
/// the caller runs the combiner itself (critical-block, empty, multi-host
/// sum), `2` when the guest should use its atomic path. The critical-block
/// path holds the level's reduction lock when this returns.
pub(crate) fn start_reduction(ctx: &TaskContext) -> Result<i32> {
    begin_with_method(&ctx.level, ctx.level.reduction_method(), ctx.thread_num)
}

fn begin_with_method(level: &Level, method: ReduceKind, thread_num: i32) -> Result<i32> {
    match method {
        ReduceKind::CriticalBlock => {
            debug!(thread_num, "acquiring reduction lock");
            level.lock_reduce();
            Ok(1)
        }
        ReduceKind::EmptyBlock => Ok(1),
        ReduceKind::MultiHostSum => Ok(1),
        ReduceKind::AtomicBlock => Ok(2),
        ReduceKind::NotDefined => Err(RuntimeError::UnsupportedReduction),
    }
}

/// Finish a reduction section.
///
/// Only the critical-block path holds the reduction lock, and only teams
/// larger than one ever take it; releasing a lock nobody holds is guarded
/// against explicitly.
pub(crate) fn end_reduction(ctx: &TaskContext) {
    let level = &ctx.level;
    if level.reduction_method() == ReduceKind::CriticalBlock && level.num_threads > 1 {
        debug!(thread_num = ctx.thread_num, "releasing reduction lock");
        level.unlock_reduce();
    }
}
