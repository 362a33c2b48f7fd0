//! Guest-facing OpenMP intrinsics
//!
//! One typed host function per runtime symbol the LLVM OpenMP lowering
//! emits. Rust identifiers cannot start with `__`, so the `__kmpc_*` and
//! `__faasmp_*` symbols drop their underscores here; the registry in
//! [`crate::surface`] maps the exact import names back onto these functions.
//!
//! Every entry point traces its raw arguments at `debug`. A returned error
//! is a host trap; guest-recoverable mistakes are logged at `warn` and
//! ignored or clamped instead.

use crate::context;
use crate::error::Result;
use crate::fork;
use crate::loops::{plan_static_i32, plan_static_i64, ScheduleKind};
use crate::reduction;
use faasmp_tracing::abi_trace;
use std::sync::atomic;
use tracing::{debug, warn};

/// Team-local number of the calling thread.
pub fn omp_get_thread_num() -> Result<i32> {
    abi_trace!("omp_get_thread_num");
    Ok(context::current()?.thread_num)
}

/// Size of the team executing the current parallel region.
pub fn omp_get_num_threads() -> Result<i32> {
    abi_trace!("omp_get_num_threads");
    Ok(context::current()?.level.num_threads)
}

/// Team size the next fork from this level would produce.
pub fn omp_get_max_threads() -> Result<i32> {
    abi_trace!("omp_get_max_threads");
    let ctx = context::current()?;
    Ok(ctx.level.next_team_size(ctx.module.config().default_team_size))
}

/// Nesting depth of the current region.
pub fn omp_get_level() -> Result<i32> {
    abi_trace!("omp_get_level");
    Ok(context::current()?.level.depth)
}

pub fn omp_get_max_active_levels() -> Result<i32> {
    abi_trace!("omp_get_max_active_levels");
    Ok(context::current()?.level.max_active_levels())
}

pub fn omp_set_max_active_levels(levels: i32) -> Result<()> {
    abi_trace!("omp_set_max_active_levels", levels = levels);
    let ctx = context::current()?;
    if levels < 0 {
        warn!(levels, "ignoring negative max active levels");
        return Ok(());
    }
    ctx.level.set_max_active_levels(levels);
    Ok(())
}

pub fn omp_set_num_threads(num_threads: i32) -> Result<()> {
    abi_trace!("omp_set_num_threads", num_threads = num_threads);
    let ctx = context::current()?;
    if num_threads <= 0 {
        warn!(num_threads, "ignoring non-positive team size request");
        return Ok(());
    }
    ctx.level.set_wanted_num_threads(num_threads);
    Ok(())
}

/// Reports the device selector rather than a device count; the runtime
/// knows exactly two targets, local and distributed.
pub fn omp_get_num_devices() -> Result<i32> {
    abi_trace!("omp_get_num_devices");
    Ok(context::current()?.level.user_default_device())
}

/// Switch the current level between local (>= 0) and distributed (< 0)
/// execution for subsequent forks.
pub fn omp_set_default_device(device: i32) -> Result<()> {
    abi_trace!("omp_set_default_device", device = device);
    let ctx = context::current()?;
    if device.abs() > 1 {
        warn!(device, "device index exceeds the available devices, ignoring");
        return Ok(());
    }
    ctx.level.set_user_default_device(device);
    Ok(())
}

/// Block until every team member has arrived.
///
/// No-op for teams of one and for levels without a barrier (remote team
/// members cannot meet on a host-local barrier).
pub fn kmpc_barrier(loc: i32, gtid: i32) -> Result<()> {
    abi_trace!("__kmpc_barrier", loc = loc, gtid = gtid);
    let ctx = context::current()?;
    if ctx.level.num_threads <= 1 {
        return Ok(());
    }
    ctx.level.wait_barrier();
    Ok(())
}

/// Enter a `critical` construct.
///
/// The `crit` identifier is deliberately ignored: the level holds a single
/// team-wide lock, which over-approximates per-name exclusion correctly.
pub fn kmpc_critical(loc: i32, gtid: i32, crit: i32) -> Result<()> {
    abi_trace!("__kmpc_critical", loc = loc, gtid = gtid, crit = crit);
    let ctx = context::current()?;
    if ctx.level.num_threads > 1 {
        ctx.level.enter_critical();
    }
    Ok(())
}

/// Leave a `critical` construct.
pub fn kmpc_end_critical(loc: i32, gtid: i32, crit: i32) -> Result<()> {
    abi_trace!("__kmpc_end_critical", loc = loc, gtid = gtid, crit = crit);
    let ctx = context::current()?;
    if ctx.level.num_threads > 1 {
        ctx.level.exit_critical();
    }
    Ok(())
}

/// Full memory fence.
pub fn kmpc_flush(loc: i32) -> Result<()> {
    abi_trace!("__kmpc_flush", loc = loc);
    atomic::fence(atomic::Ordering::SeqCst);
    Ok(())
}

/// Whether the calling thread should run the `master` block.
pub fn kmpc_master(loc: i32, gtid: i32) -> Result<i32> {
    abi_trace!("__kmpc_master", loc = loc, gtid = gtid);
    Ok((context::current()?.thread_num == 0) as i32)
}

/// Close a `master` block; only thread zero may get here.
pub fn kmpc_end_master(loc: i32, gtid: i32) -> Result<()> {
    abi_trace!("__kmpc_end_master", loc = loc, gtid = gtid);
    let ctx = context::current()?;
    if ctx.thread_num != 0 {
        return Err(crate::error::RuntimeError::NotMasterThread(ctx.thread_num));
    }
    Ok(())
}

/// Whether the calling thread should run the `single` block. No implicit
/// barrier on either side; the compiler inserts one when it needs it.
pub fn kmpc_single(loc: i32, gtid: i32) -> Result<i32> {
    abi_trace!("__kmpc_single", loc = loc, gtid = gtid);
    Ok((context::current()?.thread_num == 0) as i32)
}

/// Close a `single` block; only thread zero may get here.
pub fn kmpc_end_single(loc: i32, gtid: i32) -> Result<()> {
    abi_trace!("__kmpc_end_single", loc = loc, gtid = gtid);
    let ctx = context::current()?;
    if ctx.thread_num != 0 {
        return Err(crate::error::RuntimeError::NotMasterThread(ctx.thread_num));
    }
    Ok(())
}

/// One-shot team-size request for the next fork.
pub fn kmpc_push_num_threads(loc: i32, gtid: i32, num_threads: i32) -> Result<()> {
    abi_trace!(
        "__kmpc_push_num_threads",
        loc = loc,
        gtid = gtid,
        num_threads = num_threads
    );
    let ctx = context::current()?;
    if num_threads <= 0 {
        warn!(num_threads, "ignoring non-positive pushed team size");
        return Ok(());
    }
    ctx.level.set_pushed_num_threads(num_threads);
    Ok(())
}

/// Known limitation: returns the team-local id, which is not unique across
/// sibling teams in nested regions.
pub fn kmpc_global_thread_num(loc: i32) -> Result<i32> {
    abi_trace!("__kmpc_global_thread_num", loc = loc);
    Ok(context::current()?.thread_num)
}

/// Fork a parallel region; see the dispatcher for the local/distributed
/// split.
pub fn kmpc_fork_call(loc: i32, argc: i32, microtask: i32, args_ptr: i32) -> Result<()> {
    abi_trace!(
        "__kmpc_fork_call",
        loc = loc,
        argc = argc,
        microtask = microtask,
        args_ptr = args_ptr
    );
    fork::fork_call(argc, microtask, args_ptr)
}

/// Static work-sharing init for 32-bit induction variables.
///
/// Reads the loop descriptor out of guest memory, plans this thread's
/// slice, and writes the bounds, stride, and last-iteration flag back.
#[allow(clippy::too_many_arguments)]
pub fn kmpc_for_static_init_4(
    loc: i32,
    gtid: i32,
    schedule: i32,
    last_iter_ptr: i32,
    lower_ptr: i32,
    upper_ptr: i32,
    stride_ptr: i32,
    incr: i32,
    chunk: i32,
) -> Result<()> {
    abi_trace!(
        "__kmpc_for_static_init_4",
        loc = loc,
        gtid = gtid,
        schedule = schedule,
        last_iter_ptr = last_iter_ptr,
        lower_ptr = lower_ptr,
        upper_ptr = upper_ptr,
        stride_ptr = stride_ptr,
        incr = incr,
        chunk = chunk
    );
    let ctx = context::current()?;
    let kind = ScheduleKind::try_from(schedule)?;
    let memory = ctx.module.memory();

    let lower = memory.read_i32(lower_ptr as u32)?;
    let upper = memory.read_i32(upper_ptr as u32)?;

    let span = plan_static_i32(
        ctx.level.num_threads,
        ctx.thread_num,
        kind,
        lower,
        upper,
        incr,
        chunk,
    );

    memory.write_i32(lower_ptr as u32, span.lower)?;
    memory.write_i32(upper_ptr as u32, span.upper)?;
    memory.write_i32(stride_ptr as u32, span.stride)?;
    memory.write_i32(last_iter_ptr as u32, span.last_iter as i32)?;
    Ok(())
}

/// Static work-sharing init for 64-bit induction variables.
#[allow(clippy::too_many_arguments)]
pub fn kmpc_for_static_init_8(
    loc: i32,
    gtid: i32,
    schedule: i32,
    last_iter_ptr: i32,
    lower_ptr: i32,
    upper_ptr: i32,
    stride_ptr: i32,
    incr: i64,
    chunk: i64,
) -> Result<()> {
    abi_trace!(
        "__kmpc_for_static_init_8",
        loc = loc,
        gtid = gtid,
        schedule = schedule,
        last_iter_ptr = last_iter_ptr,
        lower_ptr = lower_ptr,
        upper_ptr = upper_ptr,
        stride_ptr = stride_ptr,
        incr = incr,
        chunk = chunk
    );
    let ctx = context::current()?;
    let kind = ScheduleKind::try_from(schedule)?;
    let memory = ctx.module.memory();

    let lower = memory.read_i64(lower_ptr as u32)?;
    let upper = memory.read_i64(upper_ptr as u32)?;

    let span = plan_static_i64(
        ctx.level.num_threads,
        ctx.thread_num,
        kind,
        lower,
        upper,
        incr,
        chunk,
    );

    memory.write_i64(lower_ptr as u32, span.lower)?;
    memory.write_i64(upper_ptr as u32, span.upper)?;
    memory.write_i64(stride_ptr as u32, span.stride)?;
    memory.write_i32(last_iter_ptr as u32, span.last_iter as i32)?;
    Ok(())
}

/// Bookkeeping happens at init time; nothing to do here.
pub fn kmpc_for_static_fini(loc: i32, gtid: i32) -> Result<()> {
    abi_trace!("__kmpc_for_static_fini", loc = loc, gtid = gtid);
    Ok(())
}

/// Blocking reduce. The combiner and data pointers stay guest-side; the
/// runtime only picks the strategy and manages the lock.
#[allow(clippy::too_many_arguments)]
pub fn kmpc_reduce(
    loc: i32,
    gtid: i32,
    num_vars: i32,
    reduce_size: i32,
    reduce_data: i32,
    reduce_func: i32,
    lck: i32,
) -> Result<i32> {
    abi_trace!(
        "__kmpc_reduce",
        loc = loc,
        gtid = gtid,
        num_vars = num_vars,
        reduce_size = reduce_size,
        reduce_data = reduce_data,
        reduce_func = reduce_func,
        lck = lck
    );
    reduction::start_reduction(&context::current()?)
}

/// Reduce without the trailing barrier.
#[allow(clippy::too_many_arguments)]
pub fn kmpc_reduce_nowait(
    loc: i32,
    gtid: i32,
    num_vars: i32,
    reduce_size: i32,
    reduce_data: i32,
    reduce_func: i32,
    lck: i32,
) -> Result<i32> {
    abi_trace!(
        "__kmpc_reduce_nowait",
        loc = loc,
        gtid = gtid,
        num_vars = num_vars,
        reduce_size = reduce_size,
        reduce_data = reduce_data,
        reduce_func = reduce_func,
        lck = lck
    );
    reduction::start_reduction(&context::current()?)
}

pub fn kmpc_end_reduce(loc: i32, gtid: i32, lck: i32) -> Result<()> {
    abi_trace!("__kmpc_end_reduce", loc = loc, gtid = gtid, lck = lck);
    reduction::end_reduction(&context::current()?);
    Ok(())
}

pub fn kmpc_end_reduce_nowait(loc: i32, gtid: i32, lck: i32) -> Result<()> {
    abi_trace!("__kmpc_end_reduce_nowait", loc = loc, gtid = gtid, lck = lck);
    reduction::end_reduction(&context::current()?);
    Ok(())
}

/// Atomic add against the state service, keyed by a NUL-terminated string
/// in guest memory. This is the distributed teams' shared-variable channel.
pub fn faasmp_incrby(key_ptr: i32, value: i64) -> Result<i64> {
    abi_trace!("__faasmp_incrby", key_ptr = key_ptr, value = value);
    let ctx = context::current()?;
    let key = ctx.module.memory().read_c_string(key_ptr as u32)?;
    Ok(ctx.module.state().incr_by_long(&key, value)?)
}

/// Read a shared long from the state service.
pub fn faasmp_get_long(key_ptr: i32) -> Result<i64> {
    abi_trace!("__faasmp_getLong", key_ptr = key_ptr);
    let ctx = context::current()?;
    let key = ctx.module.memory().read_c_string(key_ptr as u32)?;
    Ok(ctx.module.state().get_long(&key)?)
}

/// Copy one i32 between guest addresses, logging the value.
pub fn faasmp_debug_copy(src: i32, dest: i32) -> Result<()> {
    abi_trace!("__faasmp_debug_copy", src = src, dest = dest);
    let ctx = context::current()?;
    let memory = ctx.module.memory();
    let value = memory.read_i32(src as u32)?;
    debug!(thread_num = ctx.thread_num, value, "debug copy");
    memory.write_i32(dest as u32, value)?;
    Ok(())
}
