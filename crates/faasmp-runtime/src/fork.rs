//! Fork dispatcher
//!
//! `__kmpc_fork_call` lands here. The dispatcher computes the next team
//! size, then either runs the team on this host's pool or snapshots guest
//! memory and fans the members out through the scheduler. The choice is
//! made per fork from the current level's device selector.

use crate::context::{self, TaskContext, TaskScope};
use crate::error::{Result, RuntimeError};
use crate::level::Level;
use crate::module::Microtask;
use faasmp_fabric::{FabricError, FunctionCall};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Execution backend for one fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForkStrategy {
    /// Run the team on this host's worker pool
    Local,
    /// Snapshot memory and fan out through the scheduler
    Distributed,
}

impl ForkStrategy {
    fn select(level: &Level) -> Self {
        if level.user_default_device() < 0 {
            Self::Distributed
        } else {
            Self::Local
        }
    }
}

/// Dispatch one parallel region.
///
/// Resolves the microtask, computes the team size by the request-precedence
/// rule (consuming any one-shot pushed request), reads the shared-variable
/// pointer array out of guest memory, and hands off to the selected backend.
pub(crate) fn fork_call(argc: i32, microtask_index: i32, args_ptr: i32) -> Result<()> {
    let ctx = context::current()?;
    let module = ctx.module.clone();

    let microtask = module.resolve_microtask(microtask_index)?;

    let team_size = ctx.level.next_team_size(module.config().default_team_size);
    ctx.level.clear_pushed_num_threads();

    let args = if argc > 0 {
        module.memory().read_u32_vec(args_ptr as u32, argc as usize)?
    } else {
        Vec::new()
    };

    match ForkStrategy::select(&ctx.level) {
        ForkStrategy::Local => local_fork(&ctx, team_size, microtask, &args),
        ForkStrategy::Distributed => distributed_fork(&ctx, team_size, microtask_index, &args),
    }
}

/// Run one team member: install its context, then run the microtask.
fn run_member(ctx: TaskContext, microtask: &Microtask, args: Vec<u32>) -> i64 {
    let thread_num = ctx.thread_num;
    let _scope = TaskScope::enter(ctx);
    microtask(thread_num, &args)
}

/// Single-host fork: one pool task per team member.
fn local_fork(ctx: &TaskContext, team_size: i32, microtask: Microtask, args: &[u32]) -> Result<()> {
    let module = &ctx.module;
    let level = Arc::new(Level::team(&ctx.level, team_size));

    // A serialized region runs inline: it has one member, and parking it on
    // the pool could deadlock a fully occupied pool against itself.
    if team_size <= 1 {
        let member = TaskContext {
            thread_num: 0,
            level,
            module: module.clone(),
            call: ctx.call.clone(),
        };
        let microtask = microtask.clone();
        let member_args = args.to_vec();
        let code = panic::catch_unwind(AssertUnwindSafe(move || {
            run_member(member, &microtask, member_args)
        }))
        .unwrap_or(1);
        if code != 0 {
            return Err(RuntimeError::TeamExecutionFailed(1));
        }
        return Ok(());
    }

    let mut futures = Vec::with_capacity(team_size as usize);
    for thread_num in 0..team_size {
        let member = TaskContext {
            thread_num,
            level: level.clone(),
            module: module.clone(),
            call: ctx.call.clone(),
        };
        let microtask = microtask.clone();
        let member_args = args.to_vec();
        futures.push(
            module
                .team_pool()
                .submit(move || run_member(member, &microtask, member_args)),
        );
    }

    let mut failed = 0usize;
    for future in futures {
        if future.wait() != 0 {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(RuntimeError::TeamExecutionFailed(failed));
    }
    Ok(())
}

/// Cross-host fork: snapshot, fan out, join.
fn distributed_fork(
    ctx: &TaskContext,
    team_size: i32,
    microtask_index: i32,
    args: &[u32],
) -> Result<()> {
    let module = &ctx.module;

    let snapshot_key = module.next_snapshot_key(ctx.call.id);
    let snapshot_size = module.snapshot_to_state(&snapshot_key)?;

    let parent = ctx.call.describe();

    // Dispatch phase: a child that the scheduler refuses is recorded as an
    // immediate failure so the join still consumes exactly one slot per
    // member.
    let mut children: Vec<Option<u64>> = Vec::with_capacity(team_size as usize);
    for thread_num in 0..team_size {
        let mut call = FunctionCall::chained(&ctx.call.user, &ctx.call.function);
        call.is_async = true;
        call.omp_function_args = args.iter().rev().copied().collect();
        call.snapshot_key = snapshot_key.clone();
        call.snapshot_size = snapshot_size;
        call.func_ptr = microtask_index;
        call.omp_thread_num = thread_num;
        call.omp_num_threads = team_size;
        ctx.level.snapshot_parent(&mut call);

        let child_id = call.id;
        let child = call.describe();
        match module.scheduler().call_function(call) {
            Ok(()) => {
                debug!(
                    %parent,
                    %child,
                    host = %module.config().endpoint_host,
                    thread_num,
                    microtask_index,
                    "forked remote team member"
                );
                children.push(Some(child_id));
            }
            Err(err) => {
                error!(%err, thread_num, "failed to dispatch remote team member");
                children.push(None);
            }
        }
    }

    let timeout_ms = module.config().chained_call_timeout_ms;
    let mut failed = 0usize;
    for (thread_num, child) in children.into_iter().enumerate() {
        let Some(call_id) = child else {
            failed += 1;
            continue;
        };
        info!(thread_num, call_id, timeout_ms, "waiting for remote team member");
        match module.scheduler().get_function_result(call_id, timeout_ms) {
            Ok(result) if result.return_value == 0 => {}
            Ok(result) => {
                warn!(call_id, code = result.return_value, "remote team member exited nonzero");
                failed += 1;
            }
            Err(FabricError::ResultTimeout { .. }) => {
                error!(call_id, "timed out waiting for remote team member");
                failed += 1;
            }
            Err(err) => {
                error!(call_id, %err, "error waiting for remote team member");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(RuntimeError::TeamExecutionFailed(failed));
    }
    debug!("distributed fork finished");
    Ok(())
}

/// Execute a chained OpenMP call on the receiving worker.
///
/// This is the remote half of [`distributed_fork`]: restore the parent's
/// memory snapshot, rebuild the team level from the message fields, undo the
/// wire ordering of the argument pointers, and run the microtask under a
/// fresh task scope. Returns the member's exit code.
pub fn execute_chained_call(
    module: &Arc<crate::module::OmpModule>,
    call: &FunctionCall,
) -> Result<i64> {
    module.restore_from_state(&call.snapshot_key, call.snapshot_size)?;

    let microtask = module.resolve_microtask(call.func_ptr)?;
    let level = Arc::new(Level::remote(call));
    let args: Vec<u32> = call.omp_function_args.iter().rev().copied().collect();

    let member = TaskContext {
        thread_num: call.omp_thread_num,
        level,
        module: module.clone(),
        call: Arc::new(call.clone()),
    };

    let code = panic::catch_unwind(AssertUnwindSafe(move || {
        run_member(member, &microtask, args)
    }))
    .unwrap_or(1);
    Ok(code)
}
