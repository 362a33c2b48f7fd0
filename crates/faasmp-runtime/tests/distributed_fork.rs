//! Integration tests for distributed forks
//!
//! The scripted scheduler checks the wire protocol without running anything;
//! the loopback scheduler executes children against a second module instance
//! so snapshot restore and the state-service channel are exercised for real.

mod support;

use faasmp_fabric::{FunctionCall, InMemoryStateService, Scheduler, StateService, SystemConfig};
use faasmp_runtime::{
    execute_chained_call, intrinsics, GuestMemory, OmpModule, RuntimeError, SharedLinearMemory,
};
use std::sync::Arc;
use support::{LoopbackScheduler, ScriptedScheduler};

fn distributed_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.default_device = -1;
    config.default_team_size = 2;
    config
}

#[test]
fn child_messages_carry_snapshot_and_lineage() {
    let scheduler = ScriptedScheduler::new([0, 0, 0]);
    let state = Arc::new(InMemoryStateService::new());
    let module = OmpModule::new(
        Arc::new(SharedLinearMemory::new(64)),
        scheduler.clone(),
        state.clone(),
        distributed_config(),
    );

    // guest argument array: two pointers at offset 0
    module.memory().write_u32(0, 11).unwrap();
    module.memory().write_u32(4, 22).unwrap();

    let microtask = module.register_microtask(|_, _| 0);

    let _scope = module.main_scope(FunctionCall::chained("demo", "wire"));
    intrinsics::omp_set_num_threads(3).unwrap();
    intrinsics::kmpc_fork_call(0, 2, microtask, 0).unwrap();

    let dispatched = scheduler.dispatched();
    assert_eq!(dispatched.len(), 3);

    let key = &dispatched[0].snapshot_key;
    assert!(key.starts_with("fork_"), "snapshot key: {key}");
    assert_eq!(state.restore(key, 64).unwrap().len(), 64);

    for (thread_num, call) in dispatched.iter().enumerate() {
        assert_eq!(call.user, "demo");
        assert_eq!(call.function, "wire");
        assert!(call.is_async);
        assert_eq!(call.snapshot_key, *key);
        assert_eq!(call.snapshot_size, 64);
        assert_eq!(call.func_ptr, microtask);
        assert_eq!(call.omp_thread_num, thread_num as i32);
        assert_eq!(call.omp_num_threads, 3);
        // argument pointers travel in reverse order
        assert_eq!(call.omp_function_args, vec![22, 11]);
        assert_eq!(call.omp_depth, 1);
        assert_eq!(call.omp_device, -1);
    }
}

#[test]
fn child_errors_are_tallied_not_propagated_individually() {
    let scheduler = ScriptedScheduler::new([0, 1, 0]);
    let module = OmpModule::new(
        Arc::new(SharedLinearMemory::new(64)),
        scheduler,
        Arc::new(InMemoryStateService::new()),
        distributed_config(),
    );

    let microtask = module.register_microtask(|_, _| 0);

    let _scope = module.main_scope(FunctionCall::chained("demo", "errors"));
    intrinsics::omp_set_num_threads(3).unwrap();
    let err = intrinsics::kmpc_fork_call(0, 0, microtask, 0).unwrap_err();
    assert!(matches!(err, RuntimeError::TeamExecutionFailed(1)));
}

#[test]
fn missing_results_count_as_errors() {
    // results never stored: every wait times out
    struct BlackHole;
    impl Scheduler for BlackHole {
        fn call_function(&self, _call: FunctionCall) -> faasmp_fabric::Result<()> {
            Ok(())
        }
        fn get_function_result(
            &self,
            id: u64,
            timeout_ms: u64,
        ) -> faasmp_fabric::Result<FunctionCall> {
            Err(faasmp_fabric::FabricError::ResultTimeout { id, timeout_ms })
        }
    }

    let module = OmpModule::new(
        Arc::new(SharedLinearMemory::new(64)),
        Arc::new(BlackHole),
        Arc::new(InMemoryStateService::new()),
        distributed_config(),
    );
    let microtask = module.register_microtask(|_, _| 0);

    let _scope = module.main_scope(FunctionCall::chained("demo", "timeouts"));
    let err = intrinsics::kmpc_fork_call(0, 0, microtask, 0).unwrap_err();
    assert!(matches!(err, RuntimeError::TeamExecutionFailed(2)));
}

/// Register the shared microtask on a module. Both parent and worker must
/// register in the same order so table indexes line up, exactly like two
/// hosts loading the same wasm module.
fn register_sum_microtask(module: &Arc<OmpModule>) -> i32 {
    module.register_microtask(|tid, args| {
        let ctx = faasmp_runtime::context::current().unwrap();
        let memory = ctx.module.memory();

        // distributed levels have no barrier; this must not block
        intrinsics::kmpc_barrier(0, tid).unwrap();

        assert_eq!(intrinsics::omp_get_thread_num().unwrap(), tid);
        assert_eq!(intrinsics::omp_get_num_threads().unwrap(), 3);

        // the magic value travelled in the memory snapshot; its pointer in
        // the (restored) argument array
        let magic = memory.read_i32(args[0]).unwrap();
        intrinsics::faasmp_incrby(0, (magic + tid) as i64).unwrap();
        0
    })
}

#[test]
fn snapshot_round_trips_and_state_is_the_only_channel() {
    let state = Arc::new(InMemoryStateService::new());
    let scheduler = LoopbackScheduler::new();

    let worker = OmpModule::new(
        Arc::new(SharedLinearMemory::new(16)),
        scheduler.clone(),
        state.clone(),
        distributed_config(),
    );
    register_sum_microtask(&worker);
    scheduler.attach_worker(worker.clone());

    let parent = OmpModule::new(
        Arc::new(SharedLinearMemory::new(256)),
        scheduler.clone(),
        state.clone(),
        distributed_config(),
    );
    let microtask = register_sum_microtask(&parent);

    // key for the shared counter at 0, magic value at 32, arg array at 64
    parent.memory().write_bytes(0, b"omp:sum\0").unwrap();
    parent.memory().write_i32(32, 777).unwrap();
    parent.memory().write_u32(64, 32).unwrap();

    let _scope = parent.main_scope(FunctionCall::chained("demo", "sum"));
    intrinsics::omp_set_num_threads(3).unwrap();
    intrinsics::kmpc_fork_call(0, 1, microtask, 64).unwrap();

    // every child restored the snapshot (magic + key) and wrote through the
    // state service; the master reads the sum back the same way
    assert_eq!(intrinsics::faasmp_get_long(0).unwrap(), 3 * 777 + 3);

    // the worker's memory was replaced by the parent's snapshot
    assert_eq!(worker.memory().size(), 256);
    assert_eq!(worker.memory().read_i32(32).unwrap(), 777);
}

#[test]
fn chained_call_execution_reconstructs_the_member() {
    let state = Arc::new(InMemoryStateService::new());
    let scheduler = LoopbackScheduler::new();

    let parent = OmpModule::new(
        Arc::new(SharedLinearMemory::new(128)),
        scheduler.clone(),
        state.clone(),
        distributed_config(),
    );
    parent.memory().write_i32(8, 1000).unwrap();
    let size = parent.snapshot_to_state("fork_manual").unwrap();

    let worker = OmpModule::new(
        Arc::new(SharedLinearMemory::new(8)),
        scheduler,
        state,
        distributed_config(),
    );
    let microtask = worker.register_microtask(|tid, args| {
        let ctx = faasmp_runtime::context::current().unwrap();
        assert_eq!(intrinsics::omp_get_level().unwrap(), 1);
        let base = ctx.module.memory().read_i32(args[0]).unwrap();
        (base + tid) as i64
    });

    let mut call = FunctionCall::chained("demo", "manual");
    call.snapshot_key = "fork_manual".to_string();
    call.snapshot_size = size;
    call.func_ptr = microtask;
    call.omp_thread_num = 2;
    call.omp_num_threads = 3;
    call.omp_depth = 1;
    call.omp_device = -1;
    // wire order is reversed; the worker undoes it
    call.omp_function_args = vec![8];

    let code = execute_chained_call(&worker, &call).unwrap();
    assert_eq!(code, 1002);
}
