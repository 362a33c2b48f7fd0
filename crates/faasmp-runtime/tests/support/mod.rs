//! Shared fixtures for the runtime integration tests
#![allow(dead_code)]

use faasmp_fabric::{FabricError, FunctionCall, Scheduler};
use faasmp_runtime::{execute_chained_call, OmpModule};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};

/// Scheduler that executes chained calls against an attached worker module,
/// in process. One worker stands in for "some other host": it restores the
/// snapshot into its own guest memory and shares only the state service with
/// the parent.
pub struct LoopbackScheduler {
    worker: OnceLock<Arc<OmpModule>>,
    results: Mutex<HashMap<u64, FunctionCall>>,
}

impl LoopbackScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            worker: OnceLock::new(),
            results: Mutex::new(HashMap::new()),
        })
    }

    /// Attach the module that plays the remote worker.
    pub fn attach_worker(&self, module: Arc<OmpModule>) {
        let _ = self.worker.set(module);
    }
}

impl Scheduler for LoopbackScheduler {
    fn call_function(&self, call: FunctionCall) -> faasmp_fabric::Result<()> {
        let worker = self
            .worker
            .get()
            .ok_or_else(|| FabricError::Scheduler("no worker attached".to_string()))?;

        let code = match execute_chained_call(worker, &call) {
            Ok(code) => code as i32,
            Err(_) => 1,
        };

        let mut done = call;
        done.return_value = code;
        self.results.lock().insert(done.id, done);
        Ok(())
    }

    fn get_function_result(&self, id: u64, timeout_ms: u64) -> faasmp_fabric::Result<FunctionCall> {
        self.results
            .lock()
            .remove(&id)
            .ok_or(FabricError::ResultTimeout { id, timeout_ms })
    }
}

/// Scheduler that never runs anything: each dispatched call completes with
/// the next scripted exit code. Records every dispatched message for
/// inspection.
pub struct ScriptedScheduler {
    codes: Mutex<VecDeque<i32>>,
    results: Mutex<HashMap<u64, FunctionCall>>,
    dispatched: Mutex<Vec<FunctionCall>>,
}

impl ScriptedScheduler {
    pub fn new(codes: impl IntoIterator<Item = i32>) -> Arc<Self> {
        Arc::new(Self {
            codes: Mutex::new(codes.into_iter().collect()),
            results: Mutex::new(HashMap::new()),
            dispatched: Mutex::new(Vec::new()),
        })
    }

    /// Copies of every message handed to `call_function`, in dispatch order.
    pub fn dispatched(&self) -> Vec<FunctionCall> {
        self.dispatched.lock().clone()
    }
}

impl Scheduler for ScriptedScheduler {
    fn call_function(&self, call: FunctionCall) -> faasmp_fabric::Result<()> {
        self.dispatched.lock().push(call.clone());
        let code = self.codes.lock().pop_front().unwrap_or(0);
        let mut done = call;
        done.return_value = code;
        self.results.lock().insert(done.id, done);
        Ok(())
    }

    fn get_function_result(&self, id: u64, timeout_ms: u64) -> faasmp_fabric::Result<FunctionCall> {
        self.results
            .lock()
            .remove(&id)
            .ok_or(FabricError::ResultTimeout { id, timeout_ms })
    }
}
