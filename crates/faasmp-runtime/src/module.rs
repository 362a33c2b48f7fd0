//! Module handle
//!
//! An [`OmpModule`] ties together everything one guest instance needs from
//! the OpenMP runtime: its linear memory, the microtask function table, the
//! per-module team pool, and handles to the scheduler and state service.
//! The wasm engine itself lives outside this crate; embedders hand the
//! runtime a [`GuestMemory`] and register microtask entry points by table
//! index.

use crate::context::{TaskContext, TaskScope};
use crate::error::{Result, RuntimeError};
use crate::level::Level;
use crate::memory::GuestMemory;
use crate::pool::TeamPool;
use faasmp_fabric::{FunctionCall, Scheduler, StateService, SystemConfig};
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A guest function reachable through the module's function table.
///
/// Called with the member's team-local thread number and the shared-variable
/// pointer array; returns the member's exit code (zero for success).
pub type Microtask = Arc<dyn Fn(i32, &[u32]) -> i64 + Send + Sync + 'static>;

/// One loaded guest instance, shared by every team member on this host.
pub struct OmpModule {
    memory: Arc<dyn GuestMemory>,
    table: RwLock<Vec<Microtask>>,
    pool: TeamPool,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<dyn StateService>,
    config: SystemConfig,
    fork_seq: AtomicU64,
}

impl OmpModule {
    pub fn new(
        memory: Arc<dyn GuestMemory>,
        scheduler: Arc<dyn Scheduler>,
        state: Arc<dyn StateService>,
        config: SystemConfig,
    ) -> Arc<Self> {
        let pool = TeamPool::new(config.default_team_size.max(1) as usize);
        Arc::new(Self {
            memory,
            table: RwLock::new(Vec::new()),
            pool,
            scheduler,
            state,
            config,
            fork_seq: AtomicU64::new(0),
        })
    }

    pub fn memory(&self) -> &Arc<dyn GuestMemory> {
        &self.memory
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn state(&self) -> &Arc<dyn StateService> {
        &self.state
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub(crate) fn team_pool(&self) -> &TeamPool {
        &self.pool
    }

    /// Register a microtask, returning its function-table index.
    pub fn register_microtask<F>(&self, microtask: F) -> i32
    where
        F: Fn(i32, &[u32]) -> i64 + Send + Sync + 'static,
    {
        let mut table = self.table.write();
        table.push(Arc::new(microtask));
        (table.len() - 1) as i32
    }

    /// Resolve a microtask from the function table by index.
    pub fn resolve_microtask(&self, index: i32) -> Result<Microtask> {
        if index < 0 {
            return Err(RuntimeError::InvalidMicrotask(index));
        }
        self.table
            .read()
            .get(index as usize)
            .cloned()
            .ok_or(RuntimeError::InvalidMicrotask(index))
    }

    /// Write the guest's linear memory to the state service under `key`,
    /// returning the snapshot's byte size.
    pub fn snapshot_to_state(&self, key: &str) -> Result<usize> {
        let image = self.memory.to_vec();
        let size = self.state.snapshot(key, &image)?;
        tracing::debug!(key, size, "snapshotted guest memory to state");
        Ok(size)
    }

    /// Replace the guest's linear memory with the snapshot stored under
    /// `key`, checking it still has the recorded size.
    pub fn restore_from_state(&self, key: &str, size: usize) -> Result<()> {
        let image = self.state.restore(key, size)?;
        self.memory.overwrite(&image);
        tracing::debug!(key, size, "restored guest memory from state");
        Ok(())
    }

    /// Mint a snapshot key for a fork from call `parent_id`.
    ///
    /// The key carries the parent id, a per-module sequence number, and a
    /// random suffix, so concurrent forks under load cannot collide the way
    /// a bare random identifier could.
    pub(crate) fn next_snapshot_key(&self, parent_id: u64) -> String {
        let seq = self.fork_seq.fetch_add(1, Ordering::Relaxed);
        let entropy: u16 = rand::thread_rng().gen();
        format!("fork_{parent_id}_{seq}_{entropy:04x}")
    }

    /// Enter the implicit outer level for a fresh invocation of this module.
    ///
    /// This is the worker's first action before running the guest entry
    /// point; every intrinsic the guest calls reads the installed context.
    pub fn main_scope(self: &Arc<Self>, call: FunctionCall) -> TaskScope {
        let level = Arc::new(Level::root(&self.config));
        TaskScope::enter(TaskContext {
            thread_num: 0,
            level,
            module: self.clone(),
            call: Arc::new(call),
        })
    }
}
