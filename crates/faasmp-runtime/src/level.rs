//! Team level records
//!
//! A [`Level`] describes one active parallel region: its team size, nesting
//! depth, scheduling policy knobs, and the synchronization primitives the
//! team shares. Every thread executing guest code references exactly one
//! level through its task context.

use crate::sync::RegionLock;
use faasmp_fabric::{FunctionCall, SystemConfig};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Barrier;

/// Nested regions below this depth create real teams by default; deeper
/// regions serialize. Matches stock nested-parallelism-off behavior.
const DEFAULT_MAX_ACTIVE_LEVELS: i32 = 1;

/// Unset sentinel for the team-size request knobs.
const UNSET: i32 = -1;

/// Strategy for combining per-thread reduction results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKind {
    /// Serialize combiner execution under the level's reduction lock
    CriticalBlock,
    /// Nothing to coordinate (team of one)
    EmptyBlock,
    /// Guest uses atomic operations; the runtime only signals the choice
    AtomicBlock,
    /// Cross-host sum through the state service
    MultiHostSum,
    /// No usable strategy; starting a reduction traps
    NotDefined,
}

/// One active parallel region, shared by all its team members.
///
/// `depth` and `num_threads` are fixed at construction. The policy knobs
/// (`max_active_levels`, the team-size requests, the device selector) are
/// atomics by necessity, but the contract is that only the master writes
/// them, outside a parallel region; this is documented, not enforced.
#[derive(Debug)]
pub struct Level {
    /// Nesting depth; zero for the implicit outer level
    pub depth: i32,

    /// Team size of this region
    pub num_threads: i32,

    max_active_levels: AtomicI32,
    wanted_num_threads: AtomicI32,
    pushed_num_threads: AtomicI32,
    user_default_device: AtomicI32,

    /// Cyclic team barrier; present iff the team has more than one member
    barrier: Option<Barrier>,

    critical: RegionLock,
    reduce: RegionLock,
}

impl Level {
    /// The implicit outer level a module starts in.
    pub fn root(config: &SystemConfig) -> Self {
        Self {
            depth: 0,
            num_threads: 1,
            max_active_levels: AtomicI32::new(DEFAULT_MAX_ACTIVE_LEVELS),
            wanted_num_threads: AtomicI32::new(UNSET),
            pushed_num_threads: AtomicI32::new(UNSET),
            user_default_device: AtomicI32::new(config.default_device),
            barrier: None,
            critical: RegionLock::new(),
            reduce: RegionLock::new(),
        }
    }

    /// A new single-host team forked from `parent`.
    ///
    /// Policy fields are inherited; the one-shot pushed request is not.
    pub fn team(parent: &Level, num_threads: i32) -> Self {
        let num_threads = num_threads.max(1);
        Self {
            depth: parent.depth + 1,
            num_threads,
            max_active_levels: AtomicI32::new(parent.max_active_levels()),
            wanted_num_threads: AtomicI32::new(parent.wanted_num_threads.load(Ordering::SeqCst)),
            pushed_num_threads: AtomicI32::new(UNSET),
            user_default_device: AtomicI32::new(parent.user_default_device()),
            barrier: (num_threads > 1).then(|| Barrier::new(num_threads as usize)),
            critical: RegionLock::new(),
            reduce: RegionLock::new(),
        }
    }

    /// The level a remote team member reconstructs from its chained-call
    /// message.
    ///
    /// Remote levels never carry a barrier: the members live on different
    /// hosts and can only meet through the state service, so `__kmpc_barrier`
    /// degrades to a no-op even though the team is larger than one.
    pub fn remote(call: &FunctionCall) -> Self {
        Self {
            depth: call.omp_depth,
            num_threads: call.omp_num_threads.max(1),
            max_active_levels: AtomicI32::new(call.omp_max_active_level),
            wanted_num_threads: AtomicI32::new(call.omp_wanted_num_threads),
            pushed_num_threads: AtomicI32::new(UNSET),
            user_default_device: AtomicI32::new(call.omp_device),
            barrier: None,
            critical: RegionLock::new(),
            reduce: RegionLock::new(),
        }
    }

    /// Record this level's lineage onto a child message so the remote worker
    /// can rebuild its team state.
    pub fn snapshot_parent(&self, call: &mut FunctionCall) {
        call.omp_depth = self.depth + 1;
        call.omp_max_active_level = self.max_active_levels();
        call.omp_wanted_num_threads = self.wanted_num_threads.load(Ordering::SeqCst);
        call.omp_device = self.user_default_device();
    }

    /// Team size the next fork from this level will produce.
    ///
    /// Precedence: the one-shot pushed request if positive, else the sticky
    /// wanted request if positive, else `default_team_size`; clamped to one
    /// when the next depth exceeds the active-level limit.
    pub fn next_team_size(&self, default_team_size: i32) -> i32 {
        let pushed = self.pushed_num_threads.load(Ordering::SeqCst);
        let wanted = self.wanted_num_threads.load(Ordering::SeqCst);

        let requested = if pushed > 0 {
            pushed
        } else if wanted > 0 {
            wanted
        } else {
            default_team_size
        };

        if self.depth + 1 > self.max_active_levels() {
            1
        } else {
            requested.max(1)
        }
    }

    pub fn max_active_levels(&self) -> i32 {
        self.max_active_levels.load(Ordering::SeqCst)
    }

    pub fn set_max_active_levels(&self, levels: i32) {
        self.max_active_levels.store(levels, Ordering::SeqCst);
    }

    pub fn set_wanted_num_threads(&self, num_threads: i32) {
        self.wanted_num_threads.store(num_threads, Ordering::SeqCst);
    }

    pub fn set_pushed_num_threads(&self, num_threads: i32) {
        self.pushed_num_threads.store(num_threads, Ordering::SeqCst);
    }

    /// Consume the one-shot pushed request after a fork.
    pub fn clear_pushed_num_threads(&self) {
        self.pushed_num_threads.store(UNSET, Ordering::SeqCst);
    }

    pub fn user_default_device(&self) -> i32 {
        self.user_default_device.load(Ordering::SeqCst)
    }

    pub fn set_user_default_device(&self, device: i32) {
        self.user_default_device.store(device, Ordering::SeqCst);
    }

    /// Wait on the team barrier, if this level has one.
    pub fn wait_barrier(&self) {
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
    }

    pub fn has_barrier(&self) -> bool {
        self.barrier.is_some()
    }

    pub fn enter_critical(&self) {
        self.critical.acquire();
    }

    pub fn exit_critical(&self) {
        self.critical.release();
    }

    pub fn lock_reduce(&self) {
        self.reduce.acquire();
    }

    pub fn unlock_reduce(&self) {
        self.reduce.release();
    }

    /// Reduction strategy for this level, derived from the device selector
    /// and the team size.
    pub fn reduction_method(&self) -> ReduceKind {
        if self.user_default_device() < 0 {
            ReduceKind::MultiHostSum
        } else if self.num_threads <= 1 {
            ReduceKind::EmptyBlock
        } else {
            ReduceKind::CriticalBlock
        }
    }
}
