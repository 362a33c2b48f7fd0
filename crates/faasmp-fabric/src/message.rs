//! The function-call message exchanged with the scheduler
//!
//! A `FunctionCall` describes one invocation of a user function. The OpenMP
//! fork dispatcher mints one per remote team member; the scheduler hands the
//! same record back, with `return_value` filled in, as the call's result.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One function invocation, as posted to and returned by the scheduler.
///
/// The `omp_*` fields are only meaningful on calls minted by a fork: they let
/// the remote worker rebuild the thread's team state before running the
/// microtask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Unique call id, assigned at creation
    pub id: u64,

    /// Owning user (namespace for functions and state keys)
    pub user: String,

    /// Function name within the user's namespace
    pub function: String,

    /// Whether the caller awaits the result out-of-band
    pub is_async: bool,

    /// Exit code of the invocation; zero means success
    pub return_value: i32,

    /// Key under which the parent's linear memory snapshot is stored
    pub snapshot_key: String,

    /// Byte size of the snapshot, so workers can pre-allocate before restore
    pub snapshot_size: usize,

    /// Guest function-table index of the microtask to run
    pub func_ptr: i32,

    /// Team-local thread number of this member
    pub omp_thread_num: i32,

    /// Team size of the forked region
    pub omp_num_threads: i32,

    /// Microtask argument pointers, in reverse order (the guest-side
    /// trampoline pops them off a stack)
    pub omp_function_args: Vec<u32>,

    /// Nesting depth of the forked region
    pub omp_depth: i32,

    /// Deepest level at which nested regions still create real teams
    pub omp_max_active_level: i32,

    /// Sticky team-size request carried from the parent
    pub omp_wanted_num_threads: i32,

    /// Device selector of the parent level (negative means distributed)
    pub omp_device: i32,

    /// Host the scheduler placed this call on (informational)
    pub scheduled_host: String,
}

impl FunctionCall {
    /// Mint a new asynchronous call for the same user/function as a parent.
    ///
    /// Ids are drawn at random; collisions across a cluster are the
    /// scheduler's concern, matching the upstream message factory.
    pub fn chained(user: &str, function: &str) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            id: rng.gen::<u32>() as u64,
            user: user.to_string(),
            function: function.to_string(),
            ..Default::default()
        }
    }

    /// Short human-readable form used in log lines.
    pub fn describe(&self) -> String {
        format!("{}/{}#{}", self.user, self.function, self.id)
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_calls_get_distinct_ids() {
        let a = FunctionCall::chained("demo", "pi");
        let b = FunctionCall::chained("demo", "pi");
        assert_eq!(a.user, "demo");
        assert_eq!(a.function, "pi");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_shape_round_trips() {
        let mut call = FunctionCall::chained("demo", "reduce");
        call.snapshot_key = "fork_9_1_ab12".to_string();
        call.snapshot_size = 65536;
        call.func_ptr = 4;
        call.omp_thread_num = 2;
        call.omp_num_threads = 4;
        call.omp_function_args = vec![1024, 512];
        call.omp_depth = 1;
        call.omp_device = -1;

        let json = serde_json::to_string(&call).unwrap();
        let restored: FunctionCall = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, call);
    }

    #[test]
    fn describe_names_user_function_and_id() {
        let mut call = FunctionCall::chained("demo", "echo");
        call.id = 77;
        assert_eq!(call.describe(), "demo/echo#77");
    }
}
