//! Error types for the OpenMP runtime
//!
//! An `Err` returned from an intrinsic is the host-side trap: the embedder
//! unwinds the calling guest frame and records the failure on the invocation
//! result. Recoverable guest mistakes never reach this enum; they are logged
//! at `warn` and clamped or ignored at the call site.

use faasmp_fabric::FabricError;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that trap the guest
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The guest requested a loop schedule the distributor does not handle
    #[error("unimplemented loop schedule: {0}")]
    UnimplementedSchedule(i32),

    /// The level's reduction method is undefined
    #[error("unsupported reduce operation")]
    UnsupportedReduction,

    /// One or more team members exited with a nonzero code
    #[error("{0} team members exited with errors")]
    TeamExecutionFailed(usize),

    /// An intrinsic was called on a thread with no installed task context
    #[error("no OpenMP task context installed on this thread")]
    NoTaskContext,

    /// A microtask index did not resolve in the module's function table
    #[error("invalid microtask index: {0}")]
    InvalidMicrotask(i32),

    /// Guest memory access out of bounds
    #[error("guest memory access out of bounds: offset {offset} + size {size} > memory size {memory_size}")]
    MemoryOutOfBounds {
        offset: usize,
        size: usize,
        memory_size: usize,
    },

    /// A master-only region was closed by a non-master thread
    #[error("end of master/single region reached by thread {0}")]
    NotMasterThread(i32),

    /// Malformed host-call arguments (wrong arity or operand width)
    #[error("invalid host call arguments: {0}")]
    InvalidArguments(String),

    /// A scheduler or state-service operation failed
    #[error(transparent)]
    Fabric(#[from] FabricError),
}
