//! Error types for fabric operations

/// Result type for fabric operations
pub type Result<T> = std::result::Result<T, FabricError>;

/// Errors that can occur talking to the scheduler or the state service
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// No result arrived for a chained call within the allowed time
    #[error("timed out after {timeout_ms}ms waiting for result of call {id}")]
    ResultTimeout { id: u64, timeout_ms: u64 },

    /// A state key was read before anything was written under it
    #[error("no state stored under key: {0}")]
    MissingState(String),

    /// A restored snapshot did not have the size recorded on the message
    #[error("snapshot {key} has {actual} bytes, message recorded {expected}")]
    SnapshotSizeMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// A state value was not a wire-encoded integer
    #[error("state value under key {0} is not an integer")]
    NotAnInteger(String),

    /// The scheduler rejected or failed an operation
    #[error("scheduler error: {0}")]
    Scheduler(String),
}
