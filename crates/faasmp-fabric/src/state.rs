//! State service interface and in-memory implementation
//!
//! Distributed team members share no memory; the state service is their only
//! cross-host channel. The runtime uses it for linear-memory snapshots and
//! for the `__faasmp_*` shared-variable intrinsics.

use crate::error::{FabricError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Key-value backend shared by every worker in a deployment.
pub trait StateService: Send + Sync {
    /// Atomically add `delta` to the integer stored under `key`, returning
    /// the new value. A missing key counts as zero.
    fn incr_by_long(&self, key: &str, delta: i64) -> Result<i64>;

    /// Read the integer stored under `key`. A missing key counts as zero.
    fn get_long(&self, key: &str) -> Result<i64>;

    /// Store a memory snapshot under `key`, returning the byte size written.
    fn snapshot(&self, key: &str, data: &[u8]) -> Result<usize>;

    /// Fetch the snapshot stored under `key`, checking it still has the size
    /// the fork recorded on the child message.
    fn restore(&self, key: &str, expected_size: usize) -> Result<Vec<u8>>;
}

/// Integers share the keyspace with blobs, stored as little-endian i64.
fn decode_long(key: &str, bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| FabricError::NotAnInteger(key.to_string()))?;
    Ok(i64::from_le_bytes(raw))
}

/// In-memory state service.
///
/// Behaves like the production redis backend for the operations the runtime
/// needs: increments on missing keys start from zero, snapshots overwrite.
/// One instance can be shared by several in-process "hosts", which is exactly
/// what the distributed-fork tests do.
#[derive(Default)]
pub struct InMemoryStateService {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryStateService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StateService for InMemoryStateService {
    fn incr_by_long(&self, key: &str, delta: i64) -> Result<i64> {
        let mut entries = self.entries.lock();
        let current = match entries.get(key) {
            Some(bytes) => decode_long(key, bytes)?,
            None => 0,
        };
        let updated = current.wrapping_add(delta);
        entries.insert(key.to_string(), updated.to_le_bytes().to_vec());
        Ok(updated)
    }

    fn get_long(&self, key: &str) -> Result<i64> {
        let entries = self.entries.lock();
        match entries.get(key) {
            Some(bytes) => decode_long(key, bytes),
            None => Ok(0),
        }
    }

    fn snapshot(&self, key: &str, data: &[u8]) -> Result<usize> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), data.to_vec());
        Ok(data.len())
    }

    fn restore(&self, key: &str, expected_size: usize) -> Result<Vec<u8>> {
        let entries = self.entries.lock();
        let data = entries
            .get(key)
            .ok_or_else(|| FabricError::MissingState(key.to_string()))?;
        if data.len() != expected_size {
            return Err(FabricError::SnapshotSizeMismatch {
                key: key.to_string(),
                expected: expected_size,
                actual: data.len(),
            });
        }
        Ok(data.clone())
    }
}
