//! Guest linear memory access
//!
//! The runtime reads loop bounds, argument arrays, and state keys out of the
//! guest's linear memory, and the distributed fork snapshots and restores it
//! wholesale. Everything goes through the [`GuestMemory`] trait so the core
//! stays independent of any particular wasm engine; [`SharedLinearMemory`]
//! is the in-process implementation used by tests and single-host embedders.

use crate::error::{Result, RuntimeError};
use parking_lot::RwLock;

/// Byte-addressed, bounds-checked view of a guest's linear memory.
///
/// Guest pointers are unsigned 32-bit offsets. Typed accessors default
/// through the raw byte accessors; offsets carry no alignment guarantee.
pub trait GuestMemory: Send + Sync {
    /// Current memory size in bytes.
    fn size(&self) -> usize;

    /// Read `len` bytes starting at `offset`.
    fn read_bytes(&self, offset: u32, len: usize) -> Result<Vec<u8>>;

    /// Write `bytes` starting at `offset`.
    fn write_bytes(&self, offset: u32, bytes: &[u8]) -> Result<()>;

    /// Full copy of the memory, for snapshots.
    fn to_vec(&self) -> Vec<u8>;

    /// Replace the whole memory with `bytes`, resizing as needed.
    fn overwrite(&self, bytes: &[u8]);

    fn read_i32(&self, offset: u32) -> Result<i32> {
        let bytes = self.read_bytes(offset, 4)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    fn write_i32(&self, offset: u32, value: i32) -> Result<()> {
        self.write_bytes(offset, bytemuck::bytes_of(&value))
    }

    fn read_u32(&self, offset: u32) -> Result<u32> {
        let bytes = self.read_bytes(offset, 4)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    fn write_u32(&self, offset: u32, value: u32) -> Result<()> {
        self.write_bytes(offset, bytemuck::bytes_of(&value))
    }

    fn read_i64(&self, offset: u32) -> Result<i64> {
        let bytes = self.read_bytes(offset, 8)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    fn write_i64(&self, offset: u32, value: i64) -> Result<()> {
        self.write_bytes(offset, bytemuck::bytes_of(&value))
    }

    /// Read `count` consecutive u32 values (a guest pointer array).
    fn read_u32_vec(&self, offset: u32, count: usize) -> Result<Vec<u32>> {
        let bytes = self.read_bytes(offset, count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| bytemuck::pod_read_unaligned(chunk))
            .collect())
    }

    /// Read a NUL-terminated string starting at `offset`.
    fn read_c_string(&self, offset: u32) -> Result<String> {
        let size = self.size();
        let mut collected = Vec::new();
        let mut cursor = offset as usize;
        loop {
            if cursor >= size {
                return Err(RuntimeError::InvalidArguments(format!(
                    "unterminated string at offset {offset}"
                )));
            }
            let byte = self.read_bytes(cursor as u32, 1)?[0];
            if byte == 0 {
                break;
            }
            collected.push(byte);
            cursor += 1;
        }
        Ok(String::from_utf8_lossy(&collected).into_owned())
    }
}

/// Heap-backed linear memory shared by all team members on one host.
///
/// The lock scope is a single read or write; the happens-before edges the
/// guest relies on come from the team barrier and critical sections, not
/// from this lock.
pub struct SharedLinearMemory {
    data: RwLock<Vec<u8>>,
}

impl SharedLinearMemory {
    /// Allocate a zeroed memory of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: RwLock::new(vec![0; size]),
        }
    }

    /// Build a memory from existing contents.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(bytes),
        }
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<()> {
        let size = self.data.read().len();
        let offset = offset as usize;
        if offset.checked_add(len).map_or(true, |end| end > size) {
            return Err(RuntimeError::MemoryOutOfBounds {
                offset,
                size: len,
                memory_size: size,
            });
        }
        Ok(())
    }
}

impl GuestMemory for SharedLinearMemory {
    fn size(&self) -> usize {
        self.data.read().len()
    }

    fn read_bytes(&self, offset: u32, len: usize) -> Result<Vec<u8>> {
        self.check_bounds(offset, len)?;
        let data = self.data.read();
        let offset = offset as usize;
        Ok(data[offset..offset + len].to_vec())
    }

    fn write_bytes(&self, offset: u32, bytes: &[u8]) -> Result<()> {
        self.check_bounds(offset, bytes.len())?;
        let mut data = self.data.write();
        let offset = offset as usize;
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn to_vec(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    fn overwrite(&self, bytes: &[u8]) {
        let mut data = self.data.write();
        data.clear();
        data.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_round_trips_at_unaligned_offsets() {
        let memory = SharedLinearMemory::new(64);

        memory.write_i32(1, -12345).unwrap();
        assert_eq!(memory.read_i32(1).unwrap(), -12345);

        memory.write_i64(7, i64::MIN + 3).unwrap();
        assert_eq!(memory.read_i64(7).unwrap(), i64::MIN + 3);

        memory.write_u32(21, u32::MAX).unwrap();
        assert_eq!(memory.read_u32(21).unwrap(), u32::MAX);
    }

    #[test]
    fn out_of_bounds_access_is_trapped() {
        let memory = SharedLinearMemory::new(16);

        let err = memory.read_i32(14).unwrap_err();
        assert!(matches!(err, RuntimeError::MemoryOutOfBounds { .. }));

        let err = memory.write_i64(12, 0).unwrap_err();
        assert!(matches!(err, RuntimeError::MemoryOutOfBounds { .. }));

        // offset overflow must not wrap
        let err = memory.read_bytes(u32::MAX, 8).unwrap_err();
        assert!(matches!(err, RuntimeError::MemoryOutOfBounds { .. }));
    }

    #[test]
    fn pointer_arrays_read_in_order() {
        let memory = SharedLinearMemory::new(64);
        memory.write_u32(8, 111).unwrap();
        memory.write_u32(12, 222).unwrap();
        memory.write_u32(16, 333).unwrap();

        assert_eq!(memory.read_u32_vec(8, 3).unwrap(), vec![111, 222, 333]);
    }

    #[test]
    fn c_strings_terminate_at_nul() {
        let memory = SharedLinearMemory::new(32);
        memory.write_bytes(4, b"omp:counter\0trailing").unwrap();
        assert_eq!(memory.read_c_string(4).unwrap(), "omp:counter");
    }

    #[test]
    fn unterminated_c_string_is_invalid() {
        let memory = SharedLinearMemory::from_bytes(b"no-nul-here".to_vec());
        assert!(matches!(
            memory.read_c_string(0),
            Err(RuntimeError::InvalidArguments(_))
        ));
    }

    #[test]
    fn snapshot_and_overwrite() {
        let memory = SharedLinearMemory::new(8);
        memory.write_i32(0, 42).unwrap();

        let image = memory.to_vec();
        assert_eq!(image.len(), 8);

        let restored = SharedLinearMemory::new(2);
        restored.overwrite(&image);
        assert_eq!(restored.size(), 8);
        assert_eq!(restored.read_i32(0).unwrap(), 42);
    }
}
