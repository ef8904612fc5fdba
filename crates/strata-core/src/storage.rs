use std::collections::TryReserveError;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Device;

/// Fixed-size byte buffer aligned to 8 bytes.
///
/// Backed by `u64` words so any element-aligned byte range can be cast to
/// a typed slice (`f32`, `f16`, `i64`, ...) with `bytemuck`.
#[derive(Clone, PartialEq, Eq)]
pub struct HostBuffer {
    words: Vec<u64>,
    len: usize,
}

impl HostBuffer {
    /// Allocate `len` zeroed bytes, reporting allocator failure instead of
    /// aborting.
    pub fn try_zeroed(len: usize) -> std::result::Result<Self, TryReserveError> {
        let n_words = len.div_ceil(8);
        let mut words = Vec::new();
        words.try_reserve_exact(n_words)?;
        words.resize(n_words, 0);
        Ok(Self { words, len })
    }

    /// Copy `bytes` into a fresh aligned buffer.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, TryReserveError> {
        let mut buf = Self::try_zeroed(bytes.len())?;
        buf.as_bytes_mut().copy_from_slice(bytes);
        Ok(buf)
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u64, u8>(&self.words)[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut bytemuck::cast_slice_mut::<u64, u8>(&mut self.words)[..self.len]
    }
}

impl fmt::Debug for HostBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostBuffer({} bytes)", self.len)
    }
}

/// Shared, reference-counted tensor storage.
///
/// Cloning a `Storage` clones the handle, not the bytes: every clone (and
/// every tensor view holding one) sees writes made through any other. The
/// buffer is freed when the last handle drops.
#[derive(Clone)]
pub struct Storage {
    data: Arc<RwLock<HostBuffer>>,
    device: Device,
    nbytes: usize,
}

impl Storage {
    /// Wrap a buffer that already lives on `device`.
    ///
    /// Device runtimes call this after allocating; the core never decides
    /// where memory comes from.
    pub fn new(buffer: HostBuffer, device: Device) -> Self {
        let nbytes = buffer.len();
        Self {
            data: Arc::new(RwLock::new(buffer)),
            device,
            nbytes,
        }
    }

    /// Get the device of this storage.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Shared access to the bytes.
    ///
    /// Uses a recursive read so one thread may hold several read guards on
    /// the same storage (two operands viewing one buffer).
    pub fn read(&self) -> RwLockReadGuard<'_, HostBuffer> {
        self.data.read_recursive()
    }

    /// Exclusive access to the bytes. Blocks while any read guard is alive,
    /// including one held by the calling thread.
    pub fn write(&self) -> RwLockWriteGuard<'_, HostBuffer> {
        self.data.write()
    }

    /// Whether both handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Number of live handles to the buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.data)
    }

    /// Whether this storage is uniquely owned.
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("device", &self.device)
            .field("nbytes", &self.nbytes)
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let buf = HostBuffer::try_zeroed(10).unwrap();
        assert_eq!(buf.len(), 10);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
        assert_eq!(buf.as_bytes().as_ptr() as usize % 8, 0);
    }

    #[test]
    fn test_from_bytes() {
        let buf = HostBuffer::from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(buf.as_bytes(), &[1, 2, 3]);
        assert!(!buf.is_empty());
        assert!(HostBuffer::try_zeroed(0).unwrap().is_empty());
    }

    #[test]
    fn test_shared_writes_are_visible() {
        let s1 = Storage::new(HostBuffer::try_zeroed(4).unwrap(), Device::Cpu);
        let s2 = s1.clone();
        assert!(!s1.is_unique());
        assert!(s1.ptr_eq(&s2));

        s2.write().as_bytes_mut()[0] = 99;
        assert_eq!(s1.read().as_bytes()[0], 99);
    }

    #[test]
    fn test_recursive_reads() {
        let s = Storage::new(HostBuffer::from_bytes(&[7; 8]).unwrap(), Device::Cpu);
        let a = s.read();
        let b = s.read();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_drop_releases_handle() {
        let s1 = Storage::new(HostBuffer::try_zeroed(8).unwrap(), Device::Cpu);
        {
            let _s2 = s1.clone();
            assert_eq!(s1.ref_count(), 2);
        }
        assert!(s1.is_unique());
        assert_eq!(s1.nbytes(), 8);
    }
}
