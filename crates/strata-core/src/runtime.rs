//! Device runtime boundary: allocation and synchronous copies.
//!
//! The core never talks to a driver directly. Each device type is served by
//! a [`DeviceRuntime`] held in a process-global registry; the host runtime
//! is always present, accelerator backends register themselves with
//! [`register`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::storage::HostBuffer;
use crate::{Device, DeviceType, Result, Storage, StrataError};

/// Direction of a synchronous copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemcpyKind {
    H2H,
    H2D,
    D2H,
    D2D,
}

impl MemcpyKind {
    /// Copy direction for moving bytes from `src` to `dst`.
    pub fn between(src: Device, dst: Device) -> Self {
        match (src.is_cpu(), dst.is_cpu()) {
            (true, true) => MemcpyKind::H2H,
            (true, false) => MemcpyKind::H2D,
            (false, true) => MemcpyKind::D2H,
            (false, false) => MemcpyKind::D2D,
        }
    }
}

impl fmt::Display for MemcpyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemcpyKind::H2H => "host->host",
            MemcpyKind::H2D => "host->device",
            MemcpyKind::D2H => "device->host",
            MemcpyKind::D2D => "device->device",
        };
        f.write_str(s)
    }
}

/// Allocator and copy engine for one device type.
pub trait DeviceRuntime: Send + Sync {
    /// Device type this runtime serves.
    fn device_type(&self) -> DeviceType;

    /// Allocate `nbytes` of zeroed storage on `device`.
    fn allocate(&self, nbytes: usize, device: Device) -> Result<Storage>;

    /// Copy `src` into `dst`. Both slices must have the same length.
    fn memcpy_sync(&self, dst: &mut [u8], src: &[u8], kind: MemcpyKind) -> Result<()>;
}

/// Host memory runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuRuntime;

impl DeviceRuntime for CpuRuntime {
    fn device_type(&self) -> DeviceType {
        DeviceType::Cpu
    }

    fn allocate(&self, nbytes: usize, device: Device) -> Result<Storage> {
        if !device.is_cpu() {
            return Err(StrataError::UnsupportedDevice { device });
        }
        let buffer = HostBuffer::try_zeroed(nbytes).map_err(|e| StrataError::Allocation {
            device,
            nbytes,
            reason: e.to_string(),
        })?;
        tracing::debug!(nbytes, "allocated host storage");
        Ok(Storage::new(buffer, device))
    }

    fn memcpy_sync(&self, dst: &mut [u8], src: &[u8], kind: MemcpyKind) -> Result<()> {
        if kind != MemcpyKind::H2H {
            return Err(StrataError::NotImplemented(format!(
                "{kind} copy on the host runtime"
            )));
        }
        check_copy_len(dst, src)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Length check shared by runtimes before copying.
pub fn check_copy_len(dst: &[u8], src: &[u8]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(StrataError::BufferSizeMismatch {
            expected: dst.len(),
            actual: src.len(),
        });
    }
    Ok(())
}

type Registry = RwLock<HashMap<DeviceType, Arc<dyn DeviceRuntime>>>;

static RUNTIMES: OnceLock<Registry> = OnceLock::new();

fn runtimes() -> &'static Registry {
    RUNTIMES.get_or_init(|| {
        let mut map: HashMap<DeviceType, Arc<dyn DeviceRuntime>> = HashMap::new();
        map.insert(DeviceType::Cpu, Arc::new(CpuRuntime));
        RwLock::new(map)
    })
}

/// Install (or replace) the runtime for its device type.
pub fn register(runtime: Arc<dyn DeviceRuntime>) {
    let device_type = runtime.device_type();
    tracing::debug!(%device_type, "registering device runtime");
    runtimes().write().insert(device_type, runtime);
}

/// Whether a runtime is registered for the device's type.
pub fn is_available(device: Device) -> bool {
    runtimes().read().contains_key(&device.device_type())
}

/// Runtime serving `device`, or `UnsupportedDevice` if none is registered.
pub fn get(device: Device) -> Result<Arc<dyn DeviceRuntime>> {
    runtimes()
        .read()
        .get(&device.device_type())
        .cloned()
        .ok_or(StrataError::UnsupportedDevice { device })
}

/// Allocate `nbytes` on `device` through its runtime.
pub fn allocate(nbytes: usize, device: Device) -> Result<Storage> {
    get(device)?.allocate(nbytes, device)
}

/// Copy bytes between devices.
///
/// The non-host side picks the runtime: a host→device copy is carried out
/// by the device's runtime, host→host by the host runtime.
pub fn memcpy(dst: &mut [u8], dst_device: Device, src: &[u8], src_device: Device) -> Result<()> {
    let kind = MemcpyKind::between(src_device, dst_device);
    let engine = if dst_device.is_cpu() { src_device } else { dst_device };
    tracing::debug!(%kind, bytes = src.len(), "memcpy_sync");
    get(engine)?.memcpy_sync(dst, src, kind)
}
