use std::fmt;
use std::ops::Range;

use crate::element::{cast_slice, Element};
use crate::runtime;
use crate::shape::{Shape, Strides};
use crate::storage::{HostBuffer, Storage};
use crate::{DType, Device, Result, StrataError};

/// Element type, logical shape and per-axis strides of a view.
#[derive(Clone, PartialEq, Eq)]
pub struct TensorMeta {
    pub(crate) dtype: DType,
    pub(crate) shape: Shape,
    pub(crate) strides: Strides,
}

impl TensorMeta {
    /// Row-major meta for `shape`.
    pub fn contiguous(dtype: DType, shape: Shape) -> Self {
        let strides = shape.contiguous_strides();
        Self { dtype, shape, strides }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }
}

impl fmt::Debug for TensorMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TensorMeta(dtype={}, shape={}, strides={:?})",
            self.dtype,
            self.shape,
            self.strides.as_slice()
        )
    }
}

/// A strided view over shared [`Storage`].
///
/// A tensor is `(meta, storage, byte offset)`. Views created with
/// [`permute`](Tensor::permute), [`slice`](Tensor::slice) and
/// [`view_as`](Tensor::view_as) share the storage of their source, so a
/// write through one is visible through all of them. Cloning a tensor
/// clones the handle, never the bytes.
///
/// # Examples
///
/// ```
/// use strata_core::Tensor;
///
/// let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let col = t.slice(1, 1, 2).unwrap();
/// assert_eq!(col.to_vec::<f32>().unwrap(), vec![2.0, 5.0]);
/// assert!(!col.is_contiguous());
/// ```
#[derive(Clone)]
pub struct Tensor {
    pub(crate) meta: TensorMeta,
    pub(crate) storage: Storage,
    pub(crate) offset: usize,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Allocate a zeroed, row-major tensor on `device`.
    pub fn create(shape: &[usize], dtype: DType, device: Device) -> Result<Self> {
        let shape = Shape::new(shape);
        let nbytes = byte_len("create", &shape, dtype)?;
        let meta = TensorMeta::contiguous(dtype, shape);
        let storage = runtime::allocate(nbytes, device)?;
        Ok(Self {
            meta,
            storage,
            offset: 0,
        })
    }

    /// Zeroed host tensor.
    pub fn zeros(shape: &[usize], dtype: DType) -> Result<Self> {
        Self::create(shape, dtype, Device::Cpu)
    }

    /// Host tensor holding a copy of `data` in row-major order.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        let shape = Shape::new(shape);
        let expected = byte_len("from_slice", &shape, T::DTYPE)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != expected {
            return Err(StrataError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let buffer = HostBuffer::from_bytes(bytes).map_err(|e| StrataError::Allocation {
            device: Device::Cpu,
            nbytes: bytes.len(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            meta: TensorMeta::contiguous(T::DTYPE, shape),
            storage: Storage::new(buffer, Device::Cpu),
            offset: 0,
        })
    }

    /// Host f32 tensor.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Result<Self> {
        Self::from_slice(data, shape)
    }

    /// Host i64 tensor (token ids, position ids).
    pub fn from_i64(data: &[i64], shape: &[usize]) -> Result<Self> {
        Self::from_slice(data, shape)
    }

    /// Host tensor of `dtype` built from f32 values, narrowing each value
    /// to the target encoding.
    pub fn from_f32_as(data: &[f32], shape: &[usize], dtype: DType) -> Result<Self> {
        match dtype {
            DType::F32 => Self::from_slice(data, shape),
            DType::F16 => {
                let v: Vec<half::f16> = data.iter().map(|&x| half::f16::from_f32(x)).collect();
                Self::from_slice(&v, shape)
            }
            DType::BF16 => {
                let v: Vec<half::bf16> = data.iter().map(|&x| half::bf16::from_f32(x)).collect();
                Self::from_slice(&v, shape)
            }
            DType::F64 => {
                let v: Vec<f64> = data.iter().map(|&x| x as f64).collect();
                Self::from_slice(&v, shape)
            }
            other => Err(StrataError::UnsupportedDType {
                op: "from_f32_as",
                dtype: other,
            }),
        }
    }

    /// Build a view over existing storage.
    ///
    /// Fails unless every element the view can reach lies inside the
    /// storage and `byte_offset` is element-aligned.
    pub fn from_storage(
        storage: Storage,
        dtype: DType,
        shape: &[usize],
        strides: &[isize],
        byte_offset: usize,
    ) -> Result<Self> {
        let shape = Shape::new(shape);
        if strides.len() != shape.ndim() {
            return Err(StrataError::InvalidArgument {
                op: "from_storage",
                detail: format!(
                    "{} strides given for {}-D shape {}",
                    strides.len(),
                    shape.ndim(),
                    shape
                ),
            });
        }
        byte_len("from_storage", &shape, dtype)?;
        let esize = dtype.element_size();
        if byte_offset % esize != 0 {
            return Err(StrataError::InvalidArgument {
                op: "from_storage",
                detail: format!("byte offset {byte_offset} not aligned to {dtype}"),
            });
        }
        let meta = TensorMeta {
            dtype,
            shape,
            strides: Strides::from_slice(strides),
        };
        check_span(&meta, byte_offset, storage.nbytes())?;
        Ok(Self {
            meta,
            storage,
            offset: byte_offset,
        })
    }

    // =========================================================================
    // Properties
    // =========================================================================

    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.meta.shape
    }

    /// Extents, shorthand for `shape().dims()`.
    pub fn dims(&self) -> &[usize] {
        self.meta.shape.dims()
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.meta.shape.ndim()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.meta.shape.numel()
    }

    /// Data type.
    pub fn dtype(&self) -> DType {
        self.meta.dtype
    }

    /// Strides (in elements, not bytes).
    pub fn strides(&self) -> &[isize] {
        &self.meta.strides
    }

    /// Offset of the view origin into the storage, in bytes.
    pub fn byte_offset(&self) -> usize {
        self.offset
    }

    pub fn element_size(&self) -> usize {
        self.meta.dtype.element_size()
    }

    /// Device of the backing storage.
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// The shared storage handle.
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Whether `self` and `other` view the same buffer.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        self.storage.ptr_eq(&other.storage)
    }

    /// Byte range of the elements of a contiguous tensor within its storage.
    ///
    /// Only meaningful when [`is_contiguous`](Tensor::is_contiguous) holds;
    /// operators check that before taking the range.
    pub fn data_range(&self) -> Range<usize> {
        self.offset..self.offset + self.meta.dtype.storage_bytes(self.numel())
    }

    /// One-line summary of shape, strides and dtype.
    pub fn info(&self) -> String {
        format!(
            "Tensor: shape{} strides{:?} offset={} dtype={} device={}",
            self.meta.shape,
            self.meta.strides.as_slice(),
            self.offset,
            self.meta.dtype,
            self.device()
        )
    }

    // =========================================================================
    // Data movement
    // =========================================================================

    /// Copy host bytes into this tensor's elements.
    ///
    /// The tensor must be contiguous and `bytes` must cover exactly its
    /// elements. Copies host→host or host→device depending on where the
    /// storage lives.
    pub fn load(&self, bytes: &[u8]) -> Result<()> {
        if !self.is_contiguous() {
            return Err(StrataError::NonContiguousOperand {
                op: "load",
                operand: "self",
            });
        }
        let range = self.data_range();
        if bytes.len() != range.len() {
            return Err(StrataError::BufferSizeMismatch {
                expected: range.len(),
                actual: bytes.len(),
            });
        }
        let mut guard = self.storage.write();
        runtime::memcpy(
            &mut guard.as_bytes_mut()[range],
            self.device(),
            bytes,
            Device::Cpu,
        )
    }

    /// Typed convenience over [`load`](Tensor::load).
    pub fn load_slice<T: Element>(&self, data: &[T]) -> Result<()> {
        self.expect_dtype("load_slice", T::DTYPE)?;
        self.load(bytemuck::cast_slice(data))
    }

    /// Read every element in logical (row-major) order, honouring strides.
    ///
    /// Device tensors are copied to the host first.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.expect_dtype("to_vec", T::DTYPE)?;
        let packed = self.host_packed_bytes()?;
        Ok(cast_slice::<T>(packed.as_bytes())?.to_vec())
    }

    /// Read every element widened to f32.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        match self.dtype() {
            DType::F32 => self.to_vec::<f32>(),
            DType::F16 => Ok(self
                .to_vec::<half::f16>()?
                .into_iter()
                .map(|v| v.to_f32())
                .collect()),
            DType::BF16 => Ok(self
                .to_vec::<half::bf16>()?
                .into_iter()
                .map(|v| v.to_f32())
                .collect()),
            DType::F64 => Ok(self.to_vec::<f64>()?.into_iter().map(|v| v as f32).collect()),
            DType::I32 => Ok(self.to_vec::<i32>()?.into_iter().map(|v| v as f32).collect()),
            DType::I64 => Ok(self.to_vec::<i64>()?.into_iter().map(|v| v as f32).collect()),
            other => Err(StrataError::UnsupportedDType {
                op: "to_f32_vec",
                dtype: other,
            }),
        }
    }

    /// Row-major copy of this view's bytes, on the host.
    fn host_packed_bytes(&self) -> Result<HostBuffer> {
        if self.device().is_cpu() {
            return self.packed_bytes();
        }
        self.to(Device::Cpu)?.packed_bytes()
    }

    /// Gather the view's elements into a fresh row-major buffer.
    ///
    /// Reads storage bytes directly, so callers must make sure the storage
    /// is host-addressable.
    pub(crate) fn packed_bytes(&self) -> Result<HostBuffer> {
        let esize = self.element_size();
        let total = self.dtype().storage_bytes(self.numel());
        let mut out = HostBuffer::try_zeroed(total).map_err(|e| StrataError::Allocation {
            device: Device::Cpu,
            nbytes: total,
            reason: e.to_string(),
        })?;
        let guard = self.storage.read();
        let src = guard.as_bytes();
        if self.is_contiguous() {
            out.as_bytes_mut().copy_from_slice(&src[self.data_range()]);
            return Ok(out);
        }
        let dst = out.as_bytes_mut();
        let base = (self.offset / esize) as isize;
        let mut cursor = 0usize;
        for_each_element_offset(self.dims(), self.strides(), |elem| {
            let start = ((base + elem) as usize) * esize;
            dst[cursor..cursor + esize].copy_from_slice(&src[start..start + esize]);
            cursor += esize;
        });
        Ok(out)
    }

    pub(crate) fn expect_dtype(&self, op: &'static str, expected: DType) -> Result<()> {
        if self.dtype() != expected {
            return Err(StrataError::DTypeMismatch {
                op,
                operand: "self",
                expected,
                got: self.dtype(),
            });
        }
        Ok(())
    }
}

/// Byte size of a row-major `shape` of `dtype`, rejecting shapes whose size
/// does not fit the address space.
pub(crate) fn byte_len(op: &'static str, shape: &Shape, dtype: DType) -> Result<usize> {
    shape
        .checked_numel()
        .and_then(|n| dtype.checked_storage_bytes(n))
        .ok_or_else(|| StrataError::InvalidArgument {
            op,
            detail: format!("shape {shape} of {dtype} overflows the address space"),
        })
}

/// Check that every element reachable through `meta` at `offset` lies in
/// `[0, nbytes)`.
pub(crate) fn check_span(meta: &TensorMeta, offset: usize, nbytes: usize) -> Result<()> {
    let esize = meta.dtype.element_size() as isize;
    let Some((lo, hi)) = meta.shape.offset_span(&meta.strides) else {
        return if offset <= nbytes {
            Ok(())
        } else {
            Err(StrataError::StorageTooSmall {
                required: offset,
                available: nbytes,
            })
        };
    };
    let origin = isize::try_from(offset).unwrap_or(isize::MAX);
    let first = origin.saturating_add(lo.saturating_mul(esize));
    let end = origin.saturating_add(hi.saturating_add(1).saturating_mul(esize));
    if first < 0 || end > nbytes as isize {
        return Err(StrataError::StorageTooSmall {
            required: end.max(0) as usize,
            available: nbytes,
        });
    }
    Ok(())
}

/// Visit the element offset (relative to the view origin) of every index
/// of `dims`, in row-major order.
pub(crate) fn for_each_element_offset(dims: &[usize], strides: &[isize], mut f: impl FnMut(isize)) {
    if dims.iter().any(|&d| d == 0) {
        return;
    }
    let ndim = dims.len();
    let mut index = vec![0usize; ndim];
    let mut offset = 0isize;
    loop {
        f(offset);
        // Odometer increment from the last axis.
        let mut axis = ndim;
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            index[axis] += 1;
            offset += strides[axis];
            if index[axis] < dims[axis] {
                break;
            }
            offset -= strides[axis] * dims[axis] as isize;
            index[axis] = 0;
        }
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, strides={:?}, offset={}, dtype={}, device={}, contiguous={})",
            self.meta.shape,
            self.meta.strides.as_slice(),
            self.offset,
            self.dtype(),
            self.device(),
            self.is_contiguous(),
        )
    }
}

impl fmt::Display for Tensor {
    /// Metadata line followed by the data, one row of the last axis per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.info())?;
        let values = match self.to_f32_vec() {
            Ok(v) => v,
            Err(_) => return write!(f, "<{} data not printable>", self.dtype()),
        };
        let row = self.dims().last().copied().unwrap_or(1).max(1);
        for chunk in values.chunks(row) {
            let line: Vec<String> = chunk.iter().map(|v| format!("{v}")).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create() {
        let t = Tensor::create(&[2, 3], DType::F32, Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[2, 3]);
        assert_eq!(t.strides(), &[3, 1]);
        assert_eq!(t.byte_offset(), 0);
        assert_eq!(t.storage().nbytes(), 24);
        assert!(t.is_contiguous());
        assert!(t.to_vec::<f32>().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_create_scalar() {
        let t = Tensor::create(&[], DType::BF16, Device::Cpu).unwrap();
        assert_eq!(t.numel(), 1);
        assert_eq!(t.storage().nbytes(), 2);
        assert!(t.is_contiguous());
    }

    #[test]
    fn test_create_rejects_overflowing_shape() {
        let err = Tensor::create(&[usize::MAX / 2, 4], DType::F32, Device::Cpu).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { op: "create", .. }), "{err}");
        let err = Tensor::create(&[1 << 62, 2], DType::U8, Device::Cpu).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { op: "create", .. }));

        // zero elements never overflow, whatever the other extents
        let empty = Tensor::create(&[0, usize::MAX], DType::F32, Device::Cpu).unwrap();
        assert_eq!(empty.numel(), 0);
        assert_eq!(empty.storage().nbytes(), 0);
    }

    #[test]
    fn test_from_slice_rejects_overflowing_shape() {
        let err = Tensor::from_f32(&[1.0], &[usize::MAX, 3]).unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { op: "from_slice", .. }));
    }

    #[test]
    fn test_from_storage_rejects_overflowing_view() {
        let storage = Storage::new(HostBuffer::try_zeroed(16).unwrap(), Device::Cpu);
        let err = Tensor::from_storage(storage.clone(), DType::F32, &[usize::MAX, 2], &[1, 1], 0)
            .unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { op: "from_storage", .. }));

        // element count fits, but the strides reach far past the buffer
        let err = Tensor::from_storage(storage, DType::F32, &[2, 2], &[isize::MAX, 1], 0).unwrap_err();
        assert!(matches!(err, StrataError::StorageTooSmall { .. }));
    }

    #[test]
    fn test_from_slice_size_mismatch() {
        let err = Tensor::from_f32(&[1.0, 2.0, 3.0], &[2, 2]).unwrap_err();
        assert_eq!(err, StrataError::BufferSizeMismatch { expected: 16, actual: 12 });
    }

    #[test]
    fn test_from_f32_as_reduced() {
        let t = Tensor::from_f32_as(&[1.0, 0.5, -2.0], &[3], DType::F16).unwrap();
        assert_eq!(t.dtype(), DType::F16);
        assert_eq!(t.to_f32_vec().unwrap(), vec![1.0, 0.5, -2.0]);
        assert!(Tensor::from_f32_as(&[1.0], &[1], DType::I8).is_err());
    }

    #[test]
    fn test_load_and_read_back() {
        let t = Tensor::zeros(&[2, 2], DType::F32).unwrap();
        t.load_slice(&[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);

        let err = t.load(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, StrataError::BufferSizeMismatch { expected: 16, actual: 3 }));
        assert!(t.load_slice(&[1i64, 2, 3, 4]).is_err());
    }

    #[test]
    fn test_to_vec_wrong_type() {
        let t = Tensor::from_i64(&[1, 2], &[2]).unwrap();
        let err = t.to_vec::<f32>().unwrap_err();
        assert!(matches!(err, StrataError::DTypeMismatch { op: "to_vec", .. }));
        assert_eq!(t.to_f32_vec().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_from_storage_bounds() {
        let base = Tensor::from_f32(&[0.0; 6], &[6]).unwrap();
        let ok = Tensor::from_storage(base.storage().clone(), DType::F32, &[2, 2], &[3, 1], 4);
        assert!(ok.is_ok());

        let err = Tensor::from_storage(base.storage().clone(), DType::F32, &[2, 3], &[3, 1], 4)
            .unwrap_err();
        assert_eq!(err, StrataError::StorageTooSmall { required: 28, available: 24 });

        let err = Tensor::from_storage(base.storage().clone(), DType::F32, &[2], &[1], 2)
            .unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { .. }));

        let err = Tensor::from_storage(base.storage().clone(), DType::F32, &[2], &[1, 1], 0)
            .unwrap_err();
        assert!(matches!(err, StrataError::InvalidArgument { .. }));
    }

    #[test]
    fn test_for_each_element_offset() {
        let mut seen = Vec::new();
        for_each_element_offset(&[2, 3], &[1, 2], |o| seen.push(o));
        assert_eq!(seen, vec![0, 2, 4, 1, 3, 5]);

        let mut count = 0;
        for_each_element_offset(&[], &[], |_| count += 1);
        assert_eq!(count, 1);

        for_each_element_offset(&[2, 0], &[1, 1], |_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_info_and_display() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(
            t.info(),
            "Tensor: shape[2, 2] strides[2, 1] offset=0 dtype=f32 device=cpu"
        );
        let shown = t.to_string();
        assert!(shown.ends_with("1 2\n3 4\n"), "{shown}");
        assert!(format!("{t:?}").contains("contiguous=true"));
    }
}
