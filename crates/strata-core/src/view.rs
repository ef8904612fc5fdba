//! View algebra: permute, slice, view_as, and the contiguity test.
//!
//! Every view shares storage with its source. Only
//! [`contiguous`](Tensor::contiguous), [`reshape`](Tensor::reshape) on a
//! non-contiguous source, and [`to`](Tensor::to) across devices copy.

use crate::runtime;
use crate::shape::{Shape, Strides};
use crate::tensor::{Tensor, TensorMeta};
use crate::{Device, Result, StrataError};

impl Tensor {
    /// Whether the strides are the row-major strides of the shape.
    ///
    /// The byte offset does not matter: a slice along the leading axis is
    /// still a dense block.
    pub fn is_contiguous(&self) -> bool {
        self.meta.shape.is_contiguous(&self.meta.strides)
    }

    /// Reorder axes: `shape[i] = old_shape[order[i]]`,
    /// `strides[i] = old_strides[order[i]]`.
    pub fn permute(&self, order: &[usize]) -> Result<Tensor> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        let valid = order.len() == ndim
            && order.iter().all(|&axis| {
                axis < ndim && !std::mem::replace(&mut seen[axis], true)
            });
        if !valid {
            return Err(StrataError::InvalidPermutation {
                order: order.to_vec(),
                ndim,
            });
        }

        let dims: Vec<usize> = order.iter().map(|&a| self.dims()[a]).collect();
        let strides: Strides = order.iter().map(|&a| self.strides()[a]).collect();
        tracing::trace!(?order, "permute view");
        Ok(self.derive(Shape::from(dims), strides, self.offset))
    }

    /// Narrow `axis` to `start..end`.
    pub fn slice(&self, axis: usize, start: usize, end: usize) -> Result<Tensor> {
        let ndim = self.ndim();
        if axis >= ndim {
            return Err(StrataError::InvalidAxis { axis, ndim });
        }
        let extent = self.dims()[axis];
        if end > extent {
            return Err(StrataError::IndexOutOfRange {
                context: "slice end",
                index: end as i64,
                bound: extent + 1,
            });
        }
        if start > end {
            return Err(StrataError::IndexOutOfRange {
                context: "slice start",
                index: start as i64,
                bound: end + 1,
            });
        }

        let offset = isize::try_from(start)
            .ok()
            .and_then(|s| s.checked_mul(self.strides()[axis]))
            .and_then(|e| e.checked_mul(self.element_size() as isize))
            .and_then(|shift| shift.checked_add(self.offset as isize))
            .filter(|&o| o >= 0)
            .ok_or(StrataError::IndexOutOfRange {
                context: "slice offset",
                index: start as i64,
                bound: self.storage.nbytes(),
            })?;

        let mut dims = self.dims().to_vec();
        dims[axis] = end - start;
        tracing::trace!(axis, start, end, "slice view");
        Ok(self.derive(Shape::from(dims), self.meta.strides.clone(), offset as usize))
    }

    /// Reinterpret a contiguous tensor with a new shape of equal element
    /// count. Never copies: a non-contiguous source is an error.
    pub fn view_as(&self, new_shape: &[usize]) -> Result<Tensor> {
        let target = Shape::new(new_shape);
        if target.checked_numel() != Some(self.numel()) {
            return Err(StrataError::InvalidShapeForView {
                shape: self.dims().to_vec(),
                target: new_shape.to_vec(),
                reason: "element count differs",
            });
        }
        if !self.is_contiguous() {
            return Err(StrataError::InvalidShapeForView {
                shape: self.dims().to_vec(),
                target: new_shape.to_vec(),
                reason: "source is not contiguous",
            });
        }
        let strides = target.contiguous_strides();
        Ok(self.derive(target, strides, self.offset))
    }

    /// Contiguous tensor with the same elements.
    ///
    /// Returns a view sharing storage when already contiguous; otherwise
    /// copies into fresh storage on the same device.
    pub fn contiguous(&self) -> Result<Tensor> {
        if self.is_contiguous() {
            return Ok(self.clone());
        }
        let device = self.device();
        if !device.is_cpu() {
            return Err(StrataError::NotImplemented(format!(
                "strided copy on {device}"
            )));
        }
        let packed = self.packed_bytes()?;
        Ok(Tensor {
            meta: TensorMeta::contiguous(self.dtype(), self.meta.shape.clone()),
            storage: crate::Storage::new(packed, device),
            offset: 0,
        })
    }

    /// View with a new shape, copying first only if the source is not
    /// contiguous.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Tensor> {
        if Shape::new(new_shape).checked_numel() != Some(self.numel()) {
            return Err(StrataError::InvalidShapeForView {
                shape: self.dims().to_vec(),
                target: new_shape.to_vec(),
                reason: "element count differs",
            });
        }
        self.contiguous()?.view_as(new_shape)
    }

    /// Move the tensor to `device`. Same device is a no-op sharing storage.
    pub fn to(&self, device: Device) -> Result<Tensor> {
        if self.device() == device {
            return Ok(self.clone());
        }
        let src = self.contiguous()?;
        let range = src.data_range();
        let storage = runtime::allocate(range.len(), device)?;
        {
            let src_guard = src.storage.read();
            let mut dst_guard = storage.write();
            runtime::memcpy(
                dst_guard.as_bytes_mut(),
                device,
                &src_guard.as_bytes()[range],
                src.device(),
            )?;
        }
        Ok(Tensor {
            meta: TensorMeta::contiguous(self.dtype(), self.meta.shape.clone()),
            storage,
            offset: 0,
        })
    }

    fn derive(&self, shape: Shape, strides: Strides, offset: usize) -> Tensor {
        Tensor {
            meta: TensorMeta {
                dtype: self.meta.dtype,
                shape,
                strides,
            },
            storage: self.storage.clone(),
            offset,
        }
    }
}
