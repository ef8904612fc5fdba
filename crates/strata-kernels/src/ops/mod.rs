//! Tensor-level operators.
//!
//! Each operator validates its operands (device, dtype, contiguity, shape,
//! in that order), routes by device, then borrows the bytes and hands typed
//! slices to the matching CPU kernel. Failures name the operator and the
//! offending operand.

use std::ops::Range;

use parking_lot::RwLockReadGuard;
use strata_core::{runtime, DType, Device, HostBuffer, Result, StrataError, Tensor};

mod embedding;
mod linear;
mod rms_norm;
mod rope;
mod self_attention;

pub use embedding::embedding;
pub use linear::linear;
pub use rms_norm::rms_norm;
pub use rope::rope;
pub use self_attention::self_attention;

/// An operand paired with the name used in error messages.
pub(crate) type Named<'a> = (&'static str, &'a Tensor);

pub(crate) fn check_same_device(op: &'static str, reference: Named<'_>, others: &[Named<'_>]) -> Result<()> {
    let expected = reference.1.device();
    for &(operand, t) in others {
        if t.device() != expected {
            return Err(StrataError::DeviceMismatch {
                op,
                operand,
                expected,
                got: t.device(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_dtype(op: &'static str, (operand, t): Named<'_>, expected: DType) -> Result<()> {
    if t.dtype() != expected {
        return Err(StrataError::DTypeMismatch {
            op,
            operand,
            expected,
            got: t.dtype(),
        });
    }
    Ok(())
}

pub(crate) fn check_contiguous(op: &'static str, operands: &[Named<'_>]) -> Result<()> {
    match operands.iter().find(|(_, t)| !t.is_contiguous()) {
        Some(&(operand, _)) => Err(StrataError::NonContiguousOperand { op, operand }),
        None => Ok(()),
    }
}

pub(crate) fn check_rank(op: &'static str, (operand, t): Named<'_>, rank: usize) -> Result<()> {
    if t.ndim() != rank {
        return Err(StrataError::InvalidArgument {
            op,
            detail: format!("'{operand}' must be {rank}-D, got shape {:?}", t.dims()),
        });
    }
    Ok(())
}

pub(crate) fn check_shape(op: &'static str, (operand, t): Named<'_>, expected: &[usize]) -> Result<()> {
    if t.dims() != expected {
        return Err(StrataError::ShapeMismatch {
            op,
            operand,
            expected: expected.to_vec(),
            got: t.dims().to_vec(),
        });
    }
    Ok(())
}

/// Only host kernels live in this crate. A device with a registered
/// runtime is known but has no kernels here.
pub(crate) fn route(op: &'static str, device: Device) -> Result<()> {
    if device.is_cpu() {
        Ok(())
    } else if runtime::is_available(device) {
        Err(StrataError::NotImplemented(format!("{op} on {device}")))
    } else {
        Err(StrataError::UnsupportedDevice { device })
    }
}

/// Input bytes held for the duration of a kernel call.
pub(crate) enum InputBytes<'a> {
    Borrowed(RwLockReadGuard<'a, HostBuffer>, Range<usize>),
    Snapshot(HostBuffer),
}

impl InputBytes<'_> {
    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            InputBytes::Borrowed(guard, range) => &guard.as_bytes()[range.clone()],
            InputBytes::Snapshot(buf) => buf.as_bytes(),
        }
    }
}

/// Borrow an input's bytes, or copy them when `out` writes into the same
/// storage; the output's write lock could not be taken otherwise.
pub(crate) fn input_bytes<'a>(op: &'static str, out: &Tensor, (operand, t): Named<'a>) -> Result<InputBytes<'a>> {
    let range = t.data_range();
    if !t.shares_storage(out) {
        return Ok(InputBytes::Borrowed(t.storage().read(), range));
    }
    tracing::warn!(op, operand, bytes = range.len(), "output aliases input, snapshotting");
    let guard = t.storage().read();
    let snapshot = HostBuffer::from_bytes(&guard.as_bytes()[range.clone()]).map_err(|e| {
        StrataError::Allocation {
            device: t.device(),
            nbytes: range.len(),
            reason: e.to_string(),
        }
    })?;
    Ok(InputBytes::Snapshot(snapshot))
}
