//! Error type shared by the view layer and the operator layer.

use crate::{DType, Device};

/// Errors reported by tensor construction, view algebra and operators.
///
/// Every variant is a caller-contract violation or an unsupported
/// configuration; none are transient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrataError {
    #[error("{op}: device mismatch on '{operand}': expected {expected}, got {got}")]
    DeviceMismatch {
        op: &'static str,
        operand: &'static str,
        expected: Device,
        got: Device,
    },

    #[error("{op}: dtype mismatch on '{operand}': expected {expected}, got {got}")]
    DTypeMismatch {
        op: &'static str,
        operand: &'static str,
        expected: DType,
        got: DType,
    },

    #[error("{op}: non-contiguous operand '{operand}' unsupported")]
    NonContiguousOperand {
        op: &'static str,
        operand: &'static str,
    },

    #[error("{op}: unsupported data type {dtype}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    #[error("unsupported device type {device}")]
    UnsupportedDevice { device: Device },

    #[error("cannot view shape {shape:?} as {target:?}: {reason}")]
    InvalidShapeForView {
        shape: Vec<usize>,
        target: Vec<usize>,
        reason: &'static str,
    },

    #[error("{context}: index {index} out of range [0, {bound})")]
    IndexOutOfRange {
        context: &'static str,
        index: i64,
        bound: usize,
    },

    #[error("invalid head grouping: nhead={nhead} is not a multiple of nkvhead={nkvhead}")]
    InvalidHeadGrouping { nhead: usize, nkvhead: usize },

    #[error("axis {axis} out of range for {ndim}-D tensor")]
    InvalidAxis { axis: usize, ndim: usize },

    #[error("{order:?} is not a permutation of 0..{ndim}")]
    InvalidPermutation { order: Vec<usize>, ndim: usize },

    #[error("{op}: shape mismatch on '{operand}': expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        op: &'static str,
        operand: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("{op}: invalid argument: {detail}")]
    InvalidArgument { op: &'static str, detail: String },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("view needs {required} bytes of storage, only {available} available")]
    StorageTooSmall { required: usize, available: usize },

    #[error("allocation of {nbytes} bytes on {device} failed: {reason}")]
    Allocation {
        device: Device,
        nbytes: usize,
        reason: String,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),
}
