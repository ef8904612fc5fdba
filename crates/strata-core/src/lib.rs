//! # strata-core
//!
//! Strided tensor views over shared, device-tagged storage.
//!
//! Provides:
//! - [`Tensor`]: `(dtype, shape, strides, byte offset)` over a shared [`Storage`]
//! - Zero-copy view algebra (permute, slice, view_as) and the contiguity test
//! - [`DType`] tags with f16/bf16 encode/decode through [`element::FloatElement`]
//! - A pluggable [`runtime`] boundary for allocation and synchronous copies

pub mod device;
pub mod dtype;
pub mod element;
pub mod error;
pub mod runtime;
pub mod shape;
pub mod storage;
pub mod tensor;
pub mod view;
pub mod prelude;

pub use device::{Device, DeviceType};
pub use dtype::DType;
pub use element::{Element, FloatElement};
pub use error::StrataError;
pub use shape::{Shape, Strides};
pub use storage::{HostBuffer, Storage};
pub use tensor::{Tensor, TensorMeta};

pub type Result<T> = std::result::Result<T, StrataError>;
