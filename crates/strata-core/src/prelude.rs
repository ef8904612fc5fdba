//! Convenience re-exports for common strata-core types.
//!
//! ```rust
//! use strata_core::prelude::*;
//! ```

pub use crate::DType;
pub use crate::Device;
pub use crate::Result;
pub use crate::Shape;
pub use crate::StrataError;
pub use crate::Tensor;
pub use crate::{Element, FloatElement};
