//! Runtime dtype tag → generic kernel instantiation.
//!
//! The set of kernel scalar kinds is closed: [`KERNEL_DTYPES`] and the arms
//! of [`dispatch_float!`](crate::dispatch_float) are the only places to
//! touch when adding one.

use strata_core::DType;

/// Tags with a kernel instantiation.
pub const KERNEL_DTYPES: [DType; 3] = [DType::F32, DType::F16, DType::BF16];

/// Whether kernels accept `dtype`.
pub fn is_kernel_dtype(dtype: DType) -> bool {
    KERNEL_DTYPES.contains(&dtype)
}

/// Expand `$body` once per kernel scalar kind, with `$T` bound to the Rust
/// type matching `$dtype`. Any other tag evaluates to
/// `Err(StrataError::UnsupportedDType { op: $op, .. })`.
///
/// ```
/// use strata_core::{DType, Result};
/// use strata_kernels::dispatch_float;
///
/// fn width_of(dtype: DType) -> Result<usize> {
///     dispatch_float!(dtype, "width_of", T => Ok(std::mem::size_of::<T>()))
/// }
/// assert_eq!(width_of(DType::BF16).unwrap(), 2);
/// assert!(width_of(DType::I64).is_err());
/// ```
#[macro_export]
macro_rules! dispatch_float {
    ($dtype:expr, $op:expr, $T:ident => $body:expr) => {
        match $dtype {
            ::strata_core::DType::F32 => {
                type $T = f32;
                $body
            }
            ::strata_core::DType::F16 => {
                type $T = ::half::f16;
                $body
            }
            ::strata_core::DType::BF16 => {
                type $T = ::half::bf16;
                $body
            }
            other => Err(::strata_core::StrataError::UnsupportedDType {
                op: $op,
                dtype: other,
            }),
        }
    };
}
