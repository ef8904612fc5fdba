//! Host scalar types that map onto a [`DType`] tag.
//!
//! [`Element`] ties a Rust type to its tag for typed reads and writes.
//! [`FloatElement`] adds the working-precision conversion used by kernels:
//! reduced-precision values are widened to `f32` before arithmetic and
//! narrowed on write.

use half::{bf16, f16};

use crate::{DType, Result, StrataError};

/// A plain-old-data scalar stored in tensor buffers.
pub trait Element: bytemuck::Pod + Send + Sync + std::fmt::Debug + 'static {
    const DTYPE: DType;
}

/// A kernel scalar kind with an `f32` working representation.
pub trait FloatElement: Element {
    fn to_working(self) -> f32;
    fn from_working(v: f32) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element!(
    f32 => F32,
    f64 => F64,
    f16 => F16,
    bf16 => BF16,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

/// Reinterpret element-aligned bytes as a typed slice.
pub fn cast_slice<T: Element>(bytes: &[u8]) -> Result<&[T]> {
    bytemuck::try_cast_slice(bytes).map_err(|e| StrataError::InvalidArgument {
        op: "cast_slice",
        detail: format!("{e:?} reading {} bytes as {}", bytes.len(), T::DTYPE),
    })
}

/// Mutable counterpart of [`cast_slice`].
pub fn cast_slice_mut<T: Element>(bytes: &mut [u8]) -> Result<&mut [T]> {
    let len = bytes.len();
    bytemuck::try_cast_slice_mut(bytes).map_err(|e| StrataError::InvalidArgument {
        op: "cast_slice_mut",
        detail: format!("{e:?} writing {len} bytes as {}", T::DTYPE),
    })
}

impl FloatElement for f32 {
    #[inline]
    fn to_working(self) -> f32 {
        self
    }

    #[inline]
    fn from_working(v: f32) -> Self {
        v
    }
}

impl FloatElement for f16 {
    #[inline]
    fn to_working(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn from_working(v: f32) -> Self {
        f16::from_f32(v)
    }
}

impl FloatElement for bf16 {
    #[inline]
    fn to_working(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn from_working(v: f32) -> Self {
        bf16::from_f32(v)
    }
}
