use strata_core::element::{cast_slice, cast_slice_mut};
use strata_core::{Result, Tensor};

use super::{check_contiguous, check_dtype, check_rank, check_same_device, check_shape, input_bytes, route};
use crate::{cpu, dispatch_float};

/// Normalize each row of `input` [rows, width] by its RMS and scale by
/// `weight` [width].
pub fn rms_norm(out: &Tensor, input: &Tensor, weight: &Tensor, eps: f32) -> Result<()> {
    const OP: &str = "rms_norm";
    let (out_, in_, weight_) = (("out", out), ("in", input), ("weight", weight));

    check_same_device(OP, out_, &[in_, weight_])?;
    check_dtype(OP, in_, out.dtype())?;
    check_dtype(OP, weight_, out.dtype())?;
    check_contiguous(OP, &[out_, in_, weight_])?;
    check_rank(OP, in_, 2)?;
    let (rows, width) = (input.dims()[0], input.dims()[1]);
    check_shape(OP, weight_, &[width])?;
    check_shape(OP, out_, &[rows, width])?;
    route(OP, out.device())?;

    tracing::debug!(op = OP, dtype = %out.dtype(), rows, width, eps, "dispatch");
    let in_bytes = input_bytes(OP, out, in_)?;
    let weight_bytes = input_bytes(OP, out, weight_)?;
    let mut guard = out.storage().write();
    let out_bytes = &mut guard.as_bytes_mut()[out.data_range()];

    dispatch_float!(out.dtype(), OP, T => cpu::rms_norm(
        cast_slice_mut::<T>(out_bytes)?,
        cast_slice::<T>(in_bytes.bytes())?,
        cast_slice::<T>(weight_bytes.bytes())?,
        width,
        eps,
    ))
}
