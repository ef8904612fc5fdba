use strata_core::element::{cast_slice, cast_slice_mut};
use strata_core::{DType, Result, Tensor};

use super::{check_contiguous, check_dtype, check_rank, check_same_device, check_shape, input_bytes, route};
use crate::{cpu, dispatch_float};

/// Rotary position embedding of `input` [seqlen, nhead, d] at the
/// positions in `pos_ids` [seqlen] (i64).
///
/// `out` may be `input` itself.
pub fn rope(out: &Tensor, input: &Tensor, pos_ids: &Tensor, theta: f32) -> Result<()> {
    const OP: &str = "rope";
    let (out_, in_, pos_) = (("out", out), ("in", input), ("pos_ids", pos_ids));

    check_same_device(OP, out_, &[in_, pos_])?;
    check_dtype(OP, in_, out.dtype())?;
    check_dtype(OP, pos_, DType::I64)?;
    check_contiguous(OP, &[out_, in_, pos_])?;
    check_rank(OP, in_, 3)?;
    let (seqlen, nhead, d) = (input.dims()[0], input.dims()[1], input.dims()[2]);
    check_shape(OP, pos_, &[seqlen])?;
    check_shape(OP, out_, input.dims())?;
    route(OP, out.device())?;

    tracing::debug!(op = OP, dtype = %out.dtype(), seqlen, nhead, d, theta, "dispatch");
    let in_bytes = input_bytes(OP, out, in_)?;
    let pos_bytes = input_bytes(OP, out, pos_)?;
    let mut guard = out.storage().write();
    let out_bytes = &mut guard.as_bytes_mut()[out.data_range()];
    let positions = cast_slice::<i64>(pos_bytes.bytes())?;

    dispatch_float!(out.dtype(), OP, T => cpu::rope(
        cast_slice_mut::<T>(out_bytes)?,
        cast_slice::<T>(in_bytes.bytes())?,
        positions,
        theta,
        seqlen,
        nhead,
        d,
    ))
}
