use strata_core::element::{cast_slice, cast_slice_mut};
use strata_core::{DType, Result, Tensor};

use super::{check_contiguous, check_dtype, check_rank, check_same_device, check_shape, input_bytes, route};
use crate::{cpu, dispatch_float};

/// Gather rows of `weight` [vocab, width] selected by `index` [n] (i64)
/// into `out` [n, width].
pub fn embedding(out: &Tensor, index: &Tensor, weight: &Tensor) -> Result<()> {
    const OP: &str = "embedding";
    let (out_, index_, weight_) = (("out", out), ("index", index), ("weight", weight));

    check_same_device(OP, out_, &[index_, weight_])?;
    check_dtype(OP, index_, DType::I64)?;
    check_dtype(OP, weight_, out.dtype())?;
    check_contiguous(OP, &[out_, index_, weight_])?;
    check_rank(OP, index_, 1)?;
    check_rank(OP, weight_, 2)?;
    let (n, vocab, width) = (index.dims()[0], weight.dims()[0], weight.dims()[1]);
    check_shape(OP, out_, &[n, width])?;
    route(OP, out.device())?;

    tracing::debug!(op = OP, dtype = %out.dtype(), n, vocab, width, "dispatch");
    let index_bytes = input_bytes(OP, out, index_)?;
    let weight_bytes = input_bytes(OP, out, weight_)?;
    let mut guard = out.storage().write();
    let out_bytes = &mut guard.as_bytes_mut()[out.data_range()];
    let ids = cast_slice::<i64>(index_bytes.bytes())?;

    dispatch_float!(out.dtype(), OP, T => cpu::embedding(
        cast_slice_mut::<T>(out_bytes)?,
        ids,
        cast_slice::<T>(weight_bytes.bytes())?,
        vocab,
        width,
    ))
}
