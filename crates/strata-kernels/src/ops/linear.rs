use strata_core::element::{cast_slice, cast_slice_mut};
use strata_core::{Result, Tensor};

use super::{check_contiguous, check_dtype, check_rank, check_same_device, check_shape, input_bytes, route, Named};
use crate::{cpu, dispatch_float};

/// `out [rows, out_features] = input [rows, in_features] · weightᵀ + bias`.
///
/// `weight` is [out_features, in_features]; `bias`, when present, is
/// [out_features].
pub fn linear(out: &Tensor, input: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<()> {
    const OP: &str = "linear";
    let (out_, in_, weight_) = (("out", out), ("in", input), ("weight", weight));
    let bias_: Option<Named<'_>> = bias.map(|b| ("bias", b));
    let operands: Vec<Named<'_>> = [in_, weight_].into_iter().chain(bias_).collect();

    check_same_device(OP, out_, &operands)?;
    for &operand in &operands {
        check_dtype(OP, operand, out.dtype())?;
    }
    check_contiguous(OP, &[&[out_][..], &operands[..]].concat())?;
    check_rank(OP, in_, 2)?;
    check_rank(OP, weight_, 2)?;
    let (rows, in_features) = (input.dims()[0], input.dims()[1]);
    let out_features = weight.dims()[0];
    check_shape(OP, weight_, &[out_features, in_features])?;
    if let Some(b) = bias_ {
        check_shape(OP, b, &[out_features])?;
    }
    check_shape(OP, out_, &[rows, out_features])?;
    route(OP, out.device())?;

    tracing::debug!(
        op = OP,
        dtype = %out.dtype(),
        rows,
        in_features,
        out_features,
        bias = bias.is_some(),
        "dispatch"
    );
    let in_bytes = input_bytes(OP, out, in_)?;
    let weight_bytes = input_bytes(OP, out, weight_)?;
    let bias_bytes = bias_.map(|b| input_bytes(OP, out, b)).transpose()?;
    let mut guard = out.storage().write();
    let out_bytes = &mut guard.as_bytes_mut()[out.data_range()];

    dispatch_float!(out.dtype(), OP, T => {
        let bias = bias_bytes.as_ref().map(|b| cast_slice::<T>(b.bytes())).transpose()?;
        cpu::linear(
            cast_slice_mut::<T>(out_bytes)?,
            cast_slice::<T>(in_bytes.bytes())?,
            cast_slice::<T>(weight_bytes.bytes())?,
            bias,
            rows,
            in_features,
            out_features,
        )
    })
}
