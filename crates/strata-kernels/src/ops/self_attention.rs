use strata_core::element::{cast_slice, cast_slice_mut};
use strata_core::{Result, Tensor};

use super::{check_contiguous, check_dtype, check_rank, check_same_device, check_shape, input_bytes, route};
use crate::cpu::{self, AttentionShape};
use crate::dispatch_float;

/// Causal attention of `q` [seqlen, nhead, d] over `k` [total_len, nkvhead, d]
/// and `v` [total_len, nkvhead, dv] into `attn_val` [seqlen, nhead, dv].
///
/// The first `total_len - seqlen` key rows are treated as cached context
/// visible to every query row.
pub fn self_attention(attn_val: &Tensor, q: &Tensor, k: &Tensor, v: &Tensor, scale: f32) -> Result<()> {
    const OP: &str = "self_attention";
    let (out_, q_, k_, v_) = (("attn_val", attn_val), ("q", q), ("k", k), ("v", v));

    check_same_device(OP, out_, &[q_, k_, v_])?;
    for operand in [q_, k_, v_] {
        check_dtype(OP, operand, attn_val.dtype())?;
    }
    check_contiguous(OP, &[out_, q_, k_, v_])?;
    for operand in [q_, k_, v_] {
        check_rank(OP, operand, 3)?;
    }
    let shape = AttentionShape {
        seqlen: q.dims()[0],
        nhead: q.dims()[1],
        d: q.dims()[2],
        total_len: k.dims()[0],
        nkvhead: k.dims()[1],
        dv: v.dims()[2],
    };
    check_shape(OP, k_, &[shape.total_len, shape.nkvhead, shape.d])?;
    check_shape(OP, v_, &[shape.total_len, shape.nkvhead, shape.dv])?;
    check_shape(OP, out_, &[shape.seqlen, shape.nhead, shape.dv])?;
    shape.validate()?;
    route(OP, attn_val.device())?;

    tracing::debug!(op = OP, dtype = %attn_val.dtype(), ?shape, scale, "dispatch");
    let q_bytes = input_bytes(OP, attn_val, q_)?;
    let k_bytes = input_bytes(OP, attn_val, k_)?;
    let v_bytes = input_bytes(OP, attn_val, v_)?;
    let mut guard = attn_val.storage().write();
    let out_bytes = &mut guard.as_bytes_mut()[attn_val.data_range()];

    dispatch_float!(attn_val.dtype(), OP, T => cpu::self_attention(
        cast_slice_mut::<T>(out_bytes)?,
        cast_slice::<T>(q_bytes.bytes())?,
        cast_slice::<T>(k_bytes.bytes())?,
        cast_slice::<T>(v_bytes.bytes())?,
        scale,
        shape,
    ))
}
