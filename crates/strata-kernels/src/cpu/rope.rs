//! Rotary position embedding, half-split pairing.

use strata_core::{FloatElement, Result, StrataError};

use super::{check_len, for_each_row};

/// Rotate each `(j, j + d/2)` pair of every head by `pos * theta^(-2j/d)`.
///
/// `input`, `out`: [seqlen, nhead, d] with `d` even, `pos_ids`: [seqlen].
/// The angle is computed in f64; sin and cos are taken once per
/// (position, head, pair).
pub fn rope<T: FloatElement>(
    out: &mut [T],
    input: &[T],
    pos_ids: &[i64],
    theta: f32,
    seqlen: usize,
    nhead: usize,
    d: usize,
) -> Result<()> {
    if d % 2 != 0 {
        return Err(StrataError::InvalidArgument {
            op: "rope",
            detail: format!("head dimension must be even, got {d}"),
        });
    }
    check_len("rope", "pos_ids", seqlen, pos_ids.len())?;
    check_len("rope", "in", seqlen * nhead * d, input.len())?;
    check_len("rope", "out", input.len(), out.len())?;

    let half = d / 2;
    let theta = theta as f64;
    for_each_row(out, nhead * d, |s, row| {
        let pos = pos_ids[s] as f64;
        let src = &input[s * nhead * d..(s + 1) * nhead * d];
        for (head_out, head_in) in row.chunks_mut(d).zip(src.chunks(d)) {
            for j in 0..half {
                let angle = pos * theta.powf(-2.0 * j as f64 / d as f64);
                let (sin, cos) = (angle.sin() as f32, angle.cos() as f32);
                let a = head_in[j].to_working();
                let b = head_in[j + half].to_working();
                head_out[j] = T::from_working(a * cos - b * sin);
                head_out[j + half] = T::from_working(b * cos + a * sin);
            }
        }
    });
    Ok(())
}
