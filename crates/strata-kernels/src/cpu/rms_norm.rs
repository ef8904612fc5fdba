//! RMS normalization over the last axis.

use strata_core::{FloatElement, Result, StrataError};

use super::{check_len, for_each_row};

/// `out[i, j] = weight[j] * input[i, j] / sqrt(mean(input[i, :]²) + eps)`
///
/// `input`, `out`: [rows, width], `weight`: [width]. `eps` must be a
/// non-negative number.
pub fn rms_norm<T: FloatElement>(
    out: &mut [T],
    input: &[T],
    weight: &[T],
    width: usize,
    eps: f32,
) -> Result<()> {
    if eps.is_nan() || eps < 0.0 {
        return Err(StrataError::InvalidArgument {
            op: "rms_norm",
            detail: format!("eps must be >= 0, got {eps}"),
        });
    }
    check_len("rms_norm", "weight", width, weight.len())?;
    let rows = input.len().checked_div(width).unwrap_or(0);
    check_len("rms_norm", "in", rows * width, input.len())?;
    check_len("rms_norm", "out", input.len(), out.len())?;

    for_each_row(out, width, |i, row| {
        let x = &input[i * width..(i + 1) * width];
        let sum_sq: f32 = x
            .iter()
            .map(|v| {
                let v = v.to_working();
                v * v
            })
            .sum();
        let inv_rms = 1.0 / (sum_sq / width as f32 + eps).sqrt();
        for ((o, xv), wv) in row.iter_mut().zip(x).zip(weight) {
            *o = T::from_working(wv.to_working() * xv.to_working() * inv_rms);
        }
    });
    Ok(())
}
