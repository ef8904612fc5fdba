//! Dense projection `out = in · Wᵀ + b`.

use strata_core::{FloatElement, Result};

use super::{check_len, for_each_row};

/// `out[i, j] = bias[j] + Σ_k input[i, k] * weight[j, k]`, accumulated in f32.
///
/// `input`: [rows, in_features], `weight`: [out_features, in_features],
/// `bias`: [out_features] or absent, `out`: [rows, out_features].
pub fn linear<T: FloatElement>(
    out: &mut [T],
    input: &[T],
    weight: &[T],
    bias: Option<&[T]>,
    rows: usize,
    in_features: usize,
    out_features: usize,
) -> Result<()> {
    check_len("linear", "in", rows * in_features, input.len())?;
    check_len("linear", "weight", out_features * in_features, weight.len())?;
    check_len("linear", "out", rows * out_features, out.len())?;
    if let Some(b) = bias {
        check_len("linear", "bias", out_features, b.len())?;
    }

    for_each_row(out, out_features, |i, row| {
        let x = &input[i * in_features..(i + 1) * in_features];
        for (j, o) in row.iter_mut().enumerate() {
            let w = &weight[j * in_features..(j + 1) * in_features];
            let mut acc = bias.map_or(0.0, |b| b[j].to_working());
            for (xv, wv) in x.iter().zip(w) {
                acc += xv.to_working() * wv.to_working();
            }
            *o = T::from_working(acc);
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::assert_close;
    use half::f16;

    #[test]
    fn test_linear_with_bias() {
        // in [2, 3], weight [2, 3]
        let input = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let weight = [1.0f32, 0.0, -1.0, 0.5, 0.5, 0.5];
        let bias = [10.0f32, -1.0];
        let mut out = [0.0f32; 4];
        linear(&mut out, &input, &weight, Some(&bias), 2, 3, 2).unwrap();
        assert_close(&out, &[8.0, 2.0, 8.0, 6.5], 1e-6);
    }

    #[test]
    fn test_linear_without_bias() {
        let input = [1.0f32, 2.0];
        let weight = [3.0f32, 4.0];
        let mut out = [0.0f32; 1];
        linear(&mut out, &input, &weight, None, 1, 2, 1).unwrap();
        assert_eq!(out, [11.0]);
    }

    #[test]
    fn test_linear_zero_inner_dim_yields_bias() {
        let mut out = [f32::NAN; 2];
        linear(&mut out, &[], &[], Some(&[1.5, -2.0]), 1, 0, 2).unwrap();
        assert_eq!(out, [1.5, -2.0]);
    }

    #[test]
    fn test_linear_f16() {
        let h = |v: &[f32]| v.iter().map(|&x| f16::from_f32(x)).collect::<Vec<_>>();
        let input = h(&[0.5, 0.25]);
        let weight = h(&[2.0, 4.0, -2.0, 0.0]);
        let mut out = vec![f16::ZERO; 2];
        linear(&mut out, &input, &weight, None, 1, 2, 2).unwrap();
        let got: Vec<f32> = out.iter().map(|v| v.to_f32()).collect();
        assert_close(&got, &[2.0, -1.0], 1e-3);
    }

    #[test]
    fn test_linear_rejects_short_bias() {
        let mut out = [0.0f32; 2];
        let err = linear(&mut out, &[1.0], &[1.0, 1.0], Some(&[0.0]), 1, 1, 2).unwrap_err();
        assert!(err.to_string().contains("bias"));
    }
}
