//! Causal scaled dot-product attention with grouped KV heads.

use strata_core::{FloatElement, Result, StrataError};

use super::{check_len, for_each_row};

/// Extents of one attention call.
///
/// q: [seqlen, nhead, d], k: [total_len, nkvhead, d],
/// v: [total_len, nkvhead, dv], out: [seqlen, nhead, dv].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttentionShape {
    pub seqlen: usize,
    pub nhead: usize,
    pub d: usize,
    pub total_len: usize,
    pub nkvhead: usize,
    pub dv: usize,
}

impl AttentionShape {
    /// Keys cached before the first query row.
    pub fn past_len(&self) -> usize {
        self.total_len - self.seqlen
    }

    /// Query heads sharing one KV head.
    pub fn group_size(&self) -> usize {
        self.nhead / self.nkvhead
    }

    /// KV head read by query head `h`.
    pub fn kv_head(&self, h: usize) -> usize {
        h / self.group_size()
    }

    pub fn validate(&self) -> Result<()> {
        if self.nkvhead == 0 || self.nhead % self.nkvhead != 0 {
            return Err(StrataError::InvalidHeadGrouping {
                nhead: self.nhead,
                nkvhead: self.nkvhead,
            });
        }
        if self.total_len < self.seqlen {
            return Err(StrataError::ShapeMismatch {
                op: "self_attention",
                operand: "k",
                expected: vec![self.seqlen, self.nkvhead, self.d],
                got: vec![self.total_len, self.nkvhead, self.d],
            });
        }
        Ok(())
    }
}

/// Row `i` of the queries attends to key rows `0..=past_len + i`.
///
/// Scores are `scale * q·k`, normalized with a max-subtracted softmax over
/// the visible keys; masked keys contribute exactly zero.
pub fn self_attention<T: FloatElement>(
    out: &mut [T],
    q: &[T],
    k: &[T],
    v: &[T],
    scale: f32,
    shape: AttentionShape,
) -> Result<()> {
    shape.validate()?;
    let AttentionShape {
        seqlen,
        nhead,
        d,
        total_len,
        nkvhead,
        dv,
    } = shape;
    check_len("self_attention", "q", seqlen * nhead * d, q.len())?;
    check_len("self_attention", "k", total_len * nkvhead * d, k.len())?;
    check_len("self_attention", "v", total_len * nkvhead * dv, v.len())?;
    check_len("self_attention", "attn_val", seqlen * nhead * dv, out.len())?;

    let past = shape.past_len();
    for_each_row(out, nhead * dv, |i, row| {
        let visible = past + i + 1;
        let mut probs = vec![0.0f32; visible];
        let mut acc = vec![0.0f32; dv];
        for h in 0..nhead {
            let kv = shape.kv_head(h);
            let qh = &q[(i * nhead + h) * d..][..d];

            let mut max = f32::NEG_INFINITY;
            for (j, p) in probs.iter_mut().enumerate() {
                let kh = &k[(j * nkvhead + kv) * d..][..d];
                let dot: f32 = qh
                    .iter()
                    .zip(kh)
                    .map(|(a, b)| a.to_working() * b.to_working())
                    .sum();
                *p = dot * scale;
                max = max.max(*p);
            }
            let mut sum = 0.0f32;
            for p in probs.iter_mut() {
                *p = (*p - max).exp();
                sum += *p;
            }

            acc.fill(0.0);
            for (j, p) in probs.iter().enumerate() {
                let w = p / sum;
                let vh = &v[(j * nkvhead + kv) * dv..][..dv];
                for (a, x) in acc.iter_mut().zip(vh) {
                    *a += w * x.to_working();
                }
            }
            for (o, a) in row[h * dv..(h + 1) * dv].iter_mut().zip(&acc) {
                *o = T::from_working(*a);
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::assert_close;
    use half::f16;

    fn shape(seqlen: usize, nhead: usize, total_len: usize, nkvhead: usize, d: usize) -> AttentionShape {
        AttentionShape {
            seqlen,
            nhead,
            d,
            total_len,
            nkvhead,
            dv: d,
        }
    }

    #[test]
    fn test_uniform_inputs() {
        let s = shape(3, 2, 3, 2, 4);
        let ones = vec![1.0f32; 24];
        let mut out = vec![0.0f32; 24];
        self_attention(&mut out, &ones, &ones, &ones, 0.5, s).unwrap();
        assert_close(&out, &ones, 1e-6);
    }

    #[test]
    fn test_first_row_sees_only_itself() {
        // seqlen == total: row 0 attends to key 0 alone
        let s = shape(3, 1, 3, 1, 2);
        let q = vec![1.0f32; 6];
        let k = vec![1.0f32; 6];
        let v = vec![1.0f32, 2.0, 1e30, 1e30, f32::MAX, f32::MAX];
        let mut out = vec![0.0f32; 6];
        self_attention(&mut out, &q, &k, &v, 1.0, s).unwrap();
        assert_eq!(&out[..2], &[1.0, 2.0]);
    }

    #[test]
    fn test_decode_step_sees_all_keys() {
        // seqlen 1, total 3: past = 2, the single query sees all three keys
        let s = shape(1, 1, 3, 1, 1);
        let q = [0.0f32];
        let k = [1.0f32, 2.0, 3.0];
        let v = [3.0f32, 6.0, 9.0];
        let mut out = [0.0f32];
        self_attention(&mut out, &q, &k, &v, 1.0, s).unwrap();
        // zero query gives equal weights
        assert_close(&out, &[6.0], 1e-5);
    }

    #[test]
    fn test_softmax_weights() {
        let s = shape(1, 1, 2, 1, 1);
        let q = [1.0f32];
        let k = [0.0f32, 2f32.ln()];
        let v = [0.0f32, 3.0];
        let mut out = [0.0f32];
        self_attention(&mut out, &q, &k, &v, 1.0, s).unwrap();
        // weights 1/3 and 2/3
        assert_close(&out, &[2.0], 1e-5);
    }

    #[test]
    fn test_large_scores_stay_finite() {
        let s = shape(1, 1, 2, 1, 1);
        let mut out = [0.0f32];
        self_attention(&mut out, &[100.0], &[100.0, 99.0], &[1.0, 1.0], 1.0, s).unwrap();
        assert_close(&out, &[1.0], 1e-6);
    }

    #[test]
    fn test_grouped_heads_read_shared_kv() {
        // 4 query heads over 2 kv heads; kv head values are 10 and 20
        let s = shape(1, 4, 1, 2, 1);
        let q = vec![1.0f32; 4];
        let k = vec![1.0f32; 2];
        let v = vec![10.0f32, 20.0];
        let mut out = vec![0.0f32; 4];
        self_attention(&mut out, &q, &k, &v, 1.0, s).unwrap();
        assert_eq!(out, vec![10.0, 10.0, 20.0, 20.0]);
        assert_eq!((0..4).map(|h| s.kv_head(h)).collect::<Vec<_>>(), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_value_width_differs_from_key_width() {
        let s = AttentionShape {
            seqlen: 1,
            nhead: 1,
            d: 2,
            total_len: 1,
            nkvhead: 1,
            dv: 3,
        };
        let mut out = [0.0f32; 3];
        self_attention(&mut out, &[1.0, 1.0], &[1.0, 1.0], &[1.0, 2.0, 3.0], 0.1, s).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_f16() {
        let s = shape(1, 1, 2, 1, 1);
        let h = |v: &[f32]| v.iter().map(|&x| f16::from_f32(x)).collect::<Vec<_>>();
        let mut out = vec![f16::ZERO; 1];
        self_attention(&mut out, &h(&[0.0]), &h(&[1.0, 2.0]), &h(&[2.0, 4.0]), 1.0, s).unwrap();
        assert!((out[0].to_f32() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_bad_head_grouping() {
        let mut out = [0.0f32; 3];
        for (nhead, nkvhead) in [(3, 2), (3, 0)] {
            let s = shape(1, nhead, 1, nkvhead, 1);
            let err = self_attention(&mut out, &[0.0; 3], &[], &[], 1.0, s).unwrap_err();
            assert_eq!(err, StrataError::InvalidHeadGrouping { nhead, nkvhead });
        }
    }

    #[test]
    fn test_fewer_keys_than_queries() {
        let s = shape(2, 1, 1, 1, 1);
        let mut out = [0.0f32; 2];
        let err = self_attention(&mut out, &[0.0; 2], &[0.0], &[0.0], 1.0, s).unwrap_err();
        assert!(matches!(err, StrataError::ShapeMismatch { operand: "k", .. }));
    }
}
