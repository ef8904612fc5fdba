//! CPU kernels on contiguous row-major slices.
//!
//! Every kernel is generic over the element type and computes in `f32`.
//! Output rows are independent, so [`for_each_row`] may hand them to the
//! rayon pool; the result is the same either way.

use rayon::prelude::*;
use strata_core::{Result, StrataError};

use crate::config;

mod embedding;
mod linear;
mod rms_norm;
mod rope;
mod self_attention;

pub use embedding::embedding;
pub use linear::linear;
pub use rms_norm::rms_norm;
pub use rope::rope;
pub use self_attention::{self_attention, AttentionShape};

/// Run `f(row_index, row)` over consecutive `row_len`-sized chunks of `out`.
pub(crate) fn for_each_row<T, F>(out: &mut [T], row_len: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 || out.is_empty() {
        return;
    }
    let rows = out.len() / row_len;
    if config::config().use_parallel(rows) {
        out.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    } else {
        out.chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| f(i, row));
    }
}

/// Slice length guard so kernels never index past a buffer.
pub(crate) fn check_len(
    op: &'static str,
    operand: &'static str,
    expected: usize,
    got: usize,
) -> Result<()> {
    if expected != got {
        return Err(StrataError::ShapeMismatch {
            op,
            operand,
            expected: vec![expected],
            got: vec![got],
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() <= tol, "index {i}: {a} vs {e} (tol {tol})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_row_visits_every_row_once() {
        let mut out = vec![0usize; 12];
        for_each_row(&mut out, 3, |i, row| row.iter_mut().for_each(|x| *x += i + 1));
        assert_eq!(out, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }

    #[test]
    fn test_for_each_row_empty_rows() {
        let mut out: Vec<f32> = Vec::new();
        for_each_row(&mut out, 0, |_, _| panic!("no rows"));
        for_each_row(&mut out, 4, |_, _| panic!("no rows"));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("op", "x", 4, 4).is_ok());
        assert_eq!(
            check_len("op", "x", 4, 3).unwrap_err(),
            StrataError::ShapeMismatch {
                op: "op",
                operand: "x",
                expected: vec![4],
                got: vec![3],
            }
        );
    }
}
