//! Row gather from an embedding table.

use strata_core::{Element, Result, StrataError};

use super::{check_len, for_each_row};

/// `out[i, :] = weight[index[i], :]`, copied verbatim.
///
/// `weight`: [vocab, width], `index`: [n], `out`: [n, width].
/// Every index is checked against `vocab` before anything is written.
pub fn embedding<T: Element>(
    out: &mut [T],
    index: &[i64],
    weight: &[T],
    vocab: usize,
    width: usize,
) -> Result<()> {
    check_len("embedding", "weight", vocab * width, weight.len())?;
    check_len("embedding", "out", index.len() * width, out.len())?;
    if let Some(&bad) = index
        .iter()
        .find(|&&idx| idx < 0 || idx as u64 >= vocab as u64)
    {
        return Err(StrataError::IndexOutOfRange {
            context: "embedding index",
            index: bad,
            bound: vocab,
        });
    }

    for_each_row(out, width, |i, row| {
        let src = index[i] as usize * width;
        row.copy_from_slice(&weight[src..src + width]);
    });
    Ok(())
}
