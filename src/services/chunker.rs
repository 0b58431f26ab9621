use crate::model::unit::TranslationUnit;
use crate::model::work::Batch;

/// Splits units into batches of at most `max_units` units whose running
/// character estimate stays within `max_chars`.
///
/// `indices` selects the units of `units` to batch, in order. Packing is
/// greedy, left to right, without reordering; a unit bigger than `max_chars`
/// gets a batch of its own. Batch `k` (1-based) starts at ordinal
/// `(k - 1) * max_units + 1` regardless of how full earlier batches were.
pub fn chunk(
    units: &[TranslationUnit],
    indices: &[usize],
    max_units: usize,
    max_chars: usize,
) -> Vec<Batch> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut cur: Vec<usize> = Vec::with_capacity(max_units);
    let mut cur_chars = 0usize;

    for &idx in indices {
        let est = units[idx].char_estimate();

        if !cur.is_empty() && (cur.len() >= max_units || cur_chars + est > max_chars) {
            groups.push(std::mem::take(&mut cur));
            cur_chars = 0;
        }

        cur.push(idx);
        cur_chars += est;
    }

    if !cur.is_empty() {
        groups.push(cur);
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(k, units)| Batch {
            units,
            start: k * max_units + 1,
        })
        .collect()
}
