//! Coverage pooling: pick the candidates that dominate the most cells.
//!
//! Instead of minimizing color distance, this reducer works on the
//! [`CoverageMatrix`] of a quantized source image and keeps the subset of
//! candidates maximizing the total covered area, where each cell only credits
//! its best kept candidate. The subset is found by substitution search: seed
//! with the first `k` candidates, then try swapping in each later candidate
//! for each kept one, applying the best strict improvement.

use crate::{
    distance::Selection,
    resize::CoverageMatrix,
    TargetColors,
};
use tracing::{debug, trace};

/// The outcome of a coverage pooling reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOutput {
    /// The surviving candidates.
    pub selection: Selection,
    /// For each cell, the kept candidate covering the most of it.
    pub indices: Vec<u8>,
    /// The total area credited to the kept candidates.
    pub total_coverage: f64,
}

/// The total area covered when only `selected` candidates are kept.
fn total_coverage(coverage: &CoverageMatrix, selected: &[usize]) -> f64 {
    (0..coverage.num_cells())
        .map(|cell| {
            let row = coverage.row(cell);
            selected
                .iter()
                .map(|&i| row[i])
                .fold(0.0, f64::max)
        })
        .sum()
}

/// For each cell, the selected candidate covering the most of it.
/// Ties go to the lowest candidate index.
fn assign(coverage: &CoverageMatrix, selected: &[usize]) -> Vec<u8> {
    (0..coverage.num_cells())
        .map(|cell| {
            let row = coverage.row(cell);
            let mut best = (selected[0], row[selected[0]]);
            for &i in &selected[1..] {
                if row[i] > best.1 || (row[i] == best.1 && i < best.0) {
                    best = (i, row[i]);
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            let index = best.0 as u8;
            index
        })
        .collect()
}

/// Reduces the candidates to at most `k` by maximizing total covered area.
///
/// A `k` of zero returns an empty pool: no active candidates,
/// no cell assignments, and zero coverage.
#[must_use]
pub fn pool(coverage: &CoverageMatrix, k: TargetColors) -> PoolOutput {
    let n = coverage.num_candidates();
    let k = usize::from(k.into_inner()).min(n);

    // a zero target keeps nothing and assigns nothing
    if k == 0 {
        let mut selection = Selection::all_active(n);
        for i in 0..n {
            selection.deactivate(i);
        }
        return PoolOutput { selection, indices: Vec::new(), total_coverage: 0.0 };
    }

    let solo = (0..n)
        .map(|i| (0..coverage.num_cells()).map(|cell| coverage.score(cell, i)).sum::<f64>())
        .collect::<Vec<_>>();

    let mut selected = (0..k).collect::<Vec<_>>();
    let mut best_total = total_coverage(coverage, &selected);

    for i in k..n {
        // a candidate covering nothing can never improve the pool
        if solo[i] == 0.0 {
            continue;
        }

        let mut swap = None;
        for position in 0..selected.len() {
            let previous = selected[position];
            selected[position] = i;
            let total = total_coverage(coverage, &selected);
            selected[position] = previous;

            if total > best_total {
                best_total = total;
                swap = Some(position);
            }
        }

        if let Some(position) = swap {
            trace!(candidate = i, replaced = selected[position], "coverage swap");
            selected[position] = i;
        }
    }

    selected.sort_unstable();
    debug!(kept = ?selected, total = best_total, "coverage pooling finished");

    let mut selection = Selection::all_active(n);
    for i in (0..n).filter(|i| !selected.contains(i)) {
        selection.deactivate(i);
    }

    PoolOutput {
        selection,
        indices: assign(coverage, &selected),
        total_coverage: best_total,
    }
}
