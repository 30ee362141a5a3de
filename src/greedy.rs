//! Greedy backward elimination of palette candidates.
//!
//! All candidates start active. Each round assigns every pixel to its nearest
//! active candidate, drops every candidate that received no pixels, and then,
//! if still above the target, drops the least-used one. Removal never
//! reactivates a candidate, so the error is monotonically non-decreasing
//! round over round and the loop always terminates.

use crate::{
    distance::{DistanceMatrix, Selection},
    TargetColors,
};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use tracing::{debug, trace};

/// The outcome of a palette reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduction {
    /// The surviving candidates.
    pub selection: Selection,
    /// For each pixel, the candidate index it is assigned to.
    pub indices: Vec<u8>,
    /// The sum of squared CIELAB distances over all pixels under `indices`.
    pub total_error: f64,
}

/// One full nearest-candidate assignment pass.
struct Assignment {
    /// For each pixel, the candidate index it is assigned to.
    indices: Vec<u8>,
    /// The weighted number of pixels assigned to each candidate.
    tallies: Vec<u64>,
    /// The weighted sum of assigned squared distances.
    total_error: f64,
}

fn tally(
    matrix: &DistanceMatrix,
    counts: Option<&[u32]>,
    nearest: Vec<(u8, f32)>,
) -> Assignment {
    let mut tallies = vec![0; matrix.num_candidates()];
    let mut total_error = 0.0;
    let mut indices = Vec::with_capacity(nearest.len());

    for (pixel, (index, dist)) in nearest.into_iter().enumerate() {
        let weight = counts.map_or(1, |c| c[pixel]);
        tallies[usize::from(index)] += u64::from(weight);
        total_error += f64::from(dist) * f64::from(weight);
        indices.push(index);
    }

    Assignment { indices, tallies, total_error }
}

fn assign(matrix: &DistanceMatrix, selection: &Selection, counts: Option<&[u32]>) -> Assignment {
    let nearest = (0..matrix.num_pixels())
        .map(|pixel| matrix.nearest(pixel, selection))
        .collect();

    tally(matrix, counts, nearest)
}

#[cfg(feature = "threads")]
fn assign_par(
    matrix: &DistanceMatrix,
    selection: &Selection,
    counts: Option<&[u32]>,
) -> Assignment {
    let nearest = (0..matrix.num_pixels())
        .into_par_iter()
        .map(|pixel| matrix.nearest(pixel, selection))
        .collect();

    // the tallies are cheap relative to the arg-min pass,
    // and summing them sequentially keeps the totals deterministic
    tally(matrix, counts, nearest)
}

/// Picks the candidate to drop: the least-used active candidate,
/// breaking tally ties towards the highest index so the lowest survives.
fn least_used(selection: &Selection, tallies: &[u64]) -> usize {
    let mut victim = 0;
    let mut smallest = u64::MAX;
    for i in selection.active_indices() {
        if tallies[i] > 0 && tallies[i] <= smallest {
            smallest = tallies[i];
            victim = i;
        }
    }
    victim
}

fn reduce_with(
    matrix: &DistanceMatrix,
    counts: Option<&[u32]>,
    k: TargetColors,
    assign: impl Fn(&DistanceMatrix, &Selection) -> Assignment,
) -> Reduction {
    let k = usize::from(k.into_inner());
    let mut selection = Selection::all_active(matrix.num_candidates());

    // a zero target keeps nothing and assigns nothing
    if k == 0 {
        for i in 0..selection.len() {
            selection.deactivate(i);
        }
        return Reduction { selection, indices: Vec::new(), total_error: 0.0 };
    }

    loop {
        let Assignment { indices, tallies, total_error } = assign(matrix, &selection);

        if selection.num_active() <= k {
            debug!(
                active = selection.num_active(),
                total_error, "palette reduction finished"
            );
            return Reduction { selection, indices, total_error };
        }

        // unused candidates are free to drop: no pixel assignment changes
        let unused = selection
            .active_indices()
            .filter(|&i| tallies[i] == 0)
            .collect::<Vec<_>>();
        for i in &unused {
            selection.deactivate(*i);
        }

        if selection.num_active() > k {
            let victim = least_used(&selection, &tallies);
            trace!(victim, tally = tallies[victim], "dropping least-used candidate");
            selection.deactivate(victim);
        }

        debug!(
            active = selection.num_active(),
            unused = unused.len(),
            total_error,
            "elimination round"
        );
    }
}

/// Reduces the active candidates to at most `k` by backward elimination.
///
/// If `counts` is given, it holds the multiplicity of each pixel (row of the
/// matrix) and both the tallies and the error are weighted by it.
///
/// The result has exactly `k` active candidates unless fewer received any
/// pixels along the way. A `k` of at least the candidate count returns the
/// plain nearest-candidate assignment with every used candidate active.
/// A `k` of zero returns an empty reduction: no active candidates, no
/// assignments, and zero error.
#[must_use]
pub fn reduce(matrix: &DistanceMatrix, counts: Option<&[u32]>, k: TargetColors) -> Reduction {
    reduce_with(matrix, counts, k, |m, s| assign(m, s, counts))
}

/// Parallel version of [`reduce`] with identical output.
#[must_use]
#[cfg(feature = "threads")]
pub fn reduce_par(matrix: &DistanceMatrix, counts: Option<&[u32]>, k: TargetColors) -> Reduction {
    reduce_with(matrix, counts, k, |m, s| assign_par(m, s, counts))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::{test_palette, test_pixels, to_color_slice};
    use palette::Srgb;

    #[test]
    fn reaches_the_target_count() {
        let palette = test_palette();
        let pixels = test_pixels(512);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        for k in 1..=4u8 {
            let reduction = reduce(&matrix, None, k.into());
            assert!(reduction.selection.num_active() <= usize::from(k));
            assert_eq!(reduction.indices.len(), pixels.len());
            for &i in &reduction.indices {
                assert!(reduction.selection.is_active(usize::from(i)));
            }
        }
    }

    #[test]
    fn error_grows_as_k_shrinks() {
        let palette = test_palette();
        let pixels = test_pixels(512);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let mut previous = f64::INFINITY;
        for k in (1..=6u8).rev() {
            let reduction = reduce(&matrix, None, k.into());
            assert!(previous == f64::INFINITY || reduction.total_error >= previous - 1e-9);
            previous = reduction.total_error;
        }
    }

    #[test]
    fn large_k_is_a_plain_assignment() {
        let palette = test_palette();
        let pixels = test_pixels(256);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let reduction = reduce(&matrix, None, TargetColors::MAX);
        let all = Selection::all_active(palette.len());
        assert_eq!(
            reduction.indices,
            crate::distance::nearest_indices(&matrix, &all)
        );
    }

    #[test]
    fn zero_target_keeps_nothing() {
        let palette = test_palette();
        let pixels = test_pixels(64);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let reduction = reduce(&matrix, None, TargetColors::from_clamped(0));
        assert_eq!(reduction.selection.num_active(), 0);
        assert!(reduction.indices.is_empty());
        assert_eq!(reduction.total_error, 0.0);
    }

    #[test]
    fn keeps_only_used_candidates() {
        // a five-candidate palette where only two candidates ever win a pixel
        let palette = crate::NamedPalette::new([
            ("black".to_owned(), Srgb::new(0, 0, 0)),
            ("white".to_owned(), Srgb::new(255, 255, 255)),
            ("red".to_owned(), Srgb::new(255, 0, 0)),
            ("green".to_owned(), Srgb::new(0, 255, 0)),
            ("blue".to_owned(), Srgb::new(0, 0, 255)),
        ])
        .unwrap();
        let pixels = vec![
            Srgb::new(5, 5, 5),
            Srgb::new(250, 250, 250),
            Srgb::new(10, 10, 10),
            Srgb::new(245, 245, 245),
        ];
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let reduction = reduce(&matrix, None, 2u8.into());
        let active = reduction.selection.active_indices().collect::<Vec<_>>();
        assert_eq!(active, vec![0, 1]);
        assert!(reduction.total_error > 0.0);
    }

    #[test]
    fn weighted_counts_shift_the_victim() {
        // two colors, keep one; the weighted color must survive
        let palette = crate::NamedPalette::new([
            ("red".to_owned(), Srgb::new(255, 0, 0)),
            ("blue".to_owned(), Srgb::new(0, 0, 255)),
        ])
        .unwrap();
        let pixels = vec![Srgb::new(255, 0, 0), Srgb::new(0, 0, 255)];
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let reduction = reduce(&matrix, Some(&[1, 9]), 1u8.into());
        let active = reduction.selection.active_indices().collect::<Vec<_>>();
        assert_eq!(active, vec![1]);
        assert_eq!(reduction.indices, vec![1, 1]);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn parallel_matches_sequential() {
        let palette = test_palette();
        let pixels = test_pixels(1024);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        for k in [1u8, 3, 6] {
            let seq = reduce(&matrix, None, k.into());
            let par = reduce_par(&matrix, None, k.into());
            assert_eq!(seq.selection, par.selection);
            assert_eq!(seq.indices, par.indices);
            assert!((seq.total_error - par.total_error).abs() < 1e-9);
        }
    }
}
