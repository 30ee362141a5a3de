//! Exact palette reduction by branch and bound.
//!
//! The search branches on whether each candidate is kept. Once the kept subset
//! is fixed, the optimal per-pixel assignment is simply the nearest kept
//! candidate, so the subproblem cost of a partial decision (some candidates
//! excluded, the rest undecided or kept) is the assignment cost with every
//! non-excluded candidate available. That cost never decreases as more
//! candidates are excluded, which makes it an admissible lower bound.
//!
//! The search is warm-started from the greedy reducer, so the result is never
//! worse than greedy. Intended for pattern-sized inputs; the work is bounded
//! by an explicit node budget rather than wall time.

use crate::{
    distance::{DistanceMatrix, Selection},
    greedy::{self, Reduction},
    PatternError, TargetColors,
};
use tracing::{debug, trace};

/// Options for the exact solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExactOptions {
    /// The maximum number of search nodes to explore.
    node_budget: u64,
}

impl ExactOptions {
    /// The default maximum number of search nodes.
    pub const DEFAULT_NODE_BUDGET: u64 = 1 << 20;

    /// Creates options with the default node budget.
    #[must_use]
    pub const fn new() -> Self {
        Self { node_budget: Self::DEFAULT_NODE_BUDGET }
    }

    /// Sets the maximum number of search nodes before the solver
    /// gives up with [`PatternError::Infeasible`].
    #[must_use]
    pub const fn node_budget(mut self, budget: u64) -> Self {
        self.node_budget = budget;
        self
    }
}

impl Default for ExactOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A per-run counter of explored search nodes.
struct NodeBudget {
    /// The maximum number of nodes to explore.
    limit: u64,
    /// The number of nodes explored so far.
    explored: u64,
}

impl NodeBudget {
    fn new(limit: u64) -> Self {
        Self { limit, explored: 0 }
    }

    /// Counts one node. Returns `false` once the budget is exhausted.
    fn tick(&mut self) -> bool {
        self.explored += 1;
        self.explored <= self.limit
    }
}

struct Search<'a> {
    /// The distances being minimized.
    matrix: &'a DistanceMatrix,
    /// The multiplicity of each pixel, if weighted.
    counts: Option<&'a [u32]>,
    /// The maximum number of kept candidates.
    k: usize,
    /// The remaining node budget.
    budget: NodeBudget,
    /// Candidates excluded along the current search path.
    excluded: Vec<bool>,
    /// The cost of the incumbent solution.
    best_cost: f64,
    /// The kept candidate indices of the incumbent solution.
    best_kept: Vec<usize>,
}

impl Search<'_> {
    /// The assignment cost with every non-excluded candidate available.
    fn relaxed_cost(&self) -> f64 {
        let mut selection = Selection::all_active(self.excluded.len());
        for (i, &out) in self.excluded.iter().enumerate() {
            if out {
                selection.deactivate(i);
            }
        }

        let mut cost = 0.0;
        for pixel in 0..self.matrix.num_pixels() {
            let (_, dist) = self.matrix.nearest(pixel, &selection);
            let weight = self.counts.map_or(1, |c| c[pixel]);
            cost += f64::from(dist) * f64::from(weight);
        }
        cost
    }

    /// Explores decisions for candidates `position..`, with `kept` candidates
    /// already committed. Returns `false` once the node budget is exhausted.
    fn explore(&mut self, position: usize, kept: usize) -> bool {
        if !self.budget.tick() {
            return false;
        }

        let n = self.excluded.len();
        let cost = self.relaxed_cost();
        if cost >= self.best_cost {
            return true;
        }

        // leaf: remaining candidates can no longer change the assignment,
        // either because the kept set is full or nothing is undecided
        if kept == self.k || position == n {
            let mut cost = cost;
            let decided = if kept == self.k { position } else { n };
            if decided < n {
                // a full kept set implicitly excludes the undecided tail
                for flag in &mut self.excluded[decided..] {
                    *flag = true;
                }
                cost = self.relaxed_cost();
                for flag in &mut self.excluded[decided..] {
                    *flag = false;
                }
            }

            if cost < self.best_cost {
                let kept_set = self.excluded[..decided]
                    .iter()
                    .enumerate()
                    .filter(|(_, &out)| !out)
                    .map(|(i, _)| i)
                    .collect::<Vec<_>>();
                trace!(cost, ?kept_set, "new incumbent");
                self.best_cost = cost;
                self.best_kept = kept_set;
            }
            return true;
        }

        // keep first: full kept sets are reached sooner,
        // tightening the incumbent before the exclude branch
        if !self.explore(position + 1, kept + 1) {
            return false;
        }

        self.excluded[position] = true;
        let ok = self.explore(position + 1, kept);
        self.excluded[position] = false;
        ok
    }
}

/// Finds the error-minimal selection of at most `k` candidates.
///
/// Warm-started from [`greedy::reduce`], so the result never has a larger
/// total error than the greedy reduction. The incumbent is only replaced on a
/// strict improvement, so if greedy already attains the optimum its selection
/// is returned unchanged. A `k` of zero returns the empty greedy reduction
/// without searching.
///
/// # Errors
/// Returns [`PatternError::Infeasible`] if the node budget runs out before
/// the search space is exhausted.
pub fn solve(
    matrix: &DistanceMatrix,
    counts: Option<&[u32]>,
    k: TargetColors,
    options: ExactOptions,
) -> Result<Reduction, PatternError> {
    let n = matrix.num_candidates();
    let target = usize::from(k.into_inner());

    let incumbent = greedy::reduce(matrix, counts, k);
    if target == 0 || target >= n {
        return Ok(incumbent);
    }

    let mut search = Search {
        matrix,
        counts,
        k: target,
        budget: NodeBudget::new(options.node_budget),
        excluded: vec![false; n],
        best_cost: incumbent.total_error,
        best_kept: incumbent.selection.active_indices().collect(),
    };

    if !search.explore(0, 0) {
        debug!(explored = search.budget.explored, "node budget exhausted");
        return Err(PatternError::Infeasible { explored: search.budget.explored });
    }

    debug!(
        explored = search.budget.explored,
        cost = search.best_cost,
        "exact search finished"
    );

    let mut selection = Selection::all_active(n);
    for i in (0..n).filter(|i| !search.best_kept.contains(i)) {
        selection.deactivate(i);
    }

    let mut indices = Vec::with_capacity(matrix.num_pixels());
    let mut total_error = 0.0;
    for pixel in 0..matrix.num_pixels() {
        let (index, dist) = matrix.nearest(pixel, &selection);
        let weight = counts.map_or(1, |c| c[pixel]);
        indices.push(index);
        total_error += f64::from(dist) * f64::from(weight);
    }

    Ok(Reduction { selection, indices, total_error })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::{test_palette, test_pixels, to_color_slice};
    use palette::Srgb;

    #[test]
    fn never_worse_than_greedy() {
        let palette = test_palette();
        let pixels = test_pixels(96);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        for k in 1..=4u8 {
            let greedy = greedy::reduce(&matrix, None, k.into());
            let exact = solve(&matrix, None, k.into(), ExactOptions::new()).unwrap();
            assert!(exact.total_error <= greedy.total_error + 1e-9);
            assert!(exact.selection.num_active() <= usize::from(k));
        }
    }

    #[test]
    fn finds_the_obvious_optimum() {
        let palette = crate::NamedPalette::new([
            ("black".to_owned(), Srgb::new(0, 0, 0)),
            ("white".to_owned(), Srgb::new(255, 255, 255)),
            ("red".to_owned(), Srgb::new(255, 0, 0)),
        ])
        .unwrap();
        let pixels = vec![
            Srgb::new(0, 0, 0),
            Srgb::new(255, 255, 255),
            Srgb::new(0, 0, 0),
        ];
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let exact = solve(&matrix, None, 2u8.into(), ExactOptions::new()).unwrap();
        let active = exact.selection.active_indices().collect::<Vec<_>>();
        assert_eq!(active, vec![0, 1]);
        assert_eq!(exact.total_error, 0.0);
    }

    #[test]
    fn single_pixel_matches_exactly() {
        let palette = test_palette();
        let pixels = vec![palette.color(2)];
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let exact = solve(&matrix, None, 1u8.into(), ExactOptions::new()).unwrap();
        assert_eq!(exact.total_error, 0.0);
        assert_eq!(exact.indices, vec![2]);
    }

    #[test]
    fn exhausted_budget_reports_infeasible() {
        let palette = test_palette();
        let pixels = test_pixels(64);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let result = solve(&matrix, None, 3u8.into(), ExactOptions::new().node_budget(1));
        assert!(matches!(
            result,
            Err(PatternError::Infeasible { explored: 2 })
        ));
    }

    #[test]
    fn zero_target_returns_an_empty_reduction() {
        let palette = test_palette();
        let pixels = test_pixels(32);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let exact = solve(&matrix, None, TargetColors::from_clamped(0), ExactOptions::new());
        let exact = exact.unwrap();
        assert_eq!(exact.selection.num_active(), 0);
        assert!(exact.indices.is_empty());
    }

    #[test]
    fn large_k_returns_the_greedy_assignment() {
        let palette = test_palette();
        let pixels = test_pixels(64);
        let matrix = DistanceMatrix::new(to_color_slice(&pixels), &palette);

        let greedy = greedy::reduce(&matrix, None, TargetColors::MAX);
        let exact = solve(&matrix, None, TargetColors::MAX, ExactOptions::new()).unwrap();
        assert_eq!(greedy.indices, exact.indices);
    }
}
