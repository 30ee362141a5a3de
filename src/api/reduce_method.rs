use crate::ExactOptions;

/// The set of supported palette reduction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReduceMethod {
    /// Greedy backward elimination of the least-used candidates.
    ///
    /// Fast and deterministic; not guaranteed to find the error-minimal
    /// subset, but in practice close to it.
    ///
    /// See the [`greedy`](crate::greedy) module for more details.
    Greedy,
    /// Error-minimal reduction by branch and bound.
    ///
    /// Never worse than [`ReduceMethod::Greedy`] but exponential in the worst
    /// case, so the image is quantized at pattern resolution and the search is
    /// capped by the node budget in [`ExactOptions`].
    ///
    /// See the [`exact`](crate::exact) module for more details.
    Exact(ExactOptions),
    /// Area-coverage pooling.
    ///
    /// Quantizes against the full candidate palette first, then keeps the
    /// subset of candidates that dominates the most cell area. Tends to
    /// preserve small-but-saturated details that distance minimization
    /// averages away.
    ///
    /// See the [`pooling`](crate::pooling) module for more details.
    Pooling,
}

impl ReduceMethod {
    /// Creates a new [`ReduceMethod::Exact`] with the default [`ExactOptions`].
    #[must_use]
    pub const fn exact() -> Self {
        Self::Exact(ExactOptions::new())
    }
}

impl Default for ReduceMethod {
    fn default() -> Self {
        Self::Greedy
    }
}

impl From<ExactOptions> for ReduceMethod {
    fn from(options: ExactOptions) -> Self {
        Self::Exact(options)
    }
}
