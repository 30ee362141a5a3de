//! Contains various types needed across the crate.

use crate::{PaletteEntry, MAX_CANDIDATES, MAX_PIXELS};
use palette::Srgb;
use std::{
    error::Error,
    fmt::{Debug, Display},
    ops::Deref,
};
use thiserror::Error as ThisError;
#[cfg(feature = "image")]
use {
    image::RgbImage,
    palette::cast::{ComponentsAs, IntoComponents},
};

/// An error type for when the length of an input (e.g., `Vec` or slice)
/// is above the maximum supported value.
///
/// The inner value is the maximum supported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AboveMaxLen<T>(pub T);

impl<T: Display> Display for AboveMaxLen<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "above the maximum length of {}", self.0)
    }
}

impl<T: Debug + Display> Error for AboveMaxLen<T> {}

/// A simple new type wrapper around `&'a [Color]` with the invariant that the length of the
/// inner slice must not be greater than [`MAX_PIXELS`].
///
/// # Examples
/// Use `try_into` or [`ColorSlice::from_truncated`] to create [`ColorSlice`]s.
///
/// From a raw color slice:
/// ```
/// # use stitchette::{ColorSlice, AboveMaxLen};
/// # use palette::Srgb;
/// # fn main() -> Result<(), AboveMaxLen<u32>> {
/// let srgb = vec![Srgb::new(0, 0, 0)];
/// let colors: ColorSlice<_> = srgb.as_slice().try_into()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorSlice<'a, Color>(&'a [Color]);

impl<'a, Color> Clone for ColorSlice<'a, Color> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, Color> Copy for ColorSlice<'a, Color> {}

impl<'a, Color> ColorSlice<'a, Color> {
    /// Creates a [`ColorSlice`] without ensuring that its length
    /// is less than or equal to [`MAX_PIXELS`].
    #[allow(unused)]
    pub(crate) const fn new_unchecked(colors: &'a [Color]) -> Self {
        Self(colors)
    }

    /// Creates a new [`ColorSlice`] by truncating the input slice to a max length of [`MAX_PIXELS`].
    pub fn from_truncated(colors: &'a [Color]) -> Self {
        Self(&colors[..colors.len().min(MAX_PIXELS as usize)])
    }

    /// Returns the length of the slice as a `u32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn num_pixels(&self) -> u32 {
        self.0.len() as u32
    }
}

impl<'a, Color> AsRef<[Color]> for ColorSlice<'a, Color> {
    fn as_ref(&self) -> &[Color] {
        self
    }
}

impl<'a, Color> Deref for ColorSlice<'a, Color> {
    type Target = [Color];

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<'a, Color> From<ColorSlice<'a, Color>> for &'a [Color] {
    fn from(val: ColorSlice<'a, Color>) -> Self {
        val.0
    }
}

impl<'a, Color> TryFrom<&'a [Color]> for ColorSlice<'a, Color> {
    type Error = AboveMaxLen<u32>;

    fn try_from(slice: &'a [Color]) -> Result<Self, Self::Error> {
        if slice.len() <= MAX_PIXELS as usize {
            Ok(Self(slice))
        } else {
            Err(AboveMaxLen(MAX_PIXELS))
        }
    }
}

#[cfg(feature = "image")]
impl<'a> TryFrom<&'a RgbImage> for ColorSlice<'a, Srgb<u8>> {
    type Error = AboveMaxLen<u32>;

    fn try_from(image: &'a RgbImage) -> Result<Self, Self::Error> {
        let pixels = image.pixels().len();
        if pixels <= MAX_PIXELS as usize {
            let buf = &image.as_raw()[..(pixels * 3)];
            Ok(Self(buf.components_as()))
        } else {
            Err(AboveMaxLen(MAX_PIXELS))
        }
    }
}

/// This type is used to specify the target number of colors to keep in the pattern,
/// i.e. the `k` of the reduction.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// less than or equal to [`MAX_CANDIDATES`].
/// A [`TargetColors`] of `0` is representable but rejected by the pipeline
/// with [`PatternError::ZeroTargetColors`]; the low-level reducers accept it
/// and return empty results.
///
/// # Examples
/// Use `into` to create [`TargetColors`] from `u8`s.
/// For `u16`s, use `try_into` or [`TargetColors::from_clamped`].
///
/// ```
/// # use stitchette::{TargetColors, AboveMaxLen};
/// # fn main() -> Result<(), AboveMaxLen<u16>> {
/// let k = TargetColors::from(16u8);
/// let k: TargetColors = 16u8.into();
/// let k = TargetColors::try_from(128u16)?;
/// let k = TargetColors::from_clamped(1024);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TargetColors(u16);

impl TargetColors {
    /// The maximum supported number of kept colors (given by [`MAX_CANDIDATES`]).
    pub const MAX: Self = Self(MAX_CANDIDATES);

    /// Gets the inner `u16` value.
    #[must_use]
    pub const fn into_inner(self) -> u16 {
        self.0
    }

    /// Creates a [`TargetColors`] by clamping the given `u16` to be
    /// less than or equal to [`MAX_CANDIDATES`].
    #[must_use]
    pub const fn from_clamped(value: u16) -> Self {
        if value <= MAX_CANDIDATES {
            Self(value)
        } else {
            Self(MAX_CANDIDATES)
        }
    }
}

impl Default for TargetColors {
    fn default() -> Self {
        Self::MAX
    }
}

impl From<TargetColors> for u16 {
    fn from(val: TargetColors) -> Self {
        val.into_inner()
    }
}

impl From<u8> for TargetColors {
    fn from(value: u8) -> Self {
        Self(value.into())
    }
}

impl TryFrom<u16> for TargetColors {
    type Error = AboveMaxLen<u16>;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= MAX_CANDIDATES {
            Ok(TargetColors(value))
        } else {
            Err(AboveMaxLen(MAX_CANDIDATES))
        }
    }
}

impl Display for TargetColors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.into_inner())
    }
}

/// The errors reported by the quantization pipeline.
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum PatternError {
    /// The input image contains no pixels.
    #[error("input image contains no pixels")]
    EmptyImage,
    /// The candidate palette contains no colors.
    #[error("candidate palette contains no colors")]
    EmptyPalette,
    /// The target color count is zero.
    #[error("target color count must be at least 1")]
    ZeroTargetColors,
    /// The target color count exceeds the number of palette candidates.
    #[error("target color count {requested} exceeds the palette size {available}")]
    TooManyColors {
        /// The requested number of colors.
        requested: u16,
        /// The number of candidates in the palette.
        available: usize,
    },
    /// The pixel buffer length does not match the given dimensions.
    #[error("expected {expected} pixels for the given dimensions but got {actual}")]
    DimensionMismatch {
        /// `width * height`.
        expected: usize,
        /// The actual length of the pixel buffer.
        actual: usize,
    },
    /// The exact solver exhausted its node budget without proving optimality.
    ///
    /// Callers may retry with a larger [`ExactOptions`](crate::ExactOptions)
    /// budget, shrink the pattern grid, or fall back to the greedy reducer.
    #[error("exact solver exhausted its node budget after exploring {explored} nodes")]
    Infeasible {
        /// The number of search nodes explored before giving up.
        explored: u64,
    },
}

/// The final reduced-color grid, with every cell holding one palette color.
///
/// `indices` holds, for each cell in row-major order, an index into `entries`,
/// the realized sub-palette. Entries appear in candidate-index order and only
/// contain colors that are actually used by at least one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// The width of the grid in cells.
    width: u32,
    /// The height of the grid in cells.
    height: u32,
    /// Row-major indices into `entries`, one per cell.
    indices: Vec<u8>,
    /// The realized palette subset, in candidate order.
    entries: Vec<PaletteEntry>,
}

impl Pattern {
    /// Creates a new [`Pattern`] without validating the indices against the entries.
    pub(crate) fn new_unchecked(
        width: u32,
        height: u32,
        indices: Vec<u8>,
        entries: Vec<PaletteEntry>,
    ) -> Self {
        debug_assert_eq!(indices.len(), width as usize * height as usize);
        Self { width, height, indices, entries }
    }

    /// The width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major indices into [`Pattern::entries`], one per cell.
    #[must_use]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// The realized palette subset used by the grid.
    #[must_use]
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// The color of the cell at the given row and column.
    #[must_use]
    pub fn color_at(&self, row: u32, column: u32) -> Srgb<u8> {
        let i = self.indices[row as usize * self.width as usize + column as usize];
        self.entries[usize::from(i)].color
    }

    /// Returns the grid as a flat, row-major buffer of colors.
    #[must_use]
    pub fn pixels(&self) -> Vec<Srgb<u8>> {
        self.indices
            .iter()
            .map(|&i| self.entries[usize::from(i)].color)
            .collect()
    }

    /// Returns, for each entry, the number of cells assigned to it.
    ///
    /// This is the per-color material count a pattern renderer needs
    /// (e.g., how many skeins of each yarn color to buy).
    #[must_use]
    pub fn color_usage(&self) -> Vec<u32> {
        let mut counts = vec![0; self.entries.len()];
        for &i in &self.indices {
            counts[usize::from(i)] += 1;
        }
        counts
    }

    /// Converts the grid into an [`RgbImage`].
    #[must_use]
    #[cfg(feature = "image")]
    pub fn to_rgbimage(&self) -> RgbImage {
        let buf = self.pixels().into_components();

        // indices.len() is validated against width * height on construction
        #[allow(clippy::expect_used)]
        let image = RgbImage::from_vec(self.width, self.height, buf).expect("large enough buffer");
        image
    }
}

/// The output of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternResult {
    /// The reduced-color grid at pattern resolution.
    pub pattern: Pattern,
    /// The quantized image at source resolution, before downsampling.
    ///
    /// Only present if requested via
    /// [`PatternPipeline::keep_full_resolution`](crate::PatternPipeline::keep_full_resolution)
    /// and the chosen method quantizes at source resolution.
    pub full_resolution: Option<Pattern>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::NamedPalette;

    fn two_by_two() -> Pattern {
        let palette = NamedPalette::new([
            ("coal".to_owned(), Srgb::new(0, 0, 0)),
            ("snow".to_owned(), Srgb::new(255, 255, 255)),
        ])
        .unwrap();

        Pattern::new_unchecked(
            2,
            2,
            vec![0, 1, 1, 0],
            vec![palette.entry(0), palette.entry(1)],
        )
    }

    #[test]
    fn pixels_follow_indices() {
        let pattern = two_by_two();
        let black = Srgb::new(0, 0, 0);
        let white = Srgb::new(255, 255, 255);
        assert_eq!(pattern.pixels(), vec![black, white, white, black]);
        assert_eq!(pattern.color_at(0, 1), white);
        assert_eq!(pattern.color_at(1, 1), black);
    }

    #[test]
    fn color_usage_counts_cells() {
        let pattern = two_by_two();
        assert_eq!(pattern.color_usage(), vec![2, 2]);
    }

    #[test]
    fn target_colors_bounds() {
        assert!(TargetColors::try_from(256u16).is_ok());
        assert!(TargetColors::try_from(257u16).is_err());
        assert_eq!(TargetColors::from_clamped(1024), TargetColors::MAX);
    }
}
