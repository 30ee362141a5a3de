use crate::{
    dedup::UniqueColors,
    distance::{self, DistanceMatrix, Selection},
    exact, greedy,
    pooling,
    resize::{self, CoverageMatrix, PatternSize},
    ColorSlice, NamedPalette, Pattern, PatternError, PatternResult, ReduceMethod, TargetColors,
};
use palette::Srgb;
use tracing::debug;

#[cfg(feature = "image")]
use {crate::AboveMaxLen, image::RgbImage};

/// A builder struct to specify the parameters for turning an image
/// into a reduced-color pattern grid.
///
/// # Examples
/// ```no_run
/// # use stitchette::{PatternPipeline, NamedPalette, PatternSize};
/// # use palette::Srgb;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let palette = NamedPalette::load("threads.json")?;
/// let image = image::open("photo.jpg")?.into_rgb8();
///
/// let result = PatternPipeline::from_image(&image, &palette)?
///     .target_colors(12u8.into())
///     .pattern_size(PatternSize::new().width(90))
///     .run()?;
///
/// println!("{} x {}", result.pattern.width(), result.pattern.height());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PatternPipeline<'a> {
    /// The source pixels in row-major order.
    colors: ColorSlice<'a, Srgb<u8>>,
    /// The width of the source image.
    width: u32,
    /// The height of the source image.
    height: u32,
    /// The candidate palette.
    palette: &'a NamedPalette,
    /// The target color count; the palette size if unset.
    k: Option<TargetColors>,
    /// The reduction method.
    method: ReduceMethod,
    /// The requested output grid size.
    size: PatternSize,
    /// Whether to downsample before quantizing.
    resize_first: bool,
    /// Whether to also return the source-resolution quantized grid.
    keep_full_resolution: bool,
}

impl<'a> PatternPipeline<'a> {
    /// Creates a new [`PatternPipeline`] over the given pixels and candidate palette.
    ///
    /// `width` and `height` are the source image dimensions; they are checked
    /// against the pixel buffer when the pipeline runs.
    #[must_use]
    pub fn new(
        colors: ColorSlice<'a, Srgb<u8>>,
        width: u32,
        height: u32,
        palette: &'a NamedPalette,
    ) -> Self {
        Self {
            colors,
            width,
            height,
            palette,
            k: None,
            method: ReduceMethod::Greedy,
            size: PatternSize::new(),
            resize_first: false,
            keep_full_resolution: false,
        }
    }

    /// Creates a new [`PatternPipeline`] from an [`RgbImage`].
    ///
    /// # Errors
    /// Returns an error if the image has more than
    /// [`MAX_PIXELS`](crate::MAX_PIXELS) pixels.
    #[cfg(feature = "image")]
    pub fn from_image(
        image: &'a RgbImage,
        palette: &'a NamedPalette,
    ) -> Result<Self, AboveMaxLen<u32>> {
        Ok(Self::new(
            image.try_into()?,
            image.width(),
            image.height(),
            palette,
        ))
    }

    /// Sets the target number of colors to keep.
    ///
    /// The default is the palette size, which keeps every candidate that
    /// wins at least one cell.
    #[must_use]
    pub fn target_colors(mut self, k: TargetColors) -> Self {
        self.k = Some(k);
        self
    }

    /// Sets the reduction method. The default is [`ReduceMethod::Greedy`].
    #[must_use]
    pub fn method(mut self, method: ReduceMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the size of the output grid.
    ///
    /// The default derives the size from the source aspect ratio with a long
    /// side of [`PatternSize::DEFAULT_LONG_SIDE`].
    #[must_use]
    pub fn pattern_size(mut self, size: PatternSize) -> Self {
        self.size = size;
        self
    }

    /// Downsamples to pattern resolution before quantizing instead of after.
    ///
    /// Resizing first is faster since the reduction then works on the small
    /// grid, but the reducer no longer sees colors that vanish during
    /// downsampling. [`ReduceMethod::Exact`] always resizes first;
    /// [`ReduceMethod::Pooling`] never does, since its scoring needs the
    /// source-resolution assignment.
    #[must_use]
    pub fn resize_first(mut self, resize_first: bool) -> Self {
        self.resize_first = resize_first;
        self
    }

    /// Additionally returns the quantized image at source resolution.
    ///
    /// Only takes effect when the chosen method quantizes at source
    /// resolution (see [`PatternPipeline::resize_first`]).
    #[must_use]
    pub fn keep_full_resolution(mut self, keep: bool) -> Self {
        self.keep_full_resolution = keep;
        self
    }

    /// Validates the inputs and returns the effective target color count.
    fn validate(&self) -> Result<TargetColors, PatternError> {
        if self.colors.is_empty() {
            return Err(PatternError::EmptyImage);
        }

        let expected = self.width as usize * self.height as usize;
        if expected != self.colors.len() {
            return Err(PatternError::DimensionMismatch {
                expected,
                actual: self.colors.len(),
            });
        }

        if self.palette.is_empty() {
            return Err(PatternError::EmptyPalette);
        }

        let Some(k) = self.k else {
            #[allow(clippy::cast_possible_truncation)]
            let len = self.palette.len() as u16;
            return Ok(TargetColors::from_clamped(len));
        };

        if k.into_inner() == 0 {
            return Err(PatternError::ZeroTargetColors);
        }
        if usize::from(k.into_inner()) > self.palette.len() {
            return Err(PatternError::TooManyColors {
                requested: k.into_inner(),
                available: self.palette.len(),
            });
        }

        Ok(k)
    }

    /// Runs the pipeline.
    ///
    /// # Errors
    /// Returns an error if the inputs fail validation (see [`PatternError`])
    /// or if [`ReduceMethod::Exact`] exhausts its node budget.
    pub fn run(self) -> Result<PatternResult, PatternError> {
        let k = self.validate()?;
        let out = self.size.resolve(self.width, self.height);
        debug!(
            width = out.0,
            height = out.1,
            k = %k,
            method = ?self.method,
            "running pattern pipeline"
        );

        match self.method {
            ReduceMethod::Greedy if self.resize_first => {
                let small = resize::dominant_colors(
                    &self.colors,
                    (self.width, self.height),
                    out,
                );
                let unique = UniqueColors::new(ColorSlice::new_unchecked(&small));
                let matrix = DistanceMatrix::new(unique.color_slice(), self.palette);
                let reduction = greedy::reduce(&matrix, Some(unique.counts()), k);
                let indices = unique.map_indices(&reduction.indices);
                Ok(self.finish_small(out, indices))
            }
            ReduceMethod::Greedy => {
                let unique = UniqueColors::new(self.colors);
                let matrix = DistanceMatrix::new(unique.color_slice(), self.palette);
                let reduction = greedy::reduce(&matrix, Some(unique.counts()), k);
                let full = unique.map_indices(&reduction.indices);
                Ok(self.finish_full(out, full))
            }
            ReduceMethod::Exact(options) => {
                let small = resize::dominant_colors(
                    &self.colors,
                    (self.width, self.height),
                    out,
                );
                let unique = UniqueColors::new(ColorSlice::new_unchecked(&small));
                let matrix = DistanceMatrix::new(unique.color_slice(), self.palette);
                let reduction = exact::solve(&matrix, Some(unique.counts()), k, options)?;
                let indices = unique.map_indices(&reduction.indices);
                Ok(self.finish_small(out, indices))
            }
            ReduceMethod::Pooling => {
                let unique = UniqueColors::new(self.colors);
                let matrix = DistanceMatrix::new(unique.color_slice(), self.palette);
                let all = Selection::all_active(self.palette.len());
                let per_unique = distance::nearest_indices(&matrix, &all);
                let full = unique.map_indices(&per_unique);

                let coverage = CoverageMatrix::new(
                    &full,
                    (self.width, self.height),
                    out,
                    self.palette.len(),
                );
                let pooled = pooling::pool(&coverage, k);
                let pattern = build_pattern(out.0, out.1, pooled.indices, self.palette);
                let full_resolution = self
                    .keep_full_resolution
                    .then(|| build_pattern(self.width, self.height, full, self.palette));
                Ok(PatternResult { pattern, full_resolution })
            }
        }
    }

    /// Parallel version of [`PatternPipeline::run`] with identical output.
    ///
    /// # Errors
    /// See [`PatternPipeline::run`].
    #[cfg(feature = "threads")]
    pub fn run_par(self) -> Result<PatternResult, PatternError> {
        let k = self.validate()?;
        let out = self.size.resolve(self.width, self.height);
        debug!(
            width = out.0,
            height = out.1,
            k = %k,
            method = ?self.method,
            "running pattern pipeline"
        );

        match self.method {
            ReduceMethod::Greedy if self.resize_first => {
                let small = resize::dominant_colors(
                    &self.colors,
                    (self.width, self.height),
                    out,
                );
                let unique = UniqueColors::new_par(ColorSlice::new_unchecked(&small));
                let matrix = DistanceMatrix::new_par(unique.color_slice(), self.palette);
                let reduction = greedy::reduce_par(&matrix, Some(unique.counts()), k);
                let indices = unique.map_indices_par(&reduction.indices);
                Ok(self.finish_small(out, indices))
            }
            ReduceMethod::Greedy => {
                let unique = UniqueColors::new_par(self.colors);
                let matrix = DistanceMatrix::new_par(unique.color_slice(), self.palette);
                let reduction = greedy::reduce_par(&matrix, Some(unique.counts()), k);
                let full = unique.map_indices_par(&reduction.indices);
                Ok(self.finish_full(out, full))
            }
            ReduceMethod::Exact(options) => {
                // the search itself is sequential; only the up-front
                // deduplication and distance work parallelize
                let small = resize::dominant_colors(
                    &self.colors,
                    (self.width, self.height),
                    out,
                );
                let unique = UniqueColors::new_par(ColorSlice::new_unchecked(&small));
                let matrix = DistanceMatrix::new_par(unique.color_slice(), self.palette);
                let reduction = exact::solve(&matrix, Some(unique.counts()), k, options)?;
                let indices = unique.map_indices_par(&reduction.indices);
                Ok(self.finish_small(out, indices))
            }
            ReduceMethod::Pooling => {
                let unique = UniqueColors::new_par(self.colors);
                let matrix = DistanceMatrix::new_par(unique.color_slice(), self.palette);
                let all = Selection::all_active(self.palette.len());
                let per_unique = distance::nearest_indices_par(&matrix, &all);
                let full = unique.map_indices_par(&per_unique);

                let coverage = CoverageMatrix::new(
                    &full,
                    (self.width, self.height),
                    out,
                    self.palette.len(),
                );
                let pooled = pooling::pool(&coverage, k);
                let pattern = build_pattern(out.0, out.1, pooled.indices, self.palette);
                let full_resolution = self
                    .keep_full_resolution
                    .then(|| build_pattern(self.width, self.height, full, self.palette));
                Ok(PatternResult { pattern, full_resolution })
            }
        }
    }

    /// Wraps up a run that quantized at pattern resolution.
    fn finish_small(&self, out: (u32, u32), indices: Vec<u8>) -> PatternResult {
        PatternResult {
            pattern: build_pattern(out.0, out.1, indices, self.palette),
            full_resolution: None,
        }
    }

    /// Wraps up a run that quantized at source resolution,
    /// downsampling the assignment to the pattern grid.
    fn finish_full(&self, out: (u32, u32), full: Vec<u8>) -> PatternResult {
        let indices = resize::dominant_indexed(&full, (self.width, self.height), out);
        PatternResult {
            pattern: build_pattern(out.0, out.1, indices, self.palette),
            full_resolution: self
                .keep_full_resolution
                .then(|| build_pattern(self.width, self.height, full, self.palette)),
        }
    }
}

/// Compacts candidate indices into a [`Pattern`] whose entries hold only the
/// candidates actually used, in candidate order.
fn build_pattern(
    width: u32,
    height: u32,
    candidate_indices: Vec<u8>,
    palette: &NamedPalette,
) -> Pattern {
    let mut used = [false; 256];
    for &i in &candidate_indices {
        used[usize::from(i)] = true;
    }

    let mut remap = [0u8; 256];
    let mut entries = Vec::new();
    for candidate in 0..palette.len() {
        if used[candidate] {
            #[allow(clippy::cast_possible_truncation)]
            let compact = entries.len() as u8;
            remap[candidate] = compact;
            entries.push(palette.entry(candidate));
        }
    }

    let indices = candidate_indices
        .into_iter()
        .map(|i| remap[usize::from(i)])
        .collect();

    Pattern::new_unchecked(width, height, indices, entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::{test_palette, test_pixels, to_color_slice};

    fn quadrants() -> (Vec<Srgb<u8>>, NamedPalette) {
        let palette = NamedPalette::new([
            ("red".to_owned(), Srgb::new(255, 0, 0)),
            ("green".to_owned(), Srgb::new(0, 255, 0)),
            ("blue".to_owned(), Srgb::new(0, 0, 255)),
            ("yellow".to_owned(), Srgb::new(255, 255, 0)),
        ])
        .unwrap();

        let r = Srgb::new(250, 10, 10);
        let g = Srgb::new(10, 250, 10);
        let b = Srgb::new(10, 10, 250);
        let y = Srgb::new(250, 250, 10);
        let pixels = vec![
            r, r, g, g, //
            r, r, g, g, //
            b, b, y, y, //
            b, b, y, y,
        ];
        (pixels, palette)
    }

    #[test]
    fn quadrants_map_to_a_two_by_two_grid() {
        let (pixels, palette) = quadrants();
        let result = PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
            .target_colors(4u8.into())
            .pattern_size(PatternSize::exact(2, 2))
            .run()
            .unwrap();

        let pattern = result.pattern;
        assert_eq!((pattern.width(), pattern.height()), (2, 2));
        assert_eq!(pattern.entries().len(), 4);
        assert_eq!(
            pattern.pixels(),
            vec![
                Srgb::new(255, 0, 0),
                Srgb::new(0, 255, 0),
                Srgb::new(0, 0, 255),
                Srgb::new(255, 255, 0),
            ]
        );
    }

    #[test]
    fn entries_hold_only_used_colors() {
        let (pixels, palette) = quadrants();
        let result = PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
            .target_colors(2u8.into())
            .pattern_size(PatternSize::exact(2, 2))
            .run()
            .unwrap();

        assert!(result.pattern.entries().len() <= 2);
        let names = result
            .pattern
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>();
        assert!(names.iter().all(|n| palette.index_of(n).is_some()));
    }

    #[test]
    fn all_methods_agree_on_a_trivial_image() {
        let (pixels, palette) = quadrants();
        for method in [
            ReduceMethod::Greedy,
            ReduceMethod::exact(),
            ReduceMethod::Pooling,
        ] {
            let result = PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
                .target_colors(4u8.into())
                .pattern_size(PatternSize::exact(2, 2))
                .method(method)
                .run()
                .unwrap();
            assert_eq!(result.pattern.entries().len(), 4);
        }
    }

    #[test]
    fn all_methods_match_a_single_palette_pixel_exactly() {
        let (_, palette) = quadrants();
        // exactly the "blue" candidate
        let pixels = vec![Srgb::new(0, 0, 255)];
        for method in [
            ReduceMethod::Greedy,
            ReduceMethod::exact(),
            ReduceMethod::Pooling,
        ] {
            let result = PatternPipeline::new(to_color_slice(&pixels), 1, 1, &palette)
                .target_colors(1u8.into())
                .pattern_size(PatternSize::exact(1, 1))
                .method(method)
                .run()
                .unwrap();

            let pattern = result.pattern;
            assert_eq!((pattern.width(), pattern.height()), (1, 1));
            assert_eq!(pattern.pixels(), vec![Srgb::new(0, 0, 255)]);
            assert_eq!(pattern.entries().len(), 1);
            assert_eq!(pattern.entries()[0].name, "blue");
        }
    }

    #[test]
    fn keep_full_resolution_returns_the_source_grid() {
        let (pixels, palette) = quadrants();
        let result = PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
            .target_colors(4u8.into())
            .pattern_size(PatternSize::exact(2, 2))
            .keep_full_resolution(true)
            .run()
            .unwrap();

        let full = result.full_resolution.unwrap();
        assert_eq!((full.width(), full.height()), (4, 4));
        assert_eq!(full.pixels()[0], Srgb::new(255, 0, 0));
    }

    #[test]
    fn resize_first_skips_the_full_resolution_output() {
        let (pixels, palette) = quadrants();
        let result = PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
            .target_colors(4u8.into())
            .pattern_size(PatternSize::exact(2, 2))
            .resize_first(true)
            .keep_full_resolution(true)
            .run()
            .unwrap();

        assert!(result.full_resolution.is_none());
    }

    #[test]
    fn validation_errors() {
        let (pixels, palette) = quadrants();

        let empty: Vec<Srgb<u8>> = Vec::new();
        assert!(matches!(
            PatternPipeline::new(to_color_slice(&empty), 0, 0, &palette).run(),
            Err(PatternError::EmptyImage)
        ));

        assert!(matches!(
            PatternPipeline::new(to_color_slice(&pixels), 5, 4, &palette).run(),
            Err(PatternError::DimensionMismatch { expected: 20, actual: 16 })
        ));

        assert!(matches!(
            PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
                .target_colors(TargetColors::from_clamped(0))
                .run(),
            Err(PatternError::ZeroTargetColors)
        ));

        assert!(matches!(
            PatternPipeline::new(to_color_slice(&pixels), 4, 4, &palette)
                .target_colors(5u8.into())
                .run(),
            Err(PatternError::TooManyColors { requested: 5, available: 4 })
        ));
    }

    #[test]
    #[cfg(feature = "threads")]
    fn parallel_matches_sequential() {
        let palette = test_palette();
        let pixels = test_pixels(32 * 32);

        for method in [ReduceMethod::Greedy, ReduceMethod::Pooling] {
            let seq = PatternPipeline::new(to_color_slice(&pixels), 32, 32, &palette)
                .target_colors(3u8.into())
                .pattern_size(PatternSize::exact(8, 8))
                .method(method)
                .run()
                .unwrap();
            let par = PatternPipeline::new(to_color_slice(&pixels), 32, 32, &palette)
                .target_colors(3u8.into())
                .pattern_size(PatternSize::exact(8, 8))
                .method(method)
                .run_par()
                .unwrap();
            assert_eq!(seq.pattern, par.pattern);
        }
    }
}
