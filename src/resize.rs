//! Area-coverage downsampling from the source image to the pattern grid.
//!
//! Each output cell maps to an axis-aligned rectangle of source pixels with
//! fractional edges. A source pixel contributes the product of its clamped
//! axis overlaps with the cell, so a pixel fully inside contributes `1.0` and
//! an edge pixel contributes its covered fraction. The cell takes whichever
//! value covers the most area.

use palette::Srgb;

/// The requested size of the output grid.
///
/// Unspecified sides are derived from the source aspect ratio; with neither
/// side given, the long side becomes [`PatternSize::DEFAULT_LONG_SIDE`].
/// Derived and given sides are clamped to at least one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternSize {
    /// The requested width in cells, if any.
    width: Option<u32>,
    /// The requested height in cells, if any.
    height: Option<u32>,
}

impl PatternSize {
    /// The long side used when neither side is specified.
    pub const DEFAULT_LONG_SIDE: u32 = 120;

    /// Creates a size with both sides unspecified.
    #[must_use]
    pub const fn new() -> Self {
        Self { width: None, height: None }
    }

    /// Sets the width in cells.
    #[must_use]
    pub const fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the height in cells.
    #[must_use]
    pub const fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Specifies both sides exactly.
    #[must_use]
    pub const fn exact(width: u32, height: u32) -> Self {
        Self { width: Some(width), height: Some(height) }
    }

    /// Resolves the grid size for a source of the given dimensions.
    pub(crate) fn resolve(self, src_width: u32, src_height: u32) -> (u32, u32) {
        let derive = |side: u32, from: u32, to: u32| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let derived =
                (f64::from(side) * f64::from(to) / f64::from(from)).round() as u32;
            derived.max(1)
        };

        match (self.width, self.height) {
            (Some(w), Some(h)) => (w.max(1), h.max(1)),
            (Some(w), None) => (w.max(1), derive(w, src_width, src_height)),
            (None, Some(h)) => (derive(h, src_height, src_width), h.max(1)),
            (None, None) => {
                if src_width >= src_height {
                    let w = Self::DEFAULT_LONG_SIDE;
                    (w, derive(w, src_width, src_height))
                } else {
                    let h = Self::DEFAULT_LONG_SIDE;
                    (derive(h, src_height, src_width), h)
                }
            }
        }
    }
}

/// The source pixels overlapping one output cell along one axis,
/// with the length of each overlap.
fn axis_overlaps(scale: f64, cell: u32, len: u32) -> Vec<(usize, f64)> {
    let start = scale * f64::from(cell);
    let end = scale * f64::from(cell + 1);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let first = start.floor() as usize;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let last = (end.ceil() as usize).min(len as usize);

    (first..last)
        .map(|p| {
            #[allow(clippy::cast_precision_loss)]
            let lo = start.max(p as f64);
            #[allow(clippy::cast_precision_loss)]
            let hi = end.min((p + 1) as f64);
            (p, (hi - lo).max(0.0))
        })
        .collect()
}

/// Calls `f` with each source pixel index covered by the given cell
/// and its covered area, in row-major source order.
fn for_each_overlap(
    (src_width, src_height): (u32, u32),
    (out_width, out_height): (u32, u32),
    (cell_x, cell_y): (u32, u32),
    mut f: impl FnMut(usize, f64),
) {
    let scale_x = f64::from(src_width) / f64::from(out_width);
    let scale_y = f64::from(src_height) / f64::from(out_height);

    let row = axis_overlaps(scale_x, cell_x, src_width);
    for (py, wy) in axis_overlaps(scale_y, cell_y, src_height) {
        for &(px, wx) in &row {
            f(py * src_width as usize + px, wx * wy);
        }
    }
}

/// Downsamples an indexed image to the given grid, assigning each cell the
/// index covering the most area. Ties go to the lowest index.
#[must_use]
pub fn dominant_indexed(
    indices: &[u8],
    src: (u32, u32),
    out: (u32, u32),
) -> Vec<u8> {
    debug_assert_eq!(indices.len(), src.0 as usize * src.1 as usize);

    let mut result = Vec::with_capacity(out.0 as usize * out.1 as usize);
    let mut area = [0.0; 256];
    let mut touched = Vec::new();

    for cell_y in 0..out.1 {
        for cell_x in 0..out.0 {
            for_each_overlap(src, out, (cell_x, cell_y), |pixel, overlap| {
                let i = usize::from(indices[pixel]);
                if area[i] == 0.0 {
                    touched.push(i);
                }
                area[i] += overlap;
            });

            let mut best = (0u8, 0.0);
            for &i in &touched {
                #[allow(clippy::cast_possible_truncation)]
                let index = i as u8;
                if area[i] > best.1 || (area[i] == best.1 && index < best.0) {
                    best = (index, area[i]);
                }
                area[i] = 0.0;
            }
            touched.clear();
            result.push(best.0);
        }
    }

    result
}

/// Downsamples a color image to the given grid, assigning each cell the color
/// covering the most area. Ties go to the color first encountered in
/// row-major source order.
#[must_use]
pub fn dominant_colors(
    colors: &[Srgb<u8>],
    src: (u32, u32),
    out: (u32, u32),
) -> Vec<Srgb<u8>> {
    debug_assert_eq!(colors.len(), src.0 as usize * src.1 as usize);

    let mut result = Vec::with_capacity(out.0 as usize * out.1 as usize);
    let mut area: Vec<(Srgb<u8>, f64)> = Vec::new();

    for cell_y in 0..out.1 {
        for cell_x in 0..out.0 {
            for_each_overlap(src, out, (cell_x, cell_y), |pixel, overlap| {
                let color = colors[pixel];
                match area.iter_mut().find(|(c, _)| *c == color) {
                    Some((_, a)) => *a += overlap,
                    None => area.push((color, overlap)),
                }
            });

            let mut best = (Srgb::new(0, 0, 0), 0.0);
            for &(color, a) in &area {
                if a > best.1 {
                    best = (color, a);
                }
            }
            area.clear();
            result.push(best.0);
        }
    }

    result
}

/// How much source area each candidate covers in each output cell.
///
/// Rows are cells in row-major order; each row sums to the cell's source area.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMatrix {
    /// The width of the output grid in cells.
    width: u32,
    /// The height of the output grid in cells.
    height: u32,
    /// The number of candidates (columns per row).
    candidates: usize,
    /// Cell-major coverage scores, `num_cells * candidates` long.
    scores: Vec<f64>,
}

impl CoverageMatrix {
    /// Computes the per-cell coverage of each candidate in an indexed image.
    #[must_use]
    pub fn new(indices: &[u8], src: (u32, u32), out: (u32, u32), candidates: usize) -> Self {
        debug_assert_eq!(indices.len(), src.0 as usize * src.1 as usize);

        let mut scores = vec![0.0; out.0 as usize * out.1 as usize * candidates];
        for cell_y in 0..out.1 {
            for cell_x in 0..out.0 {
                let cell = cell_y as usize * out.0 as usize + cell_x as usize;
                let row = &mut scores[(cell * candidates)..((cell + 1) * candidates)];
                for_each_overlap(src, out, (cell_x, cell_y), |pixel, overlap| {
                    row[usize::from(indices[pixel])] += overlap;
                });
            }
        }

        Self { width: out.0, height: out.1, candidates, scores }
    }

    /// The width of the output grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The height of the output grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The number of candidates.
    #[must_use]
    pub const fn num_candidates(&self) -> usize {
        self.candidates
    }

    /// The number of cells in the output grid.
    #[must_use]
    pub const fn num_cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The area candidate `candidate` covers in cell `cell`.
    #[must_use]
    pub fn score(&self, cell: usize, candidate: usize) -> f64 {
        self.scores[cell * self.candidates + candidate]
    }

    /// The per-candidate coverage of the given cell.
    pub(crate) fn row(&self, cell: usize) -> &[f64] {
        &self.scores[(cell * self.candidates)..((cell + 1) * self.candidates)]
    }
}
