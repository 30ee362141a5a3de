//! The pixel-to-candidate distance matrix and the active-candidate mask.
//!
//! Distances are squared euclidean distances in CIELAB, computed once up front
//! and never touched again. Reducers only toggle candidates off via
//! [`Selection`], which adds an infinite sentinel to the masked lanes so the
//! arg-min loop needs no branching.

use crate::{colorspace, ColorSlice, NamedPalette};
use bitvec::vec::BitVec;
use palette::{Lab, Srgb};
#[cfg(feature = "threads")]
use rayon::prelude::*;
use std::array;
use wide::{f32x8, u32x8, CmpLt};

/// The lanes of one 8-candidate chunk: `l`, `a`, and `b` components.
type LabChunk = [f32x8; 3];

fn candidate_chunks(colors: &[Srgb<u8>]) -> Vec<LabChunk> {
    let lab = colors
        .iter()
        .map(|&c| colorspace::srgb_to_lab(c))
        .collect::<Vec<_>>();

    lab.chunks(8)
        .map(|chunk| {
            // pad the final chunk with infinite components,
            // giving the padding lanes an infinite distance to everything
            let mut comp = [[f32::INFINITY; 8]; 3];
            for (i, p) in chunk.iter().enumerate() {
                comp[0][i] = p.l;
                comp[1][i] = p.a;
                comp[2][i] = p.b;
            }
            comp.map(f32x8::new)
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn lane_indices(len: usize) -> Vec<u32x8> {
    (0..len.div_ceil(8))
        .map(|chunk| {
            u32x8::new(array::from_fn(|lane| {
                let i = chunk * 8 + lane;
                if i < len { i as u32 } else { u32::MAX }
            }))
        })
        .collect()
}

fn distance_row(point: Lab, candidates: &[LabChunk]) -> impl Iterator<Item = f32x8> + '_ {
    let p = [point.l, point.a, point.b].map(f32x8::splat);
    candidates.iter().map(move |chunk| {
        let dl = p[0] - chunk[0];
        let da = p[1] - chunk[1];
        let db = p[2] - chunk[2];
        dl * dl + da * da + db * db
    })
}

/// The precomputed distances between every pixel and every palette candidate.
///
/// Rows are pixels and columns are candidates, stored in 8-wide SIMD chunks
/// with the final chunk padded by `f32::INFINITY`.
pub struct DistanceMatrix {
    /// The number of candidates (columns).
    candidates: usize,
    /// The number of SIMD chunks per row.
    chunks: usize,
    /// Row-major chunked distances, `num_pixels * chunks` long.
    data: Vec<f32x8>,
    /// The candidate index of each lane of each chunk.
    indices: Vec<u32x8>,
}

impl DistanceMatrix {
    /// Computes the distance matrix between the given pixels and palette.
    #[must_use]
    pub fn new(colors: ColorSlice<'_, Srgb<u8>>, palette: &NamedPalette) -> Self {
        let candidates = candidate_chunks(palette.colors());
        let pixels = colorspace::to_lab(colors);

        let data = pixels
            .iter()
            .flat_map(|&p| distance_row(p, &candidates))
            .collect();

        Self {
            candidates: palette.len(),
            chunks: palette.len().div_ceil(8),
            data,
            indices: lane_indices(palette.len()),
        }
    }

    /// Parallel version of [`DistanceMatrix::new`] with identical output.
    #[must_use]
    #[cfg(feature = "threads")]
    pub fn new_par(colors: ColorSlice<'_, Srgb<u8>>, palette: &NamedPalette) -> Self {
        let candidates = candidate_chunks(palette.colors());
        let pixels = colorspace::to_lab_par(colors);

        let data = pixels
            .par_iter()
            .flat_map_iter(|&p| distance_row(p, &candidates))
            .collect();

        Self {
            candidates: palette.len(),
            chunks: palette.len().div_ceil(8),
            data,
            indices: lane_indices(palette.len()),
        }
    }

    /// The number of candidates (columns).
    #[must_use]
    pub fn num_candidates(&self) -> usize {
        self.candidates
    }

    /// The number of pixels (rows).
    #[must_use]
    pub fn num_pixels(&self) -> usize {
        if self.chunks == 0 { 0 } else { self.data.len() / self.chunks }
    }

    /// The squared CIELAB distance between the given pixel and candidate.
    #[must_use]
    pub fn distance(&self, pixel: usize, candidate: usize) -> f32 {
        assert!(candidate < self.candidates);
        self.data[pixel * self.chunks + candidate / 8].as_array_ref()[candidate % 8]
    }

    /// Returns the active candidate nearest to the given pixel and its squared distance.
    ///
    /// Ties are broken towards the lowest candidate index. At least one
    /// candidate must be active.
    #[must_use]
    pub fn nearest(&self, pixel: usize, selection: &Selection) -> (u8, f32) {
        debug_assert_eq!(selection.len(), self.candidates);
        debug_assert!(selection.num_active() > 0);

        let row = &self.data[(pixel * self.chunks)..((pixel + 1) * self.chunks)];

        let mut min_distance = f32x8::splat(f32::INFINITY);
        let mut min_index = u32x8::splat(u32::MAX);
        for ((&chunk, &sentinel), &index) in
            row.iter().zip(selection.mask()).zip(&self.indices)
        {
            let distance = chunk + sentinel;
            // strict comparison keeps the lowest chunk index per lane
            let mask = u32x8::new(distance.cmp_lt(min_distance).to_array().map(f32::to_bits));
            min_index = mask.blend(index, min_index);
            min_distance = min_distance.fast_min(distance);
        }

        let mut best_dist = f32::INFINITY;
        let mut best_index = u32::MAX;
        for (&d, &i) in min_distance
            .as_array_ref()
            .iter()
            .zip(min_index.as_array_ref())
        {
            // lanes hold different candidate indices, so on equal
            // distance the lower index wins regardless of lane order
            if d < best_dist || (d == best_dist && i < best_index) {
                best_dist = d;
                best_index = i;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let best_index = best_index as u8;
        (best_index, best_dist)
    }
}

/// Assigns every pixel to its nearest active candidate.
#[must_use]
pub fn nearest_indices(matrix: &DistanceMatrix, selection: &Selection) -> Vec<u8> {
    (0..matrix.num_pixels())
        .map(|pixel| matrix.nearest(pixel, selection).0)
        .collect()
}

/// Parallel version of [`nearest_indices`] with identical output.
#[must_use]
#[cfg(feature = "threads")]
pub fn nearest_indices_par(matrix: &DistanceMatrix, selection: &Selection) -> Vec<u8> {
    (0..matrix.num_pixels())
        .into_par_iter()
        .map(|pixel| matrix.nearest(pixel, selection).0)
        .collect()
}

/// The set of candidates still eligible for assignment.
///
/// Candidates start active and can only be deactivated. Alongside the bit set,
/// a per-lane additive sentinel (`0.0` for active, `f32::INFINITY` for
/// deactivated) is kept in SIMD form so that masking a distance row is a
/// single vector add.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Which candidates are still active.
    active: BitVec,
    /// The additive sentinel per lane: `0.0` if active, infinity otherwise.
    mask: Vec<f32x8>,
}

// the mask is derived from the bit set, so comparing the bits is enough
impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.active == other.active
    }
}

impl Eq for Selection {}

impl Selection {
    /// Creates a selection over `len` candidates with every candidate active.
    #[must_use]
    pub fn all_active(len: usize) -> Self {
        Self {
            active: BitVec::repeat(true, len),
            mask: vec![f32x8::splat(0.0); len.div_ceil(8)],
        }
    }

    /// The total number of candidates, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether the selection covers zero candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// The number of candidates still active.
    #[must_use]
    pub fn num_active(&self) -> usize {
        self.active.count_ones()
    }

    /// Whether the given candidate is still active.
    #[must_use]
    pub fn is_active(&self, candidate: usize) -> bool {
        self.active[candidate]
    }

    /// Deactivates the given candidate. Deactivation is permanent.
    pub fn deactivate(&mut self, candidate: usize) {
        self.active.set(candidate, false);
        let mut lanes = *self.mask[candidate / 8].as_array_ref();
        lanes[candidate % 8] = f32::INFINITY;
        self.mask[candidate / 8] = f32x8::new(lanes);
    }

    /// Iterates over the active candidate indices in increasing order.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter_ones()
    }

    /// The additive sentinel mask, one lane per candidate.
    pub(crate) fn mask(&self) -> &[f32x8] {
        &self.mask
    }
}
