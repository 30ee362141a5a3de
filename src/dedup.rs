//! Deduplication of the input pixels.
//!
//! Photographs repeat colors heavily, so the per-pixel distance work is done
//! once per distinct color and weighted by its multiplicity. [`UniqueColors`]
//! records the distinct colors, their counts, and the mapping back to pixels.

use crate::ColorSlice;
use palette::Srgb;
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// The distinct colors of an image with their multiplicities
/// and the mapping from each original pixel to its distinct color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueColors {
    /// The distinct colors in ascending packed RGB order.
    colors: Vec<Srgb<u8>>,
    /// The multiplicity of each distinct color.
    counts: Vec<u32>,
    /// For each original pixel, the index of its distinct color.
    indices: Vec<u32>,
}

fn packed(color: Srgb<u8>) -> u32 {
    u32::from(color.red) << 16 | u32::from(color.green) << 8 | u32::from(color.blue)
}

#[allow(clippy::cast_possible_truncation)]
fn unpacked(key: u32) -> Srgb<u8> {
    Srgb::new((key >> 16) as u8, (key >> 8) as u8, key as u8)
}

impl UniqueColors {
    fn from_sorted_pairs(pairs: Vec<(u32, u32)>) -> Self {
        let mut colors = Vec::new();
        let mut counts: Vec<u32> = Vec::new();
        let mut indices = vec![0; pairs.len()];

        let mut prev = None;
        for (key, pixel) in pairs {
            if prev != Some(key) {
                colors.push(unpacked(key));
                counts.push(0);
                prev = Some(key);
            }
            #[allow(clippy::cast_possible_truncation)]
            let unique = (colors.len() - 1) as u32;
            counts[unique as usize] += 1;
            indices[pixel as usize] = unique;
        }

        Self { colors, counts, indices }
    }

    /// Deduplicates the given pixels.
    ///
    /// Distinct colors are reported in ascending packed RGB order,
    /// so the result is independent of pixel order up to `indices`.
    #[must_use]
    pub fn new(colors: ColorSlice<'_, Srgb<u8>>) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let mut pairs = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| (packed(c), i as u32))
            .collect::<Vec<_>>();

        pairs.sort_unstable();
        Self::from_sorted_pairs(pairs)
    }

    /// Parallel version of [`UniqueColors::new`] with identical output.
    #[must_use]
    #[cfg(feature = "threads")]
    pub fn new_par(colors: ColorSlice<'_, Srgb<u8>>) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let mut pairs = colors
            .as_ref()
            .par_iter()
            .enumerate()
            .map(|(i, &c)| (packed(c), i as u32))
            .collect::<Vec<_>>();

        pairs.par_sort_unstable();
        Self::from_sorted_pairs(pairs)
    }

    /// The number of distinct colors.
    #[must_use]
    pub fn num_unique(&self) -> usize {
        self.colors.len()
    }

    /// The distinct colors in ascending packed RGB order.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// The distinct colors as a [`ColorSlice`].
    #[must_use]
    pub fn color_slice(&self) -> ColorSlice<'_, Srgb<u8>> {
        // never longer than the validated input
        ColorSlice::new_unchecked(&self.colors)
    }

    /// The multiplicity of each distinct color.
    #[must_use]
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// For each original pixel, the index of its distinct color.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Expands a per-distinct-color value back to a per-pixel buffer.
    #[must_use]
    pub fn map_indices(&self, per_unique: &[u8]) -> Vec<u8> {
        self.indices
            .iter()
            .map(|&i| per_unique[i as usize])
            .collect()
    }

    /// Parallel version of [`UniqueColors::map_indices`] with identical output.
    #[must_use]
    #[cfg(feature = "threads")]
    pub fn map_indices_par(&self, per_unique: &[u8]) -> Vec<u8> {
        self.indices
            .par_iter()
            .map(|&i| per_unique[i as usize])
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::{test_pixels, to_color_slice};

    fn assert_valid(unique: &UniqueColors, pixels: &[Srgb<u8>]) {
        let total: u64 = unique.counts().iter().map(|&c| u64::from(c)).sum();
        assert_eq!(total, pixels.len() as u64);
        assert_eq!(unique.indices().len(), pixels.len());
        assert!(unique.colors().windows(2).all(|w| packed(w[0]) < packed(w[1])));

        for (&pixel, &index) in pixels.iter().zip(unique.indices()) {
            assert_eq!(unique.colors()[index as usize], pixel);
        }
    }

    #[test]
    fn deduplicates_and_maps_back() {
        let pixels = test_pixels(512);
        let unique = UniqueColors::new(to_color_slice(&pixels));
        assert_valid(&unique, &pixels);
        assert!(unique.num_unique() <= pixels.len());
    }

    #[test]
    fn counts_repeated_colors() {
        let red = Srgb::new(200, 10, 10);
        let blue = Srgb::new(10, 10, 200);
        let pixels = vec![red, blue, red, red];
        let unique = UniqueColors::new(to_color_slice(&pixels));

        assert_eq!(unique.num_unique(), 2);
        assert_valid(&unique, &pixels);
        // blue sorts before red in packed order
        assert_eq!(unique.colors(), &[blue, red]);
        assert_eq!(unique.counts(), &[1, 3]);
    }

    #[test]
    fn map_indices_expands_per_pixel() {
        let red = Srgb::new(200, 10, 10);
        let blue = Srgb::new(10, 10, 200);
        let pixels = vec![red, blue, red];
        let unique = UniqueColors::new(to_color_slice(&pixels));

        let per_unique = [7, 3];
        assert_eq!(unique.map_indices(&per_unique), vec![3, 7, 3]);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn parallel_matches_sequential() {
        let pixels = test_pixels(2048);
        let seq = UniqueColors::new(to_color_slice(&pixels));
        let par = UniqueColors::new_par(to_color_slice(&pixels));
        assert_eq!(seq, par);
    }
}
