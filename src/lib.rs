//! A library for turning photos into palette-constrained craft patterns.
//!
//! `stitchette` picks the best `k` colors out of a named candidate palette
//! (e.g. the threads you actually own) and maps an image onto a small
//! reduced-color grid suitable for cross stitch, knitting, or perler beads.
//! Distances are measured in CIELAB, so "best" tracks perception rather than
//! raw RGB differences.
//!
//! # Features
//! To reduce dependencies and compile times, `stitchette` has several `cargo`
//! features that can be turned off or on:
//! - `threads`: exposes parallel versions of most functions via [`rayon`].
//! - `image`: enables integration with the [`image`] crate.
//!
//! # High-Level API
//! To get started, see [`PatternPipeline`]:
//! ```no_run
//! # use stitchette::{PatternPipeline, NamedPalette, PatternSize, ReduceMethod};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let palette = NamedPalette::load("threads.json")?;
//! let img = image::open("photo.jpg")?.into_rgb8();
//!
//! let result = PatternPipeline::from_image(&img, &palette)?
//!     .target_colors(10u8.into()) // keep at most ten thread colors
//!     .pattern_size(PatternSize::new().width(90)) // 90 stitches wide
//!     .method(ReduceMethod::exact()) // error-minimal color choice
//!     .run()?;
//!
//! for (entry, count) in result.pattern.entries().iter().zip(result.pattern.color_usage()) {
//!     println!("{}: {count} stitches", entry.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The lower-level pieces (the [`distance`] matrix, the [`greedy`], [`exact`]
//! and [`pooling`] reducers, and the [`resize`] downsampler) are public for
//! callers that need to recombine them differently.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod colorspace;
mod palette;
mod types;

pub mod dedup;
pub mod distance;
pub mod exact;
pub mod greedy;
pub mod pooling;
pub mod resize;

pub use api::*;
pub use exact::ExactOptions;
pub use self::palette::{NamedPalette, PaletteEntry, PaletteError};
pub use resize::PatternSize;
pub use types::*;

/// The maximum supported image size in number of pixels is `u32::MAX`.
pub const MAX_PIXELS: u32 = u32::MAX;

/// The maximum supported number of palette candidates is `256`.
pub const MAX_CANDIDATES: u16 = u8::MAX as u16 + 1;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use crate::{ColorSlice, NamedPalette};
    use palette::Srgb;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;

    /// A six-candidate palette spread across the RGB cube.
    pub fn test_palette() -> NamedPalette {
        NamedPalette::new([
            ("black".to_owned(), Srgb::new(16, 16, 16)),
            ("white".to_owned(), Srgb::new(240, 240, 240)),
            ("crimson".to_owned(), Srgb::new(200, 30, 45)),
            ("leaf".to_owned(), Srgb::new(40, 160, 60)),
            ("navy".to_owned(), Srgb::new(25, 40, 140)),
            ("honey".to_owned(), Srgb::new(225, 180, 50)),
        ])
        .unwrap()
    }

    /// Deterministic pseudo-random pixels.
    pub fn test_pixels(len: usize) -> Vec<Srgb<u8>> {
        let mut rng = Xoroshiro128PlusPlus::seed_from_u64(42);
        (0..len)
            .map(|_| Srgb::new(rng.gen(), rng.gen(), rng.gen()))
            .collect()
    }

    pub fn to_color_slice(colors: &[Srgb<u8>]) -> ColorSlice<'_, Srgb<u8>> {
        colors.try_into().unwrap()
    }
}
