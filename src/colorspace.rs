//! Conversion from device sRGB into CIELAB, the space all distances are measured in.

use crate::ColorSlice;
use palette::{IntoColor, Lab, Srgb};
#[cfg(feature = "threads")]
use rayon::prelude::*;

/// Converts a single device color into CIELAB via linear sRGB.
pub(crate) fn srgb_to_lab(color: Srgb<u8>) -> Lab {
    color.into_linear().into_color()
}

pub(crate) fn to_lab(colors: ColorSlice<'_, Srgb<u8>>) -> Vec<Lab> {
    colors.iter().copied().map(srgb_to_lab).collect()
}

#[cfg(feature = "threads")]
pub(crate) fn to_lab_par(colors: ColorSlice<'_, Srgb<u8>>) -> Vec<Lab> {
    colors.as_ref().par_iter().copied().map(srgb_to_lab).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn conversion_is_deterministic() {
        let color = Srgb::new(113, 57, 200);
        let a = srgb_to_lab(color);
        let b = srgb_to_lab(color);
        assert_eq!((a.l, a.a, a.b), (b.l, b.a, b.b));
    }

    #[test]
    fn black_and_white_lightness() {
        let black = srgb_to_lab(Srgb::new(0, 0, 0));
        let white = srgb_to_lab(Srgb::new(255, 255, 255));
        assert!(black.l.abs() < 1e-4);
        assert!((white.l - 100.0).abs() < 1e-3);
    }
}
