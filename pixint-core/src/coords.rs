//! Per-pixel coordinate arrays.

use ndarray::Array2;

use crate::error::{Error, Result};

/// One scalar coordinate per detector pixel.
///
/// `Centre` holds a single value per pixel (whole-pixel binning). `Envelope`
/// holds the minimum and maximum coordinate spanned by the pixel footprint
/// (pixel-splitting binning). Arrays are indexed `[row, col]`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelCoordinates {
    /// Value at the pixel sample position.
    Centre(Array2<f64>),
    /// Coordinate envelope of the pixel footprint.
    Envelope {
        /// Smallest coordinate covered by the pixel.
        min: Array2<f64>,
        /// Largest coordinate covered by the pixel.
        max: Array2<f64>,
    },
}

impl PixelCoordinates {
    /// Builds an envelope, checking both members share a shape.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `min` and `max` disagree.
    pub fn envelope(min: Array2<f64>, max: Array2<f64>) -> Result<Self> {
        Error::check_shape("envelope maximum", min.dim(), max.dim())?;
        Ok(Self::Envelope { min, max })
    }

    /// Shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Centre(values) => values.dim(),
            Self::Envelope { min, .. } => min.dim(),
        }
    }

    /// True for the min/max variant.
    #[must_use]
    pub fn is_envelope(&self) -> bool {
        matches!(self, Self::Envelope { .. })
    }

    /// Underlying arrays: one for `Centre`, two for `Envelope`.
    #[must_use]
    pub fn arrays(&self) -> Vec<&Array2<f64>> {
        match self {
            Self::Centre(values) => vec![values],
            Self::Envelope { min, max } => vec![min, max],
        }
    }

    /// Envelope of pixel `[row, col]`; a centre value is a zero-width envelope.
    #[inline]
    #[must_use]
    pub fn bounds(&self, row: usize, col: usize) -> (f64, f64) {
        match self {
            Self::Centre(values) => {
                let v = values[[row, col]];
                (v, v)
            }
            Self::Envelope { min, max } => (min[[row, col]], max[[row, col]]),
        }
    }

    /// Representative value of pixel `[row, col]`; the envelope midpoint when split.
    #[inline]
    #[must_use]
    pub fn value(&self, row: usize, col: usize) -> f64 {
        match self {
            Self::Centre(values) => values[[row, col]],
            Self::Envelope { min, max } => 0.5 * (min[[row, col]] + max[[row, col]]),
        }
    }

    /// Applies a monotonically increasing map to every value.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64 + Copy) -> Self {
        match self {
            Self::Centre(values) => Self::Centre(values.mapv(f)),
            Self::Envelope { min, max } => Self::Envelope {
                min: min.mapv(f),
                max: max.mapv(f),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_bounds_and_value() {
        let centre = PixelCoordinates::Centre(array![[1.0, 2.0]]);
        assert_eq!(centre.bounds(0, 1), (2.0, 2.0));
        assert!(!centre.is_envelope());

        let env = PixelCoordinates::envelope(array![[1.0, 2.0]], array![[3.0, 2.5]]).unwrap();
        assert_eq!(env.bounds(0, 0), (1.0, 3.0));
        assert_eq!(env.value(0, 0), 2.0);
        assert_eq!(env.arrays().len(), 2);
    }

    #[test]
    fn test_envelope_shape_mismatch() {
        let result = PixelCoordinates::envelope(Array2::zeros((2, 2)), Array2::zeros((2, 3)));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_map_keeps_variant() {
        let env = PixelCoordinates::envelope(array![[10.0]], array![[100.0]]).unwrap();
        let (lo, hi) = env.map(f64::log10).bounds(0, 0);
        assert_relative_eq!(lo, 1.0);
        assert_relative_eq!(hi, 2.0);
    }
}
