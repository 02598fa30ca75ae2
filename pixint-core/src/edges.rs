//! Bin boundaries.
#![allow(clippy::cast_precision_loss)]

use ndarray::ArrayView2;

use crate::coords::PixelCoordinates;
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The `n + 1` boundaries partitioning a coordinate range into `n` bins.
///
/// Edges are evenly spaced. They are strictly increasing unless the range
/// collapsed to a single value, which [`BinEdges::is_degenerate`] reports;
/// the binning engine then places everything in bin 0.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BinEdges {
    edges: Vec<f64>,
}

impl BinEdges {
    /// Evenly spaced edges from `lo` to `hi` inclusive.
    ///
    /// # Errors
    /// Returns a configuration error for zero bins, a non-finite limit, or
    /// `hi < lo`.
    pub fn from_limits(lo: f64, hi: f64, n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::config("number of bins must be positive"));
        }
        if !lo.is_finite() || !hi.is_finite() {
            return Err(Error::config(format!(
                "bin range must be finite, got [{lo}, {hi}]"
            )));
        }
        if hi < lo {
            return Err(Error::config(format!(
                "bin range is inverted: [{lo}, {hi}]"
            )));
        }

        let step = (hi - lo) / n_bins as f64;
        let mut edges: Vec<f64> = (0..=n_bins).map(|i| lo + step * i as f64).collect();
        // Pin the last edge so accumulated rounding cannot drop the maximum.
        edges[n_bins] = hi;
        Ok(Self { edges })
    }

    /// Edges for bins whose *centres* run from `lo` to `hi` inclusive.
    ///
    /// With `shift = (hi - lo) / (2 n)`, edges are spaced `2 shift` apart
    /// from `lo - shift` to `hi + shift`. Both endpoints get a bin centred
    /// on them, so the result holds `n + 1` bins: `[1, 3]` with two bins
    /// gives edges `[0.5, 1.5, 2.5, 3.5]` and centres `[1, 2, 3]`.
    ///
    /// # Errors
    /// Returns a configuration error for zero bins or a non-finite range.
    pub fn from_centre_range(range: [f64; 2], n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::config("number of bins must be positive"));
        }
        let (lo, hi) = if range[0] <= range[1] {
            (range[0], range[1])
        } else {
            (range[1], range[0])
        };
        let shift = (hi - lo) / (2.0 * n_bins as f64);
        Self::from_limits(lo - shift, hi + shift, n_bins + 1)
    }

    /// Edges spanning the observed finite, unmasked range of `coords`.
    ///
    /// Envelope arrays contribute both their minimum and maximum member. If
    /// nothing survives the mask the range collapses to `[0, 0]`.
    ///
    /// # Errors
    /// Returns a configuration error for zero bins or a shape mismatch if the
    /// mask and coordinates disagree.
    pub fn observed(
        coords: &[&PixelCoordinates],
        mask: Option<ArrayView2<'_, bool>>,
        n_bins: usize,
    ) -> Result<Self> {
        let [lo, hi] = observed_range(coords, mask)?.unwrap_or([0.0, 0.0]);
        Self::from_limits(lo, hi, n_bins)
    }

    /// Edges from an explicit bin-centre range when given, else the observed range.
    ///
    /// # Errors
    /// See [`BinEdges::from_centre_range`] and [`BinEdges::observed`].
    pub fn compute(
        coords: &[&PixelCoordinates],
        mask: Option<ArrayView2<'_, bool>>,
        explicit_range: Option<[f64; 2]>,
        n_bins: usize,
    ) -> Result<Self> {
        match explicit_range {
            Some(range) => Self::from_centre_range(range, n_bins),
            None => Self::observed(coords, mask, n_bins),
        }
    }

    /// Number of bins.
    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Lowest edge.
    #[must_use]
    pub fn lo(&self) -> f64 {
        self.edges[0]
    }

    /// Highest edge.
    #[must_use]
    pub fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Total span `hi - lo`.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.hi() - self.lo()
    }

    /// Width of one bin.
    #[must_use]
    pub fn bin_width(&self) -> f64 {
        self.span() / self.n_bins() as f64
    }

    /// True when the range collapsed and bins have zero width.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.bin_width() <= 0.0
    }

    /// Edges as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.edges
    }

    /// Bin centres.
    #[must_use]
    pub fn centres(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Bin holding `value`, with the last bin closed on the right.
    #[inline]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn locate(&self, value: f64) -> Option<usize> {
        let n = self.n_bins();
        let index = ((value - self.lo()) / self.bin_width()).floor();
        if index.is_nan() || index < 0.0 {
            return None;
        }
        let index = index as usize;
        if index < n {
            Some(index)
        } else if value <= self.hi() {
            Some(n - 1)
        } else {
            None
        }
    }
}

/// Finite min/max over `coords`, skipping masked-out pixels.
///
/// Returns `None` when no value survives.
///
/// # Errors
/// Returns a shape mismatch if the mask and a coordinate array disagree.
pub fn observed_range(
    coords: &[&PixelCoordinates],
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Option<[f64; 2]>> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for c in coords {
        if let Some(mask) = mask {
            Error::check_shape("mask", c.shape(), mask.dim())?;
        }
        for array in c.arrays() {
            for ((row, col), &v) in array.indexed_iter() {
                if !v.is_finite() || mask.is_some_and(|m| !m[[row, col]]) {
                    continue;
                }
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
    }
    Ok((lo <= hi).then_some([lo, hi]))
}
