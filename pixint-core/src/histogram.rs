//! Histogram accumulators and published profiles.
//!
//! Accumulation keeps three running sums per bin: the weight (pixel count,
//! or fractional area under pixel splitting), the weighted signal and,
//! when the frame carries errors, the weighted variance. Publishing divides
//! by the weight and replaces every non-finite result (0/0 for empty bins)
//! with zero.

use ndarray::{Array2, Zip};

use crate::axis::Axis;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Running sums for a `[ny, nx]` grid of bins. A 1D histogram has `ny == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    weight: Array2<f64>,
    signal: Array2<f64>,
    variance: Option<Array2<f64>>,
}

impl Histogram {
    /// Empty grid of `ny` rows by `nx` columns.
    #[must_use]
    pub fn new(ny: usize, nx: usize, with_variance: bool) -> Self {
        Self {
            weight: Array2::zeros((ny, nx)),
            signal: Array2::zeros((ny, nx)),
            variance: with_variance.then(|| Array2::zeros((ny, nx))),
        }
    }

    /// Empty 1D histogram of `n` bins.
    #[must_use]
    pub fn one_dimensional(n: usize, with_variance: bool) -> Self {
        Self::new(1, n, with_variance)
    }

    /// Adds `signal` with fractional `weight` to cell `[y, x]`.
    ///
    /// The signal sum grows by `signal * weight` and the variance sum by
    /// `(error * weight)^2`.
    #[inline]
    pub fn add(&mut self, y: usize, x: usize, weight: f64, signal: f64, error: Option<f64>) {
        self.weight[[y, x]] += weight;
        self.signal[[y, x]] += signal * weight;
        if let (Some(variance), Some(error)) = (self.variance.as_mut(), error) {
            let e = error * weight;
            variance[[y, x]] += e * e;
        }
    }

    /// Adds every running sum of `other` into `self`.
    ///
    /// # Panics
    /// Panics if the two grids differ in shape.
    pub fn merge(&mut self, other: &Histogram) {
        self.weight += &other.weight;
        self.signal += &other.signal;
        if let (Some(mine), Some(theirs)) = (self.variance.as_mut(), other.variance.as_ref()) {
            *mine += theirs;
        }
    }

    /// Grid shape as (ny, nx).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.weight.dim()
    }

    /// Accumulated weight per bin.
    #[must_use]
    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    /// Accumulated weighted signal per bin.
    #[must_use]
    pub fn signal(&self) -> &Array2<f64> {
        &self.signal
    }

    /// Accumulated variance per bin, if errors were supplied.
    #[must_use]
    pub fn variance(&self) -> Option<&Array2<f64>> {
        self.variance.as_ref()
    }

    /// Sum of weight over all bins.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.weight.sum()
    }

    /// Mean intensity per bin, sanitized.
    #[must_use]
    pub fn intensity(&self) -> Array2<f64> {
        Zip::from(&self.signal)
            .and(&self.weight)
            .map_collect(|&s, &w| sanitize(s / w))
    }

    /// Standard error per bin, `sqrt(variance) / weight`, sanitized.
    #[must_use]
    pub fn error(&self) -> Option<Array2<f64>> {
        self.variance.as_ref().map(|variance| {
            Zip::from(variance)
                .and(&self.weight)
                .map_collect(|&v, &w| sanitize(v.sqrt() / w))
        })
    }

    /// Publishes a 1D profile along `axis`.
    #[must_use]
    pub fn into_profile(self, axis: Axis) -> Profile1D {
        let intensity = self.intensity().into_iter().collect();
        let error = self.error().map(|e| e.into_iter().collect());
        Profile1D {
            axis,
            intensity,
            error,
            weight: self.weight.into_iter().collect(),
        }
    }

    /// Publishes a 2D map with `x_axis` along columns and `y_axis` along rows.
    #[must_use]
    pub fn into_map(self, x_axis: Axis, y_axis: Axis) -> Profile2D {
        Profile2D {
            x_axis,
            intensity: self.intensity(),
            y_axis,
            error: self.error(),
            weight: self.weight,
        }
    }
}

/// Replaces NaN and infinities with zero.
#[inline]
#[must_use]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Published 1D profile.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profile1D {
    /// Bin centres.
    pub axis: Axis,
    /// Mean intensity per bin.
    pub intensity: Vec<f64>,
    /// Standard error per bin, if the frame carried errors.
    pub error: Option<Vec<f64>>,
    /// Accumulated weight per bin.
    pub weight: Vec<f64>,
}

impl Profile1D {
    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    /// Returns true if the profile has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }
}

/// Published 2D map, intensity indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profile2D {
    /// Column axis.
    pub x_axis: Axis,
    /// Mean intensity per cell.
    pub intensity: Array2<f64>,
    /// Row axis.
    pub y_axis: Axis,
    /// Standard error per cell, if the frame carried errors.
    pub error: Option<Array2<f64>>,
    /// Accumulated weight per cell.
    pub weight: Array2<f64>,
}
