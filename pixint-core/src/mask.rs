//! Pixel masks and region-of-interest predicates.
//!
//! The effective inclusion of a pixel is `mask[pixel] && region.contains(centre)`:
//! a region can only exclude further, it never re-includes a masked pixel.
//! Regions are evaluated at the pixel centre `(col + 0.5, row + 0.5)`.
#![allow(clippy::cast_precision_loss)]

use ndarray::{Array2, ArrayView2};

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Predicate selecting a region of the detector in pixel coordinates.
pub trait RegionOfInterest: Send + Sync {
    /// True if the point `(x, y)` (column, row) lies inside the region.
    fn contains(&self, x: f64, y: f64) -> bool;
}

/// Axis-aligned rectangle `[x, x + width) × [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RectangularRegion {
    /// Left edge (column).
    pub x: f64,
    /// Top edge (row).
    pub y: f64,
    /// Extent along columns.
    pub width: f64,
    /// Extent along rows.
    pub height: f64,
}

impl RegionOfInterest for RectangularRegion {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Annular wedge around a centre.
///
/// The angular arc runs counter-clockwise from `angles[0]` to `angles[1]`
/// (degrees, `atan2(dy, dx)` convention) and may cross ±180°.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectorRegion {
    /// Centre `(x, y)` in pixels.
    pub centre: (f64, f64),
    /// Inner and outer radius in pixels.
    pub radii: [f64; 2],
    /// Start and end angle in degrees.
    pub angles: [f64; 2],
}

impl SectorRegion {
    /// Full ring between two radii.
    #[must_use]
    pub fn ring(centre: (f64, f64), radii: [f64; 2]) -> Self {
        Self {
            centre,
            radii,
            angles: [-180.0, 180.0],
        }
    }

    fn covers_angle(&self, angle: f64) -> bool {
        let [start, end] = self.angles;
        if (end - start).abs() >= 360.0 {
            return true;
        }
        (angle - start).rem_euclid(360.0) <= (end - start).rem_euclid(360.0)
    }
}

impl RegionOfInterest for SectorRegion {
    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.centre.0;
        let dy = y - self.centre.1;
        let r = dx.hypot(dy);
        r >= self.radii[0] && r <= self.radii[1] && self.covers_angle(dy.atan2(dx).to_degrees())
    }
}

/// Boolean inclusion mask; `true` keeps a pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    keep: Array2<bool>,
}

impl Mask {
    /// Wraps an inclusion array.
    #[must_use]
    pub fn new(keep: Array2<bool>) -> Self {
        Self { keep }
    }

    /// Mask keeping every pixel.
    #[must_use]
    pub fn keep_all(shape: (usize, usize)) -> Self {
        Self::new(Array2::from_elem(shape, true))
    }

    /// Mask built from a region alone.
    #[must_use]
    pub fn from_region(shape: (usize, usize), region: &dyn RegionOfInterest) -> Self {
        Self::keep_all(shape).restrict(region)
    }

    /// Combines an optional mask with an optional region.
    ///
    /// Returns `None` when neither is given.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `mask` does not have shape `shape`.
    pub fn effective(
        shape: (usize, usize),
        mask: Option<&Mask>,
        region: Option<&dyn RegionOfInterest>,
    ) -> Result<Option<Mask>> {
        if let Some(mask) = mask {
            Error::check_shape("mask", shape, mask.shape())?;
        }
        Ok(match (mask, region) {
            (None, None) => None,
            (Some(mask), None) => Some(mask.clone()),
            (None, Some(region)) => Some(Self::from_region(shape, region)),
            (Some(mask), Some(region)) => Some(mask.clone().restrict(region)),
        })
    }

    /// Excludes every pixel whose centre lies outside `region`.
    #[must_use]
    pub fn restrict(mut self, region: &dyn RegionOfInterest) -> Self {
        for ((row, col), keep) in self.keep.indexed_iter_mut() {
            if *keep && !region.contains(col as f64 + 0.5, row as f64 + 0.5) {
                *keep = false;
            }
        }
        self
    }

    /// Shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.keep.dim()
    }

    /// True if pixel `[row, col]` is kept.
    #[inline]
    #[must_use]
    pub fn keeps(&self, row: usize, col: usize) -> bool {
        self.keep[[row, col]]
    }

    /// Number of kept pixels.
    #[must_use]
    pub fn count_kept(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Borrowed view of the inclusion array.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, bool> {
        self.keep.view()
    }
}

impl From<Array2<bool>> for Mask {
    fn from(keep: Array2<bool>) -> Self {
        Self::new(keep)
    }
}
