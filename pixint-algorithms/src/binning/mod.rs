//! Histogram binning of detector frames.
//!
//! Four engines share one entry point, [`bin`]:
//!
//! | | whole pixel | pixel splitting |
//! |---|---|---|
//! | 1D | [`BinningStrategy::Whole1D`] | [`BinningStrategy::Split1D`] |
//! | 2D | [`BinningStrategy::Whole2D`] | [`BinningStrategy::Split2D`] |
//!
//! Whole-pixel engines drop each pixel into the single bin holding its
//! coordinate. Splitting engines spread it over every bin its coordinate
//! envelope overlaps, in proportion to the overlap.

mod parallel;
mod split;
mod whole;

pub use parallel::ExecutionStrategy;
pub use split::{range_fraction, split_fractions};

use log::warn;
use pixint_core::{BinEdges, Error, Frame, Histogram, Mask, PixelCoordinates, Result};

/// Which binning engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinningStrategy {
    /// One bin per pixel along one axis.
    Whole1D,
    /// Fractional coverage along one axis.
    Split1D,
    /// One cell per pixel on a 2D grid.
    Whole2D,
    /// Fractional coverage on a 2D grid.
    Split2D,
}

impl BinningStrategy {
    /// Strategy for the given output dimensionality and splitting mode.
    #[must_use]
    pub fn select(to_1d: bool, split: bool) -> Self {
        match (to_1d, split) {
            (true, false) => Self::Whole1D,
            (true, true) => Self::Split1D,
            (false, false) => Self::Whole2D,
            (false, true) => Self::Split2D,
        }
    }

    /// True for the pixel-splitting engines.
    #[must_use]
    pub fn is_split(self) -> bool {
        matches!(self, Self::Split1D | Self::Split2D)
    }

    /// True for the profile engines.
    #[must_use]
    pub fn is_1d(self) -> bool {
        matches!(self, Self::Whole1D | Self::Split1D)
    }
}

/// A coordinate array together with the edges it is binned on.
#[derive(Debug, Clone, Copy)]
pub struct BinnedAxis<'a> {
    /// Per-pixel coordinates in binning space.
    pub coords: &'a PixelCoordinates,
    /// Bin edges in binning space.
    pub edges: &'a BinEdges,
    /// Coordinates wrap every 360 degrees.
    pub periodic: bool,
}

impl<'a> BinnedAxis<'a> {
    /// Axis without wrap-around.
    #[must_use]
    pub fn new(coords: &'a PixelCoordinates, edges: &'a BinEdges) -> Self {
        Self {
            coords,
            edges,
            periodic: false,
        }
    }

    /// Axis whose coordinates are angles in degrees.
    #[must_use]
    pub fn periodic(coords: &'a PixelCoordinates, edges: &'a BinEdges) -> Self {
        Self {
            coords,
            edges,
            periodic: true,
        }
    }
}

/// A coordinate array that is not binned but limits which pixels count.
#[derive(Debug, Clone, Copy)]
pub struct AxisRestriction<'a> {
    /// Per-pixel coordinates in binning space.
    pub coords: &'a PixelCoordinates,
    /// Admitted closed interval in binning space.
    pub range: [f64; 2],
    /// Coordinates wrap every 360 degrees.
    pub periodic: bool,
}

/// Role of the second coordinate in a binning request.
#[derive(Debug, Clone, Copy)]
pub enum Secondary<'a> {
    /// 1D binning with no second coordinate.
    Unrestricted,
    /// 1D binning limited to pixels inside a range of the second coordinate.
    Restricted(AxisRestriction<'a>),
    /// 2D binning along the second coordinate.
    Binned(BinnedAxis<'a>),
}

/// Everything one binning pass reads.
#[derive(Debug, Clone, Copy)]
pub struct BinningRequest<'a> {
    /// Signal and optional errors.
    pub frame: &'a Frame,
    /// Effective inclusion mask.
    pub mask: Option<&'a Mask>,
    /// Axis along histogram columns.
    pub primary: BinnedAxis<'a>,
    /// Restriction or axis along histogram rows.
    pub secondary: Secondary<'a>,
}

impl BinningRequest<'_> {
    /// Histogram shape `[ny, nx]` this request fills.
    #[must_use]
    pub fn histogram_shape(&self) -> (usize, usize) {
        let nx = self.primary.edges.n_bins();
        match self.secondary {
            Secondary::Binned(axis) => (axis.edges.n_bins(), nx),
            _ => (1, nx),
        }
    }

    fn secondary_coords(&self) -> Option<&PixelCoordinates> {
        match self.secondary {
            Secondary::Unrestricted => None,
            Secondary::Restricted(restriction) => Some(restriction.coords),
            Secondary::Binned(axis) => Some(axis.coords),
        }
    }

    /// Checks the request fits `strategy` and that every array matches the frame.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] for mismatched arrays and
    /// [`Error::Configuration`] when the coordinate variants or the secondary
    /// role do not suit the strategy.
    pub fn validate(&self, strategy: BinningStrategy) -> Result<()> {
        let shape = self.frame.shape();
        Error::check_shape("primary coordinates", shape, self.primary.coords.shape())?;
        if let Some(coords) = self.secondary_coords() {
            Error::check_shape("secondary coordinates", shape, coords.shape())?;
        }
        if let Some(mask) = self.mask {
            Error::check_shape("mask", shape, mask.shape())?;
        }

        let variants_match = std::iter::once(self.primary.coords)
            .chain(self.secondary_coords())
            .all(|coords| coords.is_envelope() == strategy.is_split());
        if !variants_match {
            return Err(Error::config(format!(
                "{strategy:?} needs {} coordinates",
                if strategy.is_split() {
                    "min/max envelope"
                } else {
                    "pixel centre"
                }
            )));
        }

        let binned_secondary = matches!(self.secondary, Secondary::Binned(_));
        if strategy.is_1d() == binned_secondary {
            return Err(Error::config(format!(
                "{strategy:?} cannot {} a second axis",
                if binned_secondary { "bin" } else { "run without" }
            )));
        }
        Ok(())
    }

    #[inline]
    fn includes(&self, row: usize, col: usize) -> bool {
        self.mask.map_or(true, |mask| mask.keeps(row, col))
    }
}

/// Closed-interval membership, also trying `value ± 360` when periodic.
#[inline]
#[must_use]
pub fn in_range(value: f64, [lo, hi]: [f64; 2], periodic: bool) -> bool {
    let inside = |v: f64| v >= lo && v <= hi;
    inside(value) || (periodic && (inside(value - 360.0) || inside(value + 360.0)))
}

fn warn_if_degenerate(name: &str, edges: &BinEdges) {
    if edges.is_degenerate() {
        warn!(
            "{name} range [{}, {}] has zero width; binning every pixel into bin 0",
            edges.lo(),
            edges.hi()
        );
    }
}

/// Accumulates `request.frame` with the chosen engine.
///
/// Pixels are skipped when masked out, when their signal or coordinate is
/// non-finite, or when they fall outside the edges or the restriction.
///
/// # Errors
/// See [`BinningRequest::validate`]; no data-dependent condition is an error.
pub fn bin(
    strategy: BinningStrategy,
    request: &BinningRequest<'_>,
    execution: ExecutionStrategy,
) -> Result<Histogram> {
    request.validate(strategy)?;

    warn_if_degenerate("primary", request.primary.edges);
    if let Secondary::Binned(axis) = request.secondary {
        warn_if_degenerate("secondary", axis.edges);
    }

    let (rows, _) = request.frame.shape();
    let shape = request.histogram_shape();
    let with_variance = request.frame.error().is_some();

    let hist = if strategy.is_split() {
        parallel::reduce_rows(rows, shape, with_variance, execution, |row, hist| {
            split::accumulate_row(request, row, hist);
        })
    } else {
        parallel::reduce_rows(rows, shape, with_variance, execution, |row, hist| {
            whole::accumulate_row(request, row, hist);
        })
    };
    Ok(hist)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_select() {
        assert_eq!(BinningStrategy::select(true, false), BinningStrategy::Whole1D);
        assert_eq!(BinningStrategy::select(true, true), BinningStrategy::Split1D);
        assert_eq!(BinningStrategy::select(false, false), BinningStrategy::Whole2D);
        assert_eq!(BinningStrategy::select(false, true), BinningStrategy::Split2D);
    }

    #[test]
    fn test_in_range_periodic() {
        assert!(in_range(180.0, [-180.0, -170.0], true));
        assert!(!in_range(180.0, [-180.0, -170.0], false));
        assert!(in_range(190.0, [-175.0, -165.0], true));
    }

    #[test]
    fn test_variant_mismatch_is_config_error() {
        let frame = Frame::new(Array2::ones((2, 2)));
        let coords = PixelCoordinates::Centre(array![[0.0, 1.0], [2.0, 3.0]]);
        let edges = BinEdges::from_limits(0.0, 3.0, 3).unwrap();
        let request = BinningRequest {
            frame: &frame,
            mask: None,
            primary: BinnedAxis::new(&coords, &edges),
            secondary: Secondary::Unrestricted,
        };
        assert!(matches!(
            bin(BinningStrategy::Split1D, &request, ExecutionStrategy::Serial),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            bin(BinningStrategy::Whole2D, &request, ExecutionStrategy::Serial),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_mask_shape_checked_before_binning() {
        let frame = Frame::new(Array2::ones((2, 2)));
        let coords = PixelCoordinates::Centre(Array2::zeros((2, 2)));
        let edges = BinEdges::from_limits(0.0, 1.0, 2).unwrap();
        let mask = Mask::keep_all((3, 2));
        let request = BinningRequest {
            frame: &frame,
            mask: Some(&mask),
            primary: BinnedAxis::new(&coords, &edges),
            secondary: Secondary::Unrestricted,
        };
        assert!(matches!(
            bin(BinningStrategy::Whole1D, &request, ExecutionStrategy::Serial),
            Err(Error::ShapeMismatch { what: "mask", .. })
        ));
    }

    #[test]
    fn test_whole_and_split_agree_for_point_envelopes() {
        let values = array![[0.2, 1.4, 2.9], [0.7, 1.1, 3.0]];
        let frame = Frame::new(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let edges = BinEdges::from_limits(0.0, 3.0, 3).unwrap();

        let centre = PixelCoordinates::Centre(values.clone());
        let envelope = PixelCoordinates::envelope(values.clone(), values).unwrap();

        let whole = bin(
            BinningStrategy::Whole1D,
            &BinningRequest {
                frame: &frame,
                mask: None,
                primary: BinnedAxis::new(&centre, &edges),
                secondary: Secondary::Unrestricted,
            },
            ExecutionStrategy::Serial,
        )
        .unwrap();
        let split = bin(
            BinningStrategy::Split1D,
            &BinningRequest {
                frame: &frame,
                mask: None,
                primary: BinnedAxis::new(&envelope, &edges),
                secondary: Secondary::Unrestricted,
            },
            ExecutionStrategy::Serial,
        )
        .unwrap();

        assert_eq!(whole.weight(), split.weight());
        for (a, b) in whole.intensity().iter().zip(split.intensity().iter()) {
            assert_relative_eq!(a, b);
        }
    }
}
