//! Remapping of a frame onto a grid of caller-supplied per-pixel coordinates.
//!
//! Any pair of arrays matching the frame (for example q∥/q⊥ computed
//! elsewhere, or raw detector row/column) can serve as the x and y axes.
//! Split envelopes are estimated by finite differences since no pixel
//! corners are known.

use std::sync::OnceLock;

use log::debug;
use ndarray::Array2;
use pixint_core::{
    Axis, BinEdges, Error, Frame, Mask, PixelCoordinates, Profile2D, RegionOfInterest, Result,
};

use crate::binning::{bin, BinnedAxis, BinningRequest, BinningStrategy, ExecutionStrategy, Secondary};
use crate::processing::{edges_under_mask, prepare_mask};

/// Configuration of a 2D remap.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct RemapOptions {
    /// Number of bins along x (columns of the map).
    pub number_of_bins_x: usize,
    /// Number of bins along y (rows of the map).
    pub number_of_bins_y: usize,
    /// Distribute each pixel over every cell its envelope overlaps.
    pub use_pixel_splitting: bool,
    /// Range of x bin centres.
    pub x_range: Option<[f64; 2]>,
    /// Range of y bin centres.
    pub y_range: Option<[f64; 2]>,
    /// Label of the x axis.
    pub x_name: String,
    /// Units of the x axis.
    pub x_units: String,
    /// Label of the y axis.
    pub y_name: String,
    /// Units of the y axis.
    pub y_units: String,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            number_of_bins_x: 500,
            number_of_bins_y: 500,
            use_pixel_splitting: false,
            x_range: None,
            y_range: None,
            x_name: "x".to_string(),
            x_units: String::new(),
            y_name: "y".to_string(),
            y_units: String::new(),
        }
    }
}

impl RemapOptions {
    /// Set both bin counts.
    #[must_use]
    pub fn with_bins(mut self, x: usize, y: usize) -> Self {
        self.number_of_bins_x = x;
        self.number_of_bins_y = y;
        self
    }

    /// Enable or disable pixel splitting.
    #[must_use]
    pub fn with_pixel_splitting(mut self, split: bool) -> Self {
        self.use_pixel_splitting = split;
        self
    }

    /// Set the x range of bin centres.
    #[must_use]
    pub fn with_x_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.x_range = range;
        self
    }

    /// Set the y range of bin centres.
    #[must_use]
    pub fn with_y_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.y_range = range;
        self
    }

    /// Label the x axis.
    #[must_use]
    pub fn with_x_axis(mut self, name: impl Into<String>, units: impl Into<String>) -> Self {
        self.x_name = name.into();
        self.x_units = units.into();
        self
    }

    /// Label the y axis.
    #[must_use]
    pub fn with_y_axis(mut self, name: impl Into<String>, units: impl Into<String>) -> Self {
        self.y_name = name.into();
        self.y_units = units.into();
        self
    }

    /// Checks bin counts and ranges.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a zero bin count or a
    /// non-finite or zero-width range.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_bins_x == 0 || self.number_of_bins_y == 0 {
            return Err(Error::config("remap bin counts must be positive"));
        }
        for (name, range) in [("x", self.x_range), ("y", self.y_range)] {
            if let Some([a, b]) = range {
                if !a.is_finite() || !b.is_finite() || a == b {
                    return Err(Error::config(format!(
                        "{name} range must be a finite, non-empty interval, got [{a}, {b}]"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Half the forward difference along each axis, the last row/column
/// reusing the one before it. A single row or column has no spread.
fn half_differences(values: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let (rows, cols) = values.dim();
    let along_cols = Array2::from_shape_fn((rows, cols), |(r, c)| {
        if cols < 2 {
            return 0.0;
        }
        let c = c.min(cols - 2);
        0.5 * (values[[r, c + 1]] - values[[r, c]])
    });
    let along_rows = Array2::from_shape_fn((rows, cols), |(r, c)| {
        if rows < 2 {
            return 0.0;
        }
        let r = r.min(rows - 2);
        0.5 * (values[[r + 1, c]] - values[[r, c]])
    });
    (along_cols, along_rows)
}

/// Envelope `value ± (|Δcol| + |Δrow|)` of a coordinate array.
#[must_use]
pub fn finite_difference_envelope(values: &Array2<f64>) -> PixelCoordinates {
    let (along_cols, along_rows) = half_differences(values);
    let spread = along_cols.mapv(f64::abs) + along_rows.mapv(f64::abs);
    PixelCoordinates::Envelope {
        min: values - &spread,
        max: values + &spread,
    }
}

/// Lazily derived state for remapping frames of one shape.
#[derive(Debug)]
pub struct RemapCache {
    x: Array2<f64>,
    y: Array2<f64>,
    options: RemapOptions,
    x_coords: OnceLock<PixelCoordinates>,
    y_coords: OnceLock<PixelCoordinates>,
    x_edges: OnceLock<Result<BinEdges>>,
    y_edges: OnceLock<Result<BinEdges>>,
}

impl RemapCache {
    /// Cache for the given per-pixel x and y values.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `x` and `y` differ in shape, or a
    /// configuration error if `options` fail validation.
    pub fn new(x: Array2<f64>, y: Array2<f64>, options: RemapOptions) -> Result<Self> {
        Error::check_shape("remap y array", x.dim(), y.dim())?;
        options.validate()?;
        Ok(Self {
            x,
            y,
            options,
            x_coords: OnceLock::new(),
            y_coords: OnceLock::new(),
            x_edges: OnceLock::new(),
            y_edges: OnceLock::new(),
        })
    }

    /// Shape of the coordinate arrays.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.x.dim()
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &RemapOptions {
        &self.options
    }

    /// Replaces the options, dropping memoized state that depends on what changed.
    ///
    /// # Errors
    /// Returns a configuration error and leaves the cache untouched if
    /// `options` fail validation.
    pub fn set_options(&mut self, options: RemapOptions) -> Result<()> {
        options.validate()?;
        if options.use_pixel_splitting != self.options.use_pixel_splitting {
            self.x_coords = OnceLock::new();
            self.y_coords = OnceLock::new();
            self.x_edges = OnceLock::new();
            self.y_edges = OnceLock::new();
        }
        if options.number_of_bins_x != self.options.number_of_bins_x
            || options.x_range != self.options.x_range
        {
            self.x_edges = OnceLock::new();
        }
        if options.number_of_bins_y != self.options.number_of_bins_y
            || options.y_range != self.options.y_range
        {
            self.y_edges = OnceLock::new();
        }
        self.options = options;
        Ok(())
    }

    /// Replaces the coordinate arrays and drops everything derived from them.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if `x` and `y` differ in shape.
    pub fn set_coordinates(&mut self, x: Array2<f64>, y: Array2<f64>) -> Result<()> {
        Error::check_shape("remap y array", x.dim(), y.dim())?;
        self.x = x;
        self.y = y;
        self.x_coords = OnceLock::new();
        self.y_coords = OnceLock::new();
        self.x_edges = OnceLock::new();
        self.y_edges = OnceLock::new();
        Ok(())
    }

    fn coordinates_of(&self, values: &Array2<f64>) -> PixelCoordinates {
        if self.options.use_pixel_splitting {
            debug!("estimating remap envelopes for {:?} pixels", values.dim());
            finite_difference_envelope(values)
        } else {
            PixelCoordinates::Centre(values.clone())
        }
    }

    /// Coordinates binned along x.
    #[must_use]
    pub fn x_coordinates(&self) -> &PixelCoordinates {
        self.x_coords.get_or_init(|| self.coordinates_of(&self.x))
    }

    /// Coordinates binned along y.
    #[must_use]
    pub fn y_coordinates(&self) -> &PixelCoordinates {
        self.y_coords.get_or_init(|| self.coordinates_of(&self.y))
    }

    /// Bin edges along x.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn x_edges(&self) -> Result<&BinEdges> {
        self.x_edges
            .get_or_init(|| {
                BinEdges::compute(
                    &[self.x_coordinates()],
                    None,
                    self.options.x_range,
                    self.options.number_of_bins_x,
                )
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Bin edges along y.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn y_edges(&self) -> Result<&BinEdges> {
        self.y_edges
            .get_or_init(|| {
                BinEdges::compute(
                    &[self.y_coordinates()],
                    None,
                    self.options.y_range,
                    self.options.number_of_bins_y,
                )
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Published x axis.
    ///
    /// # Errors
    /// See [`RemapCache::x_edges`].
    pub fn x_axis(&self) -> Result<Axis> {
        let options = &self.options;
        Ok(Axis::from_edges(&options.x_name, &options.x_units, self.x_edges()?, |v| v))
    }

    /// Published y axis.
    ///
    /// # Errors
    /// See [`RemapCache::y_edges`].
    pub fn y_axis(&self) -> Result<Axis> {
        let options = &self.options;
        Ok(Axis::from_edges(&options.y_name, &options.y_units, self.y_edges()?, |v| v))
    }

    /// Remaps `frame` onto the x × y grid.
    ///
    /// Automatic ranges cover only the pixels a mask or region keeps.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] for a frame or mask of the wrong shape.
    pub fn remap(
        &self,
        frame: &Frame,
        mask: Option<&Mask>,
        region: Option<&dyn RegionOfInterest>,
        execution: ExecutionStrategy,
    ) -> Result<Profile2D> {
        let mask = prepare_mask(self.shape(), frame, mask, region)?;
        let strategy = BinningStrategy::select(false, self.options.use_pixel_splitting);
        let options = &self.options;
        let x_edges = edges_under_mask(
            || self.x_edges(),
            self.x_coordinates(),
            options.x_range,
            options.number_of_bins_x,
            mask.as_ref(),
        )?;
        let y_edges = edges_under_mask(
            || self.y_edges(),
            self.y_coordinates(),
            options.y_range,
            options.number_of_bins_y,
            mask.as_ref(),
        )?;
        let request = BinningRequest {
            frame,
            mask: mask.as_ref(),
            primary: BinnedAxis::new(self.x_coordinates(), &x_edges),
            secondary: Secondary::Binned(BinnedAxis::new(self.y_coordinates(), &y_edges)),
        };
        let hist = bin(strategy, &request, execution)?;
        Ok(hist.into_map(
            Axis::from_edges(&options.x_name, &options.x_units, &x_edges, |v| v),
            Axis::from_edges(&options.y_name, &options.y_units, &y_edges, |v| v),
        ))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_envelope_from_differences() {
        let values = array![[0.0, 2.0, 4.0], [1.0, 3.0, 5.0]];
        let PixelCoordinates::Envelope { min, max } = finite_difference_envelope(&values) else {
            panic!("expected envelope");
        };
        // |Δcol| = 1, |Δrow| = 0.5 everywhere.
        assert_relative_eq!(min[[0, 0]], -1.5);
        assert_relative_eq!(max[[0, 0]], 1.5);
        assert_relative_eq!(min[[1, 2]], 3.5);
        assert_relative_eq!(max[[1, 2]], 6.5);
    }

    #[test]
    fn test_single_pixel_has_no_spread() {
        let PixelCoordinates::Envelope { min, max } = finite_difference_envelope(&array![[7.0]])
        else {
            panic!("expected envelope");
        };
        assert_eq!(min[[0, 0]], 7.0);
        assert_eq!(max[[0, 0]], 7.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = RemapCache::new(
            Array2::zeros((2, 3)),
            Array2::zeros((3, 2)),
            RemapOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_remap_onto_index_grid() {
        let x = Array2::from_shape_fn((4, 4), |(_, c)| c as f64);
        let y = Array2::from_shape_fn((4, 4), |(r, _)| r as f64);
        let data = Array2::from_shape_fn((4, 4), |(r, c)| (r * 4 + c) as f64);
        let cache = RemapCache::new(
            x,
            y,
            RemapOptions::default()
                .with_bins(3, 3)
                .with_x_range(Some([0.0, 3.0]))
                .with_y_range(Some([0.0, 3.0])),
        )
        .unwrap();
        let map = cache
            .remap(&Frame::new(data.clone()), None, None, ExecutionStrategy::Serial)
            .unwrap();
        assert_eq!(map.intensity, data);
        assert_eq!(map.x_axis.values, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(map.weight.sum(), 16.0);
    }

    #[test]
    fn test_split_remap_conserves_weight() {
        let x = Array2::from_shape_fn((6, 5), |(r, c)| c as f64 + 0.1 * r as f64);
        let y = Array2::from_shape_fn((6, 5), |(r, c)| r as f64 - 0.05 * c as f64);
        let cache = RemapCache::new(
            x,
            y,
            RemapOptions::default().with_bins(7, 9).with_pixel_splitting(true),
        )
        .unwrap();
        let map = cache
            .remap(
                &Frame::new(Array2::from_elem((6, 5), 3.0)),
                None,
                None,
                ExecutionStrategy::Serial,
            )
            .unwrap();
        // Auto edges cover every envelope, so nothing is clipped.
        assert_relative_eq!(map.weight.sum(), 30.0, epsilon = 1e-9);
        for (&i, &w) in map.intensity.iter().zip(map.weight.iter()) {
            if w > 0.0 {
                assert_relative_eq!(i, 3.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_option_change_recomputes_coordinates() {
        let mut cache = RemapCache::new(
            Array2::zeros((2, 2)),
            Array2::zeros((2, 2)),
            RemapOptions::default(),
        )
        .unwrap();
        assert!(!cache.x_coordinates().is_envelope());
        cache
            .set_options(RemapOptions::default().with_pixel_splitting(true))
            .unwrap();
        assert!(cache.x_coordinates().is_envelope());
        assert!(cache.set_options(RemapOptions::default().with_bins(0, 1)).is_err());
        assert!(cache.x_coordinates().is_envelope());
    }
}
