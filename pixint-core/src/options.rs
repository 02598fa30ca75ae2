//! Integration configuration.
#![allow(clippy::doc_markdown)]

use crate::axis::{RadialAxisType, RadialScale};
use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of one integration: bin counts, axis choice, ranges and mode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct IntegrationOptions {
    /// Number of bins along the radial axis.
    pub number_of_bins_radial: usize,
    /// Number of bins along the azimuthal axis.
    pub number_of_bins_azimuthal: usize,
    /// Produce a 1D profile instead of a 2D map.
    #[cfg_attr(feature = "serde", serde(rename = "to1D"))]
    pub to_1d: bool,
    /// Bin along azimuth (1D) or put azimuth on the x axis (2D).
    pub azimuthal_is_primary_axis: bool,
    /// Distribute each pixel over every bin its footprint overlaps.
    pub use_pixel_splitting: bool,
    /// Bin the radial coordinate on a log10 grid.
    pub log_radial_axis: bool,
    /// Radial range of bin centres, in published units.
    pub radial_range: Option<[f64; 2]>,
    /// Azimuthal range of bin centres in degrees; see [`normalize_azimuthal_range`].
    pub azimuthal_range: Option<[f64; 2]>,
    /// Unit system of the radial axis.
    pub radial_axis_type: RadialAxisType,
    /// Sample whole-pixel coordinates at pixel centres (`col + 0.5`) rather
    /// than at the integer pixel position.
    pub centre: bool,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            number_of_bins_radial: 1000,
            number_of_bins_azimuthal: 360,
            to_1d: true,
            azimuthal_is_primary_axis: false,
            use_pixel_splitting: false,
            log_radial_axis: false,
            radial_range: None,
            azimuthal_range: None,
            radial_axis_type: RadialAxisType::Q,
            centre: true,
        }
    }
}

impl IntegrationOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of radial bins.
    #[must_use]
    pub fn with_radial_bins(mut self, n: usize) -> Self {
        self.number_of_bins_radial = n;
        self
    }

    /// Set the number of azimuthal bins.
    #[must_use]
    pub fn with_azimuthal_bins(mut self, n: usize) -> Self {
        self.number_of_bins_azimuthal = n;
        self
    }

    /// Select 1D profile (`true`) or 2D map (`false`) output.
    #[must_use]
    pub fn with_to_1d(mut self, to_1d: bool) -> Self {
        self.to_1d = to_1d;
        self
    }

    /// Make azimuth the primary axis.
    #[must_use]
    pub fn with_azimuthal_primary(mut self, primary: bool) -> Self {
        self.azimuthal_is_primary_axis = primary;
        self
    }

    /// Enable or disable pixel splitting.
    #[must_use]
    pub fn with_pixel_splitting(mut self, split: bool) -> Self {
        self.use_pixel_splitting = split;
        self
    }

    /// Enable or disable log10 radial binning.
    #[must_use]
    pub fn with_log_radial(mut self, log: bool) -> Self {
        self.log_radial_axis = log;
        self
    }

    /// Set the radial bin-centre range.
    #[must_use]
    pub fn with_radial_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.radial_range = range;
        self
    }

    /// Set the azimuthal bin-centre range in degrees.
    #[must_use]
    pub fn with_azimuthal_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.azimuthal_range = range;
        self
    }

    /// Set the radial axis type.
    #[must_use]
    pub fn with_axis_type(mut self, axis_type: RadialAxisType) -> Self {
        self.radial_axis_type = axis_type;
        self
    }

    /// Set pixel-centre sampling.
    #[must_use]
    pub fn with_centre(mut self, centre: bool) -> Self {
        self.centre = centre;
        self
    }

    /// Radial scale derived from the axis type and log flag.
    #[must_use]
    pub fn radial_scale(&self) -> RadialScale {
        RadialScale::new(self.radial_axis_type, self.log_radial_axis)
    }

    /// Checks every field.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a zero bin count, an invalid
    /// radial range or an azimuthal range that cannot be normalized.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_bins_radial == 0 {
            return Err(Error::config("numberOfBinsRadial must be positive"));
        }
        if self.number_of_bins_azimuthal == 0 {
            return Err(Error::config("numberOfBinsAzimuthal must be positive"));
        }
        self.radial_range_in_binning_space()?;
        self.normalized_azimuthal_range()?;
        Ok(())
    }

    /// Radial range mapped into binning space (Q for d-spacing, log10 if enabled).
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for non-finite or zero-width ranges,
    /// and for non-positive bounds where the scale needs a reciprocal or log.
    pub fn radial_range_in_binning_space(&self) -> Result<Option<[f64; 2]>> {
        let Some([a, b]) = self.radial_range else {
            return Ok(None);
        };
        if !a.is_finite() || !b.is_finite() {
            return Err(Error::config(format!(
                "radial range must be finite, got [{a}, {b}]"
            )));
        }
        if a == b {
            return Err(Error::config(format!(
                "radial range must span a non-zero interval, got [{a}, {b}]"
            )));
        }
        let needs_positive =
            self.log_radial_axis || self.radial_axis_type == RadialAxisType::Resolution;
        if needs_positive && (a <= 0.0 || b <= 0.0) {
            return Err(Error::config(format!(
                "radial range [{a}, {b}] must be positive for a {} axis{}",
                self.radial_axis_type.name(),
                if self.log_radial_axis { " on a log scale" } else { "" }
            )));
        }
        Ok(Some(self.radial_scale().range_to_binning([a, b])))
    }

    /// Azimuthal range after normalization.
    ///
    /// # Errors
    /// See [`normalize_azimuthal_range`].
    pub fn normalized_azimuthal_range(&self) -> Result<Option<[f64; 2]>> {
        self.azimuthal_range
            .map(normalize_azimuthal_range)
            .transpose()
    }
}

/// Normalizes an azimuthal range in degrees.
///
/// Both endpoints must lie in `[-180, 360]` and, after sorting, span at most
/// 360 degrees. A span of exactly 360 is the full circle `[-180, 180]`. A
/// range wholly above 180 moves down one turn, so `[200, 300]` becomes
/// `[-160, -60]`. Anything else keeps the arc its sorted endpoints describe:
/// `[350, 10]` is the 340 degree arc `[10, 350]` and `[170, 190]` stays a
/// 20 degree arc across the cut. The binning engines match azimuths one
/// turn away, so an upper endpoint above 180 needs no rewriting.
///
/// # Errors
/// Returns [`Error::Configuration`] for non-finite values, endpoints out of
/// bounds or a span above 360.
pub fn normalize_azimuthal_range(range: [f64; 2]) -> Result<[f64; 2]> {
    let [a, b] = range;
    if !a.is_finite() || !b.is_finite() {
        return Err(Error::config(format!(
            "azimuthal range must be finite, got [{a}, {b}]"
        )));
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo < -180.0 || hi > 360.0 {
        return Err(Error::config(format!(
            "azimuthal range [{a}, {b}] must lie within [-180, 360] degrees"
        )));
    }
    let span = hi - lo;
    if span > 360.0 {
        return Err(Error::config(format!(
            "azimuthal range [{a}, {b}] spans {span} degrees, more than 360"
        )));
    }
    if span == 360.0 {
        return Ok([-180.0, 180.0]);
    }

    if lo > 180.0 {
        return Ok([lo - 360.0, hi - 360.0]);
    }
    Ok([lo, hi])
}
