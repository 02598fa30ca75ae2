//! Axis types and published axis values.
#![allow(clippy::doc_markdown)]

use std::f64::consts::TAU;

use crate::edges::BinEdges;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unit system of the radial (primary diffraction) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RadialAxisType {
    /// Momentum transfer |q| = 4π sin θ / λ, in inverse Ångström.
    #[default]
    Q,
    /// Scattering angle 2θ in degrees.
    Angle,
    /// d-spacing 2π/Q in Ångström. Binned in Q, published in d.
    Resolution,
    /// Distance from the beam centre in pixels.
    Pixel,
}

impl RadialAxisType {
    /// Axis label.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Q => "q",
            Self::Angle => "2theta",
            Self::Resolution => "d-spacing",
            Self::Pixel => "pixel",
        }
    }

    /// Axis units.
    #[must_use]
    pub fn units(self) -> &'static str {
        match self {
            Self::Q => "1/Angstrom",
            Self::Angle => "degrees",
            Self::Resolution => "Angstrom",
            Self::Pixel => "pixels",
        }
    }

    /// Axis type whose per-pixel values are actually binned.
    ///
    /// d-spacing is not linear across the detector, so it is binned in Q.
    #[must_use]
    pub fn binned_as(self) -> Self {
        match self {
            Self::Resolution => Self::Q,
            other => other,
        }
    }
}

/// Which per-pixel coordinate an array holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateKind {
    /// Radial coordinate in the given units.
    Radial(RadialAxisType),
    /// Azimuthal angle around the beam centre, in degrees.
    Azimuthal,
}

impl CoordinateKind {
    /// True for coordinates that wrap around every 360 degrees.
    #[must_use]
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Azimuthal)
    }
}

/// Radial axis as seen by the binning engine: unit system plus optional log scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RadialScale {
    /// Unit system of the published axis.
    pub axis_type: RadialAxisType,
    /// Bin in log10 of the coordinate.
    pub log: bool,
}

impl RadialScale {
    /// Creates a radial scale.
    #[must_use]
    pub fn new(axis_type: RadialAxisType, log: bool) -> Self {
        Self { axis_type, log }
    }

    /// Maps a per-pixel coordinate (already in binned units) into binning space.
    #[inline]
    #[must_use]
    pub fn to_binning(self, value: f64) -> f64 {
        if self.log {
            // log10 of zero or a negative value is non-finite and gets skipped.
            if value > 0.0 {
                value.log10()
            } else {
                f64::NAN
            }
        } else {
            value
        }
    }

    /// Maps a user range in published units into binning space, sorted.
    #[must_use]
    pub fn range_to_binning(self, range: [f64; 2]) -> [f64; 2] {
        let [a, b] = match self.axis_type {
            RadialAxisType::Resolution => [TAU / range[0], TAU / range[1]],
            _ => range,
        };
        let (a, b) = (self.to_binning(a), self.to_binning(b));
        if a <= b {
            [a, b]
        } else {
            [b, a]
        }
    }

    /// Maps a value in binning space back to published units.
    #[inline]
    #[must_use]
    pub fn publish(self, value: f64) -> f64 {
        let linear = if self.log { 10f64.powf(value) } else { value };
        match self.axis_type {
            RadialAxisType::Resolution => TAU / linear,
            _ => linear,
        }
    }
}

/// A published axis: label, units and one value per bin.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    /// Axis label.
    pub name: String,
    /// Axis units.
    pub units: String,
    /// Bin centres in published units.
    pub values: Vec<f64>,
}

impl Axis {
    /// Builds an axis from bin edges, converting each bin centre with `publish`.
    pub fn from_edges(
        name: impl Into<String>,
        units: impl Into<String>,
        edges: &BinEdges,
        publish: impl Fn(f64) -> f64,
    ) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            values: edges.centres().into_iter().map(publish).collect(),
        }
    }

    /// Radial axis for the given scale.
    ///
    /// Values are published in linear units even when binned on a log grid.
    #[must_use]
    pub fn radial(scale: RadialScale, edges: &BinEdges) -> Self {
        Self::from_edges(
            scale.axis_type.name(),
            scale.axis_type.units(),
            edges,
            |v| scale.publish(v),
        )
    }

    /// Azimuthal axis in degrees.
    #[must_use]
    pub fn azimuthal(edges: &BinEdges) -> Self {
        Self::from_edges("azimuthal angle", "degrees", edges, |v| v)
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the axis has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_resolution_is_binned_in_q() {
        assert_eq!(RadialAxisType::Resolution.binned_as(), RadialAxisType::Q);
        assert_eq!(RadialAxisType::Angle.binned_as(), RadialAxisType::Angle);
    }

    #[test]
    fn test_resolution_range_converts_to_q() {
        let scale = RadialScale::new(RadialAxisType::Resolution, false);
        let [lo, hi] = scale.range_to_binning([2.0, 4.0]);
        assert_relative_eq!(lo, TAU / 4.0);
        assert_relative_eq!(hi, TAU / 2.0);
        assert_relative_eq!(scale.publish(TAU / 4.0), 4.0);
    }

    #[test]
    fn test_log_scale_round_trip() {
        let scale = RadialScale::new(RadialAxisType::Q, true);
        assert_relative_eq!(scale.to_binning(100.0), 2.0);
        assert_relative_eq!(scale.publish(2.0), 100.0);
        assert!(scale.to_binning(0.0).is_nan());
        assert!(scale.to_binning(-1.0).is_nan());
    }

    #[test]
    fn test_radial_axis_publishes_centres() {
        let edges = BinEdges::from_centre_range([1.0, 3.0], 2).unwrap();
        let axis = Axis::radial(RadialScale::new(RadialAxisType::Pixel, false), &edges);
        assert_eq!(axis.name, "pixel");
        assert_eq!(axis.values, vec![1.0, 2.0, 3.0]);
    }
}
