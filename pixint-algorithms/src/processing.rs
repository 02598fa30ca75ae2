//! High-level integration entry points.
//!
//! These check shapes, fold the mask and region into one inclusion mask,
//! pick the binning engine from the options and publish the histogram with
//! its axes.

use std::borrow::Cow;

use log::debug;
use pixint_core::{
    BinEdges, Error, Frame, Histogram, Mask, PixelCoordinates, Profile1D, Profile2D,
    RegionOfInterest, Result,
};

use crate::binning::{bin, BinnedAxis, BinningRequest, ExecutionStrategy};
use crate::cache::{AxisPair, IntegrationCache};

/// Result of one integration.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationOutput {
    /// 1D profile along the primary axis.
    Profile(Profile1D),
    /// 2D map, primary axis along x.
    Map(Profile2D),
}

impl IntegrationOutput {
    /// The profile, if this is one.
    #[must_use]
    pub fn as_profile(&self) -> Option<&Profile1D> {
        match self {
            Self::Profile(profile) => Some(profile),
            Self::Map(_) => None,
        }
    }

    /// The map, if this is one.
    #[must_use]
    pub fn as_map(&self) -> Option<&Profile2D> {
        match self {
            Self::Map(map) => Some(map),
            Self::Profile(_) => None,
        }
    }

    /// Accumulated weight summed over all bins.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        match self {
            Self::Profile(profile) => profile.weight.iter().sum(),
            Self::Map(map) => map.weight.sum(),
        }
    }
}

/// Checks the frame against the detector and combines mask and region.
pub(crate) fn prepare_mask(
    detector_shape: (usize, usize),
    frame: &Frame,
    mask: Option<&Mask>,
    region: Option<&dyn RegionOfInterest>,
) -> Result<Option<Mask>> {
    Error::check_shape("frame", detector_shape, frame.shape())?;
    Mask::effective(frame.shape(), mask, region)
}

/// Memoized edges, or edges over the kept pixels when `mask` applies to an
/// automatic range.
pub(crate) fn edges_under_mask<'a>(
    memoized: impl FnOnce() -> Result<&'a BinEdges>,
    coords: &PixelCoordinates,
    explicit_range: Option<[f64; 2]>,
    n_bins: usize,
    mask: Option<&Mask>,
) -> Result<Cow<'a, BinEdges>> {
    match mask {
        Some(mask) if explicit_range.is_none() => {
            BinEdges::observed(&[coords], Some(mask.view()), n_bins).map(Cow::Owned)
        }
        _ => memoized().map(Cow::Borrowed),
    }
}

/// Integrates `frame` with the coordinates and edges memoized in `cache`.
///
/// With a mask or region, automatic ranges cover only the pixels kept.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if the frame does not match the detector
/// or the mask does not match the frame, before anything is accumulated.
pub fn integrate(
    cache: &IntegrationCache,
    frame: &Frame,
    mask: Option<&Mask>,
    region: Option<&dyn RegionOfInterest>,
    execution: ExecutionStrategy,
) -> Result<IntegrationOutput> {
    let mask = prepare_mask(cache.shape(), frame, mask, region)?;

    let options = cache.options();
    let strategy = cache.strategy();
    let azimuthal_primary = cache.azimuthal_is_primary();
    debug!(
        "integrating {:?} frame with {strategy:?} ({} primary)",
        frame.shape(),
        if azimuthal_primary { "azimuthal" } else { "radial" }
    );

    let primary_coords = cache.primary_coordinates();
    let secondary_coords = cache.secondary_coordinates();
    let primary_edges = cache.primary_edges_for(mask.as_ref())?;
    let secondary_edges = if options.to_1d {
        None
    } else {
        Some(cache.secondary_edges_for(mask.as_ref())?)
    };
    let primary = BinnedAxis {
        coords: primary_coords.as_ref(),
        edges: &primary_edges,
        periodic: azimuthal_primary,
    };
    let axes = AxisPair::new(
        options.to_1d,
        primary,
        secondary_coords.as_ref(),
        secondary_edges.as_deref(),
        !azimuthal_primary,
        cache.secondary_restriction()?,
    );

    let request = BinningRequest {
        frame,
        mask: mask.as_ref(),
        primary: axes.primary,
        secondary: axes.secondary,
    };
    let hist = bin(strategy, &request, execution)?;
    publish(
        hist,
        options.to_1d,
        || Ok(cache.publish_axis(azimuthal_primary, &primary_edges)),
        || match secondary_edges.as_deref() {
            Some(edges) => Ok(cache.publish_axis(!azimuthal_primary, edges)),
            None => cache.secondary_axis(),
        },
    )
}

/// Wraps a histogram with its published axes.
pub(crate) fn publish(
    hist: Histogram,
    to_1d: bool,
    primary_axis: impl FnOnce() -> Result<pixint_core::Axis>,
    secondary_axis: impl FnOnce() -> Result<pixint_core::Axis>,
) -> Result<IntegrationOutput> {
    if to_1d {
        Ok(IntegrationOutput::Profile(hist.into_profile(primary_axis()?)))
    } else {
        Ok(IntegrationOutput::Map(
            hist.into_map(primary_axis()?, secondary_axis()?),
        ))
    }
}

impl IntegrationCache {
    /// Integrates on the calling thread; see [`integrate`].
    ///
    /// # Errors
    /// See [`integrate`].
    pub fn integrate(
        &self,
        frame: &Frame,
        mask: Option<&Mask>,
        region: Option<&dyn RegionOfInterest>,
    ) -> Result<IntegrationOutput> {
        integrate(self, frame, mask, region, ExecutionStrategy::Serial)
    }
}
