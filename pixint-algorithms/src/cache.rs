//! Memoized coordinates and bin edges for one (geometry, options) pair.
//!
//! Everything an integration needs besides the frame itself is derived
//! lazily on first access and then kept: the radial and azimuthal coordinate
//! arrays in binning space, and the bin edges along each axis. Replacing the
//! geometry or the options drops only what the change affects.

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use log::debug;
use ndarray::ArrayView2;
use pixint_core::{
    observed_range, Axis, BinEdges, CoordinateKind, IntegrationOptions, Mask, PixelCoordinates,
    RadialScale, Result,
};
use pixint_geometry::{generate, GeometryProvider};

use crate::binning::{AxisRestriction, BinnedAxis, BinningStrategy, Secondary};
use crate::registry::{CoordinateKey, CoordinateRegistry};

/// Azimuthal auto ranges never extend past a full turn.
pub(crate) const AZIMUTH_LIMITS: [f64; 2] = [-180.0, 180.0];

const FULL_TURN: f64 = 360.0;

/// Lazily derived state for integrating frames from one detector.
pub struct IntegrationCache {
    geometry: Arc<dyn GeometryProvider>,
    options: IntegrationOptions,
    registry: Arc<CoordinateRegistry>,
    radial: OnceLock<Arc<PixelCoordinates>>,
    azimuthal: OnceLock<Arc<PixelCoordinates>>,
    radial_edges: OnceLock<Result<BinEdges>>,
    azimuthal_edges: OnceLock<Result<BinEdges>>,
}

impl std::fmt::Debug for IntegrationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationCache")
            .field("shape", &self.geometry.shape())
            .field("options", &self.options)
            .field("radial_ready", &self.radial.get().is_some())
            .field("azimuthal_ready", &self.azimuthal.get().is_some())
            .finish_non_exhaustive()
    }
}

impl IntegrationCache {
    /// Cache backed by the process-wide registry.
    ///
    /// # Errors
    /// Returns a configuration error if `options` fail validation.
    pub fn new(geometry: Arc<dyn GeometryProvider>, options: IntegrationOptions) -> Result<Self> {
        Self::with_registry(geometry, options, CoordinateRegistry::global())
    }

    /// Cache backed by a private registry.
    ///
    /// # Errors
    /// Returns a configuration error if `options` fail validation.
    pub fn with_registry(
        geometry: Arc<dyn GeometryProvider>,
        options: IntegrationOptions,
        registry: Arc<CoordinateRegistry>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            geometry,
            options,
            registry,
            radial: OnceLock::new(),
            azimuthal: OnceLock::new(),
            radial_edges: OnceLock::new(),
            azimuthal_edges: OnceLock::new(),
        })
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &IntegrationOptions {
        &self.options
    }

    /// Current geometry.
    #[must_use]
    pub fn geometry(&self) -> &Arc<dyn GeometryProvider> {
        &self.geometry
    }

    /// Registry the coordinates are shared through.
    #[must_use]
    pub fn registry(&self) -> &Arc<CoordinateRegistry> {
        &self.registry
    }

    /// Detector shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.geometry.shape()
    }

    /// Replaces the options, dropping memoized state that depends on what changed.
    ///
    /// # Errors
    /// Returns a configuration error and leaves the cache untouched if
    /// `options` fail validation.
    pub fn set_options(&mut self, options: IntegrationOptions) -> Result<()> {
        options.validate()?;
        if options == self.options {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.options, options);
        let new = &self.options;

        let sampling_changed =
            old.use_pixel_splitting != new.use_pixel_splitting || old.centre != new.centre;
        if sampling_changed
            || old.radial_axis_type != new.radial_axis_type
            || old.log_radial_axis != new.log_radial_axis
        {
            self.radial = OnceLock::new();
        }
        if sampling_changed {
            self.azimuthal = OnceLock::new();
        }
        self.radial_edges = OnceLock::new();
        self.azimuthal_edges = OnceLock::new();
        debug!("integration options changed, memoized edges dropped");
        Ok(())
    }

    /// Replaces the geometry; a geometry with an equal key keeps everything.
    pub fn set_geometry(&mut self, geometry: Arc<dyn GeometryProvider>) {
        let same = geometry.key() == self.geometry.key();
        self.geometry = geometry;
        if !same {
            self.clear();
            debug!("geometry changed, memoized coordinates dropped");
        }
    }

    /// Drops every memoized value.
    pub fn clear(&mut self) {
        self.radial = OnceLock::new();
        self.azimuthal = OnceLock::new();
        self.radial_edges = OnceLock::new();
        self.azimuthal_edges = OnceLock::new();
    }

    fn radial_kind(&self) -> CoordinateKind {
        CoordinateKind::Radial(self.options.radial_axis_type)
    }

    fn shared_coordinates(&self, kind: CoordinateKind) -> Arc<PixelCoordinates> {
        let split = self.options.use_pixel_splitting;
        let centre = self.options.centre;
        let key = CoordinateKey::detector(self.geometry.key(), kind, split, centre);
        self.registry.get_or_insert_with(&key, || {
            generate(self.geometry.as_ref(), kind, split, centre)
        })
    }

    /// Radial scale in use.
    #[must_use]
    pub fn radial_scale(&self) -> RadialScale {
        self.options.radial_scale()
    }

    /// Radial coordinates in binning space (Q for d-spacing, log10 if enabled).
    #[must_use]
    pub fn radial_coordinates(&self) -> Arc<PixelCoordinates> {
        Arc::clone(self.radial.get_or_init(|| {
            let raw = self.shared_coordinates(self.radial_kind());
            let scale = self.radial_scale();
            if scale.log {
                Arc::new(raw.map(|v| scale.to_binning(v)))
            } else {
                raw
            }
        }))
    }

    /// Azimuthal coordinates in degrees.
    #[must_use]
    pub fn azimuthal_coordinates(&self) -> Arc<PixelCoordinates> {
        Arc::clone(
            self.azimuthal
                .get_or_init(|| self.shared_coordinates(CoordinateKind::Azimuthal)),
        )
    }

    /// Radial bin edges in binning space.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn radial_edges(&self) -> Result<&BinEdges> {
        self.radial_edges
            .get_or_init(|| self.build_radial_edges(None))
            .as_ref()
            .map_err(Clone::clone)
    }

    fn build_radial_edges(&self, mask: Option<ArrayView2<'_, bool>>) -> Result<BinEdges> {
        let coords = self.radial_coordinates();
        BinEdges::compute(
            &[coords.as_ref()],
            mask,
            self.options.radial_range_in_binning_space()?,
            self.options.number_of_bins_radial,
        )
    }

    /// Azimuthal bin edges in degrees.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn azimuthal_edges(&self) -> Result<&BinEdges> {
        self.azimuthal_edges
            .get_or_init(|| self.build_azimuthal_edges(None))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Explicit ranges put bin centres on both endpoints; a grid widened
    /// past one turn becomes `n` bins over the turn around the midpoint.
    fn build_azimuthal_edges(&self, mask: Option<ArrayView2<'_, bool>>) -> Result<BinEdges> {
        let n = self.options.number_of_bins_azimuthal;
        if let Some(range) = self.options.normalized_azimuthal_range()? {
            let edges = BinEdges::from_centre_range(range, n)?;
            if edges.span() <= FULL_TURN {
                return Ok(edges);
            }
            let mid = 0.5 * (range[0] + range[1]);
            return BinEdges::from_limits(mid - 0.5 * FULL_TURN, mid + 0.5 * FULL_TURN, n);
        }
        let coords = self.azimuthal_coordinates();
        let [lo, hi] = observed_range(&[coords.as_ref()], mask)?.unwrap_or([0.0, 0.0]);
        BinEdges::from_limits(
            lo.clamp(AZIMUTH_LIMITS[0], AZIMUTH_LIMITS[1]),
            hi.clamp(AZIMUTH_LIMITS[0], AZIMUTH_LIMITS[1]),
            n,
        )
    }

    /// Edges of one axis for a frame integrated under `mask`.
    ///
    /// An automatic range is taken over the kept pixels only, so excluded
    /// pixels do not stretch the bins. Explicit ranges and unmasked frames
    /// use the memoized edges.
    fn edges_for(&self, azimuthal: bool, mask: Option<&Mask>) -> Result<Cow<'_, BinEdges>> {
        let explicit = if azimuthal {
            self.options.azimuthal_range.is_some()
        } else {
            self.options.radial_range.is_some()
        };
        match mask {
            Some(mask) if !explicit => {
                let edges = if azimuthal {
                    self.build_azimuthal_edges(Some(mask.view()))?
                } else {
                    self.build_radial_edges(Some(mask.view()))?
                };
                Ok(Cow::Owned(edges))
            }
            _ if azimuthal => self.azimuthal_edges().map(Cow::Borrowed),
            _ => self.radial_edges().map(Cow::Borrowed),
        }
    }

    /// Primary edges over the pixels `mask` keeps; see [`IntegrationCache::primary_edges`].
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn primary_edges_for(&self, mask: Option<&Mask>) -> Result<Cow<'_, BinEdges>> {
        self.edges_for(self.azimuthal_is_primary(), mask)
    }

    /// Secondary edges over the pixels `mask` keeps.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn secondary_edges_for(&self, mask: Option<&Mask>) -> Result<Cow<'_, BinEdges>> {
        self.edges_for(!self.azimuthal_is_primary(), mask)
    }

    /// True when the azimuth is the primary (x) axis.
    #[must_use]
    pub fn azimuthal_is_primary(&self) -> bool {
        self.options.azimuthal_is_primary_axis
    }

    /// Coordinates of the primary axis.
    #[must_use]
    pub fn primary_coordinates(&self) -> Arc<PixelCoordinates> {
        if self.azimuthal_is_primary() {
            self.azimuthal_coordinates()
        } else {
            self.radial_coordinates()
        }
    }

    /// Coordinates of the secondary axis.
    #[must_use]
    pub fn secondary_coordinates(&self) -> Arc<PixelCoordinates> {
        if self.azimuthal_is_primary() {
            self.radial_coordinates()
        } else {
            self.azimuthal_coordinates()
        }
    }

    /// Edges of the primary axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn primary_edges(&self) -> Result<&BinEdges> {
        if self.azimuthal_is_primary() {
            self.azimuthal_edges()
        } else {
            self.radial_edges()
        }
    }

    /// Edges of the secondary axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn secondary_edges(&self) -> Result<&BinEdges> {
        if self.azimuthal_is_primary() {
            self.radial_edges()
        } else {
            self.azimuthal_edges()
        }
    }

    /// Lowest and highest primary edge.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn primary_limits(&self) -> Result<[f64; 2]> {
        self.primary_edges().map(|e| [e.lo(), e.hi()])
    }

    /// Lowest and highest secondary edge.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn secondary_limits(&self) -> Result<[f64; 2]> {
        self.secondary_edges().map(|e| [e.lo(), e.hi()])
    }

    /// Number of primary bins.
    #[must_use]
    pub fn primary_bins(&self) -> usize {
        if self.azimuthal_is_primary() {
            self.options.number_of_bins_azimuthal
        } else {
            self.options.number_of_bins_radial
        }
    }

    /// Number of secondary bins.
    #[must_use]
    pub fn secondary_bins(&self) -> usize {
        if self.azimuthal_is_primary() {
            self.options.number_of_bins_radial
        } else {
            self.options.number_of_bins_azimuthal
        }
    }

    /// Published radial axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn radial_axis(&self) -> Result<Axis> {
        Ok(self.publish_axis(false, self.radial_edges()?))
    }

    /// Published azimuthal axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::azimuthal_edges`].
    pub fn azimuthal_axis(&self) -> Result<Axis> {
        Ok(self.publish_axis(true, self.azimuthal_edges()?))
    }

    /// Publishes `edges` as the azimuthal or the radial axis.
    pub(crate) fn publish_axis(&self, azimuthal: bool, edges: &BinEdges) -> Axis {
        if azimuthal {
            Axis::azimuthal(edges)
        } else {
            Axis::radial(self.radial_scale(), edges)
        }
    }

    /// Published primary axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn primary_axis(&self) -> Result<Axis> {
        if self.azimuthal_is_primary() {
            self.azimuthal_axis()
        } else {
            self.radial_axis()
        }
    }

    /// Published secondary axis.
    ///
    /// # Errors
    /// See [`IntegrationCache::radial_edges`].
    pub fn secondary_axis(&self) -> Result<Axis> {
        if self.azimuthal_is_primary() {
            self.radial_axis()
        } else {
            self.azimuthal_axis()
        }
    }

    /// Binning engine these options select.
    #[must_use]
    pub fn strategy(&self) -> BinningStrategy {
        BinningStrategy::select(self.options.to_1d, self.options.use_pixel_splitting)
    }

    /// Range restricting a 1D profile along the secondary coordinate, in binning space.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid range.
    pub fn secondary_restriction(&self) -> Result<Option<[f64; 2]>> {
        if self.azimuthal_is_primary() {
            self.options.radial_range_in_binning_space()
        } else {
            self.options.normalized_azimuthal_range()
        }
    }
}

/// Binning roles of a primary/secondary coordinate pair.
pub(crate) struct AxisPair<'a> {
    pub primary: BinnedAxis<'a>,
    pub secondary: Secondary<'a>,
}

impl<'a> AxisPair<'a> {
    /// Primary axis plus either a restriction (1D) or a binned axis (2D).
    pub(crate) fn new(
        to_1d: bool,
        primary: BinnedAxis<'a>,
        secondary_coords: &'a PixelCoordinates,
        secondary_edges: Option<&'a BinEdges>,
        secondary_periodic: bool,
        restriction: Option<[f64; 2]>,
    ) -> Self {
        let secondary = match (to_1d, secondary_edges, restriction) {
            (false, Some(edges), _) => Secondary::Binned(BinnedAxis {
                coords: secondary_coords,
                edges,
                periodic: secondary_periodic,
            }),
            (true, _, Some(range)) => Secondary::Restricted(AxisRestriction {
                coords: secondary_coords,
                range,
                periodic: secondary_periodic,
            }),
            _ => Secondary::Unrestricted,
        };
        Self { primary, secondary }
    }
}
