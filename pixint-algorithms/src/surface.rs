//! Grazing-incidence integration onto q∥ / q⊥.
#![allow(clippy::doc_markdown)]

use std::borrow::Cow;
use std::sync::{Arc, OnceLock};

use log::debug;
use pixint_core::{
    Axis, BinEdges, Error, Frame, Mask, PixelCoordinates, RegionOfInterest, Result,
};
use pixint_geometry::{generate_surface, GeometryProvider, SurfaceComponent, SurfaceOrientation};

use crate::binning::{bin, BinnedAxis, BinningRequest, BinningStrategy, ExecutionStrategy};
use crate::cache::AxisPair;
use crate::processing::{edges_under_mask, prepare_mask, publish, IntegrationOutput};
use crate::registry::{CoordinateKey, CoordinateRegistry};

/// Configuration of a surface integration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct SurfaceOptions {
    /// Number of q∥ bins.
    pub number_of_bins_parallel: usize,
    /// Number of q⊥ bins.
    pub number_of_bins_perpendicular: usize,
    /// Produce a 1D profile instead of a q∥ × q⊥ map.
    #[cfg_attr(feature = "serde", serde(rename = "to1D"))]
    pub to_1d: bool,
    /// Bin the 1D profile along q⊥ instead of q∥.
    pub perpendicular_is_primary_axis: bool,
    /// Distribute each pixel over every bin its footprint overlaps.
    pub use_pixel_splitting: bool,
    /// q∥ range of bin centres in 1/Å.
    pub parallel_range: Option<[f64; 2]>,
    /// q⊥ range of bin centres in 1/Å.
    pub perpendicular_range: Option<[f64; 2]>,
    /// Sample whole-pixel coordinates at pixel centres.
    pub centre: bool,
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self {
            number_of_bins_parallel: 500,
            number_of_bins_perpendicular: 500,
            to_1d: false,
            perpendicular_is_primary_axis: false,
            use_pixel_splitting: false,
            parallel_range: None,
            perpendicular_range: None,
            centre: true,
        }
    }
}

impl SurfaceOptions {
    /// Set both bin counts.
    #[must_use]
    pub fn with_bins(mut self, parallel: usize, perpendicular: usize) -> Self {
        self.number_of_bins_parallel = parallel;
        self.number_of_bins_perpendicular = perpendicular;
        self
    }

    /// Select 1D profile (`true`) or 2D map (`false`) output.
    #[must_use]
    pub fn with_to_1d(mut self, to_1d: bool) -> Self {
        self.to_1d = to_1d;
        self
    }

    /// Make q⊥ the primary axis of 1D profiles.
    #[must_use]
    pub fn with_perpendicular_primary(mut self, primary: bool) -> Self {
        self.perpendicular_is_primary_axis = primary;
        self
    }

    /// Enable or disable pixel splitting.
    #[must_use]
    pub fn with_pixel_splitting(mut self, split: bool) -> Self {
        self.use_pixel_splitting = split;
        self
    }

    /// Set the q∥ range.
    #[must_use]
    pub fn with_parallel_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.parallel_range = range;
        self
    }

    /// Set the q⊥ range.
    #[must_use]
    pub fn with_perpendicular_range(mut self, range: Option<[f64; 2]>) -> Self {
        self.perpendicular_range = range;
        self
    }

    /// Checks bin counts and ranges.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for a zero bin count or a
    /// non-finite or zero-width range.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_bins_parallel == 0 || self.number_of_bins_perpendicular == 0 {
            return Err(Error::config("surface bin counts must be positive"));
        }
        for (name, range) in [
            ("parallel", self.parallel_range),
            ("perpendicular", self.perpendicular_range),
        ] {
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

    fn bins(&self, component: SurfaceComponent) -> usize {
        match component {
            SurfaceComponent::Parallel => self.number_of_bins_parallel,
            SurfaceComponent::Perpendicular => self.number_of_bins_perpendicular,
        }
    }

    fn range(&self, component: SurfaceComponent) -> Option<[f64; 2]> {
        let range = match component {
            SurfaceComponent::Parallel => self.parallel_range,
            SurfaceComponent::Perpendicular => self.perpendicular_range,
        };
        range.map(|[a, b]| if a <= b { [a, b] } else { [b, a] })
    }

    /// Component along the histogram columns.
    #[must_use]
    pub fn primary(&self) -> SurfaceComponent {
        if self.to_1d && self.perpendicular_is_primary_axis {
            SurfaceComponent::Perpendicular
        } else {
            SurfaceComponent::Parallel
        }
    }

    /// The other component.
    #[must_use]
    pub fn secondary(&self) -> SurfaceComponent {
        match self.primary() {
            SurfaceComponent::Parallel => SurfaceComponent::Perpendicular,
            SurfaceComponent::Perpendicular => SurfaceComponent::Parallel,
        }
    }
}

/// Lazily derived state for surface integration of one detector.
pub struct SurfaceIntegrationCache {
    geometry: Arc<dyn GeometryProvider>,
    orientation: SurfaceOrientation,
    options: SurfaceOptions,
    registry: Arc<CoordinateRegistry>,
    parallel: OnceLock<Arc<PixelCoordinates>>,
    perpendicular: OnceLock<Arc<PixelCoordinates>>,
    parallel_edges: OnceLock<Result<BinEdges>>,
    perpendicular_edges: OnceLock<Result<BinEdges>>,
}

impl std::fmt::Debug for SurfaceIntegrationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceIntegrationCache")
            .field("shape", &self.geometry.shape())
            .field("orientation", &self.orientation)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SurfaceIntegrationCache {
    /// Cache backed by the process-wide registry.
    ///
    /// # Errors
    /// Returns a configuration error if `options` fail validation.
    pub fn new(
        geometry: Arc<dyn GeometryProvider>,
        orientation: SurfaceOrientation,
        options: SurfaceOptions,
    ) -> Result<Self> {
        Self::with_registry(geometry, orientation, options, CoordinateRegistry::global())
    }

    /// Cache backed by a private registry.
    ///
    /// # Errors
    /// Returns a configuration error if `options` fail validation.
    pub fn with_registry(
        geometry: Arc<dyn GeometryProvider>,
        orientation: SurfaceOrientation,
        options: SurfaceOptions,
        registry: Arc<CoordinateRegistry>,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            geometry,
            orientation,
            options,
            registry,
            parallel: OnceLock::new(),
            perpendicular: OnceLock::new(),
            parallel_edges: OnceLock::new(),
            perpendicular_edges: OnceLock::new(),
        })
    }

    /// Current options.
    #[must_use]
    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Surface orientation.
    #[must_use]
    pub fn orientation(&self) -> &SurfaceOrientation {
        &self.orientation
    }

    /// Replaces the options, dropping memoized state that depends on what changed.
    ///
    /// # Errors
    /// Returns a configuration error and leaves the cache untouched if
    /// `options` fail validation.
    pub fn set_options(&mut self, options: SurfaceOptions) -> Result<()> {
        options.validate()?;
        if options == self.options {
            return Ok(());
        }
        if options.use_pixel_splitting != self.options.use_pixel_splitting
            || options.centre != self.options.centre
        {
            self.parallel = OnceLock::new();
            self.perpendicular = OnceLock::new();
        }
        self.parallel_edges = OnceLock::new();
        self.perpendicular_edges = OnceLock::new();
        self.options = options;
        Ok(())
    }

    /// Replaces the orientation; an equal orientation keeps everything.
    pub fn set_orientation(&mut self, orientation: SurfaceOrientation) {
        if orientation.snapshot() != self.orientation.snapshot() {
            self.orientation = orientation;
            self.clear();
        }
    }

    /// Replaces the geometry; a geometry with an equal key keeps everything.
    pub fn set_geometry(&mut self, geometry: Arc<dyn GeometryProvider>) {
        let same = geometry.key() == self.geometry.key();
        self.geometry = geometry;
        if !same {
            self.clear();
        }
    }

    /// Drops every memoized value.
    pub fn clear(&mut self) {
        self.parallel = OnceLock::new();
        self.perpendicular = OnceLock::new();
        self.parallel_edges = OnceLock::new();
        self.perpendicular_edges = OnceLock::new();
    }

    fn slots(
        &self,
        component: SurfaceComponent,
    ) -> (&OnceLock<Arc<PixelCoordinates>>, &OnceLock<Result<BinEdges>>) {
        match component {
            SurfaceComponent::Parallel => (&self.parallel, &self.parallel_edges),
            SurfaceComponent::Perpendicular => (&self.perpendicular, &self.perpendicular_edges),
        }
    }

    /// Coordinates of one component in 1/Å.
    #[must_use]
    pub fn coordinates(&self, component: SurfaceComponent) -> Arc<PixelCoordinates> {
        let (slot, _) = self.slots(component);
        Arc::clone(slot.get_or_init(|| {
            let split = self.options.use_pixel_splitting;
            let centre = self.options.centre;
            let key = CoordinateKey::surface(
                self.geometry.key(),
                component,
                self.orientation.snapshot(),
                split,
                centre,
            );
            self.registry.get_or_insert_with(&key, || {
                generate_surface(
                    self.geometry.as_ref(),
                    &self.orientation,
                    component,
                    split,
                    centre,
                )
            })
        }))
    }

    /// Bin edges of one component.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn edges(&self, component: SurfaceComponent) -> Result<&BinEdges> {
        let (_, slot) = self.slots(component);
        slot.get_or_init(|| {
            let coords = self.coordinates(component);
            BinEdges::compute(
                &[coords.as_ref()],
                None,
                self.options.range(component),
                self.options.bins(component),
            )
        })
        .as_ref()
        .map_err(Clone::clone)
    }

    /// Published axis of one component.
    ///
    /// # Errors
    /// See [`SurfaceIntegrationCache::edges`].
    pub fn axis(&self, component: SurfaceComponent) -> Result<Axis> {
        Ok(publish_axis(component, self.edges(component)?))
    }

    /// Edges of one component over the pixels `mask` keeps.
    ///
    /// Only an automatic range depends on the mask; otherwise the memoized
    /// edges are returned.
    ///
    /// # Errors
    /// Returns a configuration error if the edges cannot be built.
    pub fn edges_for(
        &self,
        component: SurfaceComponent,
        mask: Option<&Mask>,
    ) -> Result<Cow<'_, BinEdges>> {
        edges_under_mask(
            || self.edges(component),
            self.coordinates(component).as_ref(),
            self.options.range(component),
            self.options.bins(component),
            mask,
        )
    }

    /// Integrates `frame` onto q∥ × q⊥, or onto one component for 1D output.
    ///
    /// A 1D profile is restricted by the range of the other component when
    /// one is configured.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] for a frame or mask of the wrong shape.
    pub fn integrate(
        &self,
        frame: &Frame,
        mask: Option<&Mask>,
        region: Option<&dyn RegionOfInterest>,
        execution: ExecutionStrategy,
    ) -> Result<IntegrationOutput> {
        let mask = prepare_mask(self.geometry.shape(), frame, mask, region)?;
        let options = &self.options;
        let strategy = BinningStrategy::select(options.to_1d, options.use_pixel_splitting);
        let (primary, secondary) = (options.primary(), options.secondary());
        debug!("surface integration along {primary:?} with {strategy:?}");

        let primary_coords = self.coordinates(primary);
        let secondary_coords = self.coordinates(secondary);
        let primary_edges = self.edges_for(primary, mask.as_ref())?;
        let secondary_edges = if options.to_1d {
            None
        } else {
            Some(self.edges_for(secondary, mask.as_ref())?)
        };
        let axes = AxisPair::new(
            options.to_1d,
            BinnedAxis::new(primary_coords.as_ref(), &primary_edges),
            secondary_coords.as_ref(),
            secondary_edges.as_deref(),
            false,
            options.range(secondary),
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
            || Ok(publish_axis(primary, &primary_edges)),
            || match secondary_edges.as_deref() {
                Some(edges) => Ok(publish_axis(secondary, edges)),
                None => self.axis(secondary),
            },
        )
    }
}

fn publish_axis(component: SurfaceComponent, edges: &BinEdges) -> Axis {
    Axis::from_edges(component.name(), component.units(), edges, |v| v)
}
