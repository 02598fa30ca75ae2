//! pixint-core: Core types for area-detector pixel integration.
//!
//! This crate provides the building blocks shared by the geometry and
//! binning crates: integration options, bin edges, per-pixel coordinate
//! arrays, masks and regions of interest, frames and histogram results.
//!

pub mod axis;
pub mod coords;
pub mod edges;
pub mod error;
pub mod frame;
pub mod histogram;
pub mod mask;
pub mod options;

pub use axis::{Axis, CoordinateKind, RadialAxisType, RadialScale};
pub use coords::PixelCoordinates;
pub use edges::{observed_range, BinEdges};
pub use error::{Error, Result};
pub use frame::Frame;
pub use histogram::{sanitize, Histogram, Profile1D, Profile2D};
pub use mask::{Mask, RectangularRegion, RegionOfInterest, SectorRegion};
pub use options::{normalize_azimuthal_range, IntegrationOptions};
