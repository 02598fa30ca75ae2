//! pixint-algorithms: Binning engines and integration caches.
//!
//! This crate turns per-pixel coordinates into integrated profiles:
//! - **Binning** - whole-pixel and pixel-splitting engines, 1D and 2D
//! - **Registry** - process-wide LRU of generated coordinate arrays
//! - **Cache** - lazily memoized coordinates and edges per detector
//! - **Surface** - grazing-incidence q∥ / q⊥ integration
//! - **Remap** - binning onto caller-supplied coordinate arrays
//!
#![warn(missing_docs)]

pub mod binning;
mod cache;
mod processing;
pub mod registry;
mod remap;
mod surface;

pub use binning::{bin, BinningStrategy, ExecutionStrategy};
pub use cache::IntegrationCache;
pub use processing::{integrate, IntegrationOutput};
pub use registry::{CoordinateKey, CoordinateRegistry, RegistryStats};
pub use remap::{finite_difference_envelope, RemapCache, RemapOptions};
pub use surface::{SurfaceIntegrationCache, SurfaceOptions};

// Re-export the core configuration types callers build requests from
pub use pixint_core::{IntegrationOptions, RadialAxisType};
