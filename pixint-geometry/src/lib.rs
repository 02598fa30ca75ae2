//! pixint-geometry: Diffraction geometry and per-pixel coordinates.
//!
//! This crate turns detector pixel positions into the scalar coordinates the
//! binning engine works on.
//!
//! # Key Components
//!
//! - [`GeometryProvider`] - the seam between detector models and integration
//! - [`DiffractionGeometry`] - flat, optionally tilted detector in a monochromatic beam
//! - [`coordinates`] - radial and azimuthal coordinates, per pixel or per footprint
//! - [`surface`] - grazing-incidence q∥ / q⊥ coordinates
//!
//! # Configuration
//!
//! [`DiffractionGeometry::from_json`] reads a document of the form
//!
//! ```json
//! {
//!   "detector": {
//!     "shape": {"rows": 1679, "cols": 1475},
//!     "pixel_size_mm": [0.172, 0.172],
//!     "distance_mm": 200.0,
//!     "beam_centre_px": [737.5, 839.5],
//!     "orientation_deg": {"yaw": 0.0, "pitch": 0.0, "roll": 0.0}
//!   },
//!   "environment": {"wavelength_angstrom": 1.0}
//! }
//! ```
//!
//! where every field is optional.

pub mod coordinates;
mod detector;
pub mod error;
mod provider;
pub mod surface;

pub use coordinates::{generate, pixel_value, wrap_degrees};
pub use detector::{
    DetectorProperties, DiffractionEnvironment, DiffractionGeometry, Orientation,
    HC_KEV_ANGSTROM,
};
pub use error::{Error, Result};
pub use provider::{GeometryKey, GeometryProvider, Snapshot};
pub use surface::{generate_surface, SurfaceComponent, SurfaceOrientation};
