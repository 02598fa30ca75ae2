//! The geometry provider seam.
//!
//! Everything downstream of this trait (coordinate generation, caches,
//! binning) only needs to turn fractional pixel positions into scattering
//! vectors. Providers are immutable and comparable by value through
//! [`GeometryKey`], which is what the shared coordinate registry keys on.

use nalgebra::Vector3;

/// Bit-exact, hashable snapshot of a list of floating-point parameters.
///
/// `-0.0` is folded onto `0.0` so that equal geometries compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Snapshot(Vec<u64>);

impl Snapshot {
    /// Snapshot of `values` in order.
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        Self(
            values
                .iter()
                .map(|&v| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
                .collect(),
        )
    }

    /// Appends further values, e.g. a surface orientation.
    #[must_use]
    pub fn extended(mut self, values: &[f64]) -> Self {
        self.0.extend(Self::from_values(values).0);
        self
    }
}

/// Value identity of a geometry: detector snapshot plus beam environment snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GeometryKey {
    /// Detector shape, pixel size, distance, beam centre and orientation.
    pub detector: Snapshot,
    /// Beam/crystal environment, i.e. the wavelength.
    pub environment: Snapshot,
}

/// Maps detector pixel positions to scattering quantities.
///
/// Pixel positions are fractional `(x, y)` = (column, row); pixel `[r, c]`
/// covers `[c, c + 1) × [r, r + 1)`. Implementations are only ever queried
/// inside `[0, cols) × [0, rows)`.
pub trait GeometryProvider: Send + Sync {
    /// Detector shape as (rows, cols).
    fn shape(&self) -> (usize, usize);

    /// Point `(x, y)` where the direct beam meets the detector, in pixels.
    fn beam_centre(&self) -> (f64, f64);

    /// Scattering vector `q = k_f - k_i` for a position on the detector, in 1/Å.
    fn pixel_to_q(&self, x: f64, y: f64) -> Vector3<f64>;

    /// Scattering angle 2θ of `q`, in radians.
    fn scattering_angle(&self, q: &Vector3<f64>) -> f64;

    /// Incident wavelength in Å.
    fn wavelength(&self) -> f64;

    /// Value identity used for cache keys.
    fn key(&self) -> GeometryKey;
}
