//! Grazing-incidence (surface) coordinates.
//!
//! A sample surface is described by its normal `n̂` and an in-plane reference
//! direction. Each scattering vector splits into the out-of-plane component
//! `q⊥ = q·n̂` and the in-plane magnitude `|q - (q·n̂)n̂|`, signed by the
//! reference direction to give `q∥`.
#![allow(clippy::doc_markdown)]

use log::debug;
use nalgebra::{Rotation3, Unit, Vector3};
use ndarray::{Array2, Zip};
use pixint_core::PixelCoordinates;

use crate::coordinates::{centre_values, corner_lattice, finite_extent, pixel_corners, sample_offset};
use crate::error::{Error, Result};
use crate::provider::{GeometryProvider, Snapshot};

/// Which surface component a coordinate array holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceComponent {
    /// Signed in-plane component q∥.
    Parallel,
    /// Out-of-plane component q⊥.
    Perpendicular,
}

impl SurfaceComponent {
    /// Axis label.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Parallel => "q_parallel",
            Self::Perpendicular => "q_perpendicular",
        }
    }

    /// Axis units.
    #[must_use]
    pub fn units(self) -> &'static str {
        "1/Angstrom"
    }
}

/// Orientation of the sample surface in the lab frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOrientation {
    rotation: Rotation3<f64>,
}

impl Default for SurfaceOrientation {
    /// Surface normal along +y, reference along +x.
    fn default() -> Self {
        Self {
            rotation: Rotation3::identity(),
        }
    }
}

impl SurfaceOrientation {
    /// Normal = Rz(roll)·Rx(pitch)·ŷ, angles in degrees.
    #[must_use]
    pub fn from_pitch_roll(pitch: f64, roll: f64) -> Self {
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch.to_radians());
        let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), roll.to_radians());
        Self {
            rotation: roll * pitch,
        }
    }

    /// Rotation of `angle` degrees about `axis` applied to ŷ and x̂.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] for a zero-length or non-finite axis.
    pub fn from_axis_angle(axis: Vector3<f64>, angle: f64) -> Result<Self> {
        if !axis.iter().all(|v| v.is_finite()) || !angle.is_finite() {
            return Err(Error::InvalidGeometry(format!(
                "surface rotation must be finite, got axis {axis:?} angle {angle}"
            )));
        }
        let axis = Unit::try_new(axis, f64::EPSILON).ok_or_else(|| {
            Error::InvalidGeometry("surface rotation axis must be non-zero".to_string())
        })?;
        Ok(Self {
            rotation: Rotation3::from_axis_angle(&axis, angle.to_radians()),
        })
    }

    /// Unit surface normal.
    #[must_use]
    pub fn normal(&self) -> Vector3<f64> {
        self.rotation * Vector3::y()
    }

    /// Unit in-plane reference direction.
    #[must_use]
    pub fn reference(&self) -> Vector3<f64> {
        self.rotation * Vector3::x()
    }

    /// `(q∥, q⊥)` of a scattering vector.
    #[must_use]
    pub fn components(&self, q: &Vector3<f64>) -> (f64, f64) {
        let normal = self.normal();
        let perpendicular = q.dot(&normal);
        let in_plane = q - normal * perpendicular;
        let magnitude = in_plane.norm();
        let parallel = if in_plane.dot(&self.reference()) < 0.0 {
            -magnitude
        } else {
            magnitude
        };
        (parallel, perpendicular)
    }

    /// Single component of a scattering vector.
    #[must_use]
    pub fn component(&self, q: &Vector3<f64>, component: SurfaceComponent) -> f64 {
        let (parallel, perpendicular) = self.components(q);
        match component {
            SurfaceComponent::Parallel => parallel,
            SurfaceComponent::Perpendicular => perpendicular,
        }
    }

    /// Value identity of the orientation, for cache keys.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::from_values(self.rotation.matrix().as_slice())
    }
}

/// Replaces minority-sign values by the mean of the majority-sign values.
///
/// Zeros count as positive. A 2:2 split has no majority and is left untouched.
pub fn resolve_sign_majority(values: &mut [f64; 4]) {
    let negatives = values.iter().filter(|&&v| v < 0.0).count();
    let majority_negative = match negatives {
        0 | 2 | 4 => return,
        1 => false,
        _ => true,
    };
    let is_majority = |v: f64| (v < 0.0) == majority_negative;
    let (sum, count) = values
        .iter()
        .filter(|&&v| is_majority(v))
        .fold((0.0, 0.0), |(s, n), &v| (s + v, n + 1.0));
    let mean = sum / count;
    for v in values.iter_mut() {
        if !is_majority(*v) {
            *v = mean;
        }
    }
}

/// Surface component per pixel, sampled as for whole-pixel coordinates.
#[must_use]
pub fn surface_centre_coordinates(
    geometry: &dyn GeometryProvider,
    orientation: &SurfaceOrientation,
    component: SurfaceComponent,
    centre: bool,
) -> Array2<f64> {
    let offset = sample_offset(centre);
    centre_values(geometry.shape(), |x, y| {
        let q = geometry.pixel_to_q(x + offset, y + offset);
        orientation.component(&q, component)
    })
}

/// Min/max surface component over each pixel's four corners.
///
/// The parallel component is sign-resolved by majority vote before the
/// envelope is taken.
#[must_use]
pub fn surface_envelope_coordinates(
    geometry: &dyn GeometryProvider,
    orientation: &SurfaceOrientation,
    component: SurfaceComponent,
) -> (Array2<f64>, Array2<f64>) {
    let shape = geometry.shape();
    let lattice = corner_lattice(shape, false, |x, y| {
        let q = geometry.pixel_to_q(x, y);
        orientation.component(&q, component)
    });

    let mut min = Array2::zeros(shape);
    let mut max = Array2::zeros(shape);
    Zip::indexed(&mut min)
        .and(&mut max)
        .par_for_each(|(r, c), lo, hi| {
            let mut corners = pixel_corners(&lattice, r, c);
            if component == SurfaceComponent::Parallel {
                resolve_sign_majority(&mut corners);
            }
            (*lo, *hi) = finite_extent(&corners);
        });
    (min, max)
}

/// Surface coordinate array: centre values, or the corner envelope when `split`.
#[must_use]
pub fn generate_surface(
    geometry: &dyn GeometryProvider,
    orientation: &SurfaceOrientation,
    component: SurfaceComponent,
    split: bool,
    centre: bool,
) -> PixelCoordinates {
    debug!("generating {component:?} surface coordinates (split={split})");
    if split {
        let (min, max) = surface_envelope_coordinates(geometry, orientation, component);
        PixelCoordinates::Envelope { min, max }
    } else {
        PixelCoordinates::Centre(surface_centre_coordinates(
            geometry,
            orientation,
            component,
            centre,
        ))
    }
}
