//! Flat-detector diffraction geometry.
//!
//! A flat area detector of `rows × cols` pixels sits at `distance` from the
//! sample along the beam (+z). The detector frame is pivoted on the beam
//! centre: pixel `(x, y)` lies at
//!
//! ```text
//! R(yaw, pitch, roll) · ((x - bx)·px, (y - by)·py, 0) + (0, 0, distance)
//! ```
//!
//! so with no tilt the direct beam hits `(bx, by)` at normal incidence.
#![allow(clippy::cast_precision_loss, clippy::doc_markdown)]

use std::f64::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::{GeometryKey, GeometryProvider, Snapshot};

/// hc in keV·Å, for energy/wavelength conversion.
pub const HC_KEV_ANGSTROM: f64 = 12.398_419_843_320_026;

/// Detector tilt in degrees, applied as yaw (about y), then pitch (about x),
/// then roll (about the beam, z).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Orientation {
    /// Rotation about the vertical axis.
    pub yaw: f64,
    /// Rotation about the horizontal axis.
    pub pitch: f64,
    /// Rotation about the beam.
    pub roll: f64,
}

impl Orientation {
    /// Rotation taking detector-frame vectors into the lab frame.
    #[must_use]
    pub fn rotation(&self) -> Rotation3<f64> {
        let yaw = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw.to_radians());
        let pitch = Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch.to_radians());
        let roll = Rotation3::from_axis_angle(&Vector3::z_axis(), self.roll.to_radians());
        roll * pitch * yaw
    }
}

/// Physical layout of the detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorProperties {
    /// Number of pixel rows.
    pub rows: usize,
    /// Number of pixel columns.
    pub cols: usize,
    /// Pixel pitch `(x, y)` in millimetres.
    pub pixel_size_mm: (f64, f64),
    /// Sample-to-detector distance along the beam in millimetres.
    pub distance_mm: f64,
    /// Direct-beam position `(x, y)` in pixels.
    pub beam_centre: (f64, f64),
    /// Detector tilt.
    pub orientation: Orientation,
}

impl Default for DetectorProperties {
    fn default() -> Self {
        Self::pilatus_2m()
    }
}

impl DetectorProperties {
    /// Pilatus 2M at 200 mm with the beam on the detector centre.
    #[must_use]
    pub fn pilatus_2m() -> Self {
        Self {
            rows: 1679,
            cols: 1475,
            pixel_size_mm: (0.172, 0.172),
            distance_mm: 200.0,
            beam_centre: (737.5, 839.5),
            orientation: Orientation::default(),
        }
    }

    /// Untilted detector of the given shape with square pixels.
    #[must_use]
    pub fn flat(
        rows: usize,
        cols: usize,
        pixel_size_mm: f64,
        distance_mm: f64,
        beam_centre: (f64, f64),
    ) -> Self {
        Self {
            rows,
            cols,
            pixel_size_mm: (pixel_size_mm, pixel_size_mm),
            distance_mm,
            beam_centre,
            orientation: Orientation::default(),
        }
    }

    /// Checks that every parameter is physical.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(Error::InvalidGeometry(format!(
                "detector shape must be non-empty, got {}x{}",
                self.rows, self.cols
            )));
        }
        let (px, py) = self.pixel_size_mm;
        if !(px.is_finite() && py.is_finite() && px > 0.0 && py > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "pixel size must be positive, got ({px}, {py}) mm"
            )));
        }
        if !(self.distance_mm.is_finite() && self.distance_mm > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "detector distance must be positive, got {} mm",
                self.distance_mm
            )));
        }
        let (bx, by) = self.beam_centre;
        let o = self.orientation;
        if ![bx, by, o.yaw, o.pitch, o.roll].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidGeometry(
                "beam centre and orientation must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let o = self.orientation;
        Snapshot::from_values(&[
            self.rows as f64,
            self.cols as f64,
            self.pixel_size_mm.0,
            self.pixel_size_mm.1,
            self.distance_mm,
            self.beam_centre.0,
            self.beam_centre.1,
            o.yaw,
            o.pitch,
            o.roll,
        ])
    }
}

/// Incident beam: the crystal environment as far as integration is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffractionEnvironment {
    /// Wavelength in Å.
    pub wavelength: f64,
}

impl Default for DiffractionEnvironment {
    fn default() -> Self {
        Self { wavelength: 1.0 }
    }
}

impl DiffractionEnvironment {
    /// Environment for a photon energy in keV.
    #[must_use]
    pub fn from_energy_kev(energy_kev: f64) -> Self {
        Self {
            wavelength: HC_KEV_ANGSTROM / energy_kev,
        }
    }

    /// Photon energy in keV.
    #[must_use]
    pub fn energy_kev(&self) -> f64 {
        HC_KEV_ANGSTROM / self.wavelength
    }

    /// Wavenumber |k| = 2π/λ in 1/Å.
    #[must_use]
    pub fn wavenumber(&self) -> f64 {
        TAU / self.wavelength
    }

    /// Checks the wavelength is physical.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] for a non-positive or non-finite wavelength.
    pub fn validate(&self) -> Result<()> {
        if self.wavelength.is_finite() && self.wavelength > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidGeometry(format!(
                "wavelength must be positive, got {} Angstrom",
                self.wavelength
            )))
        }
    }
}

/// Flat detector plus beam environment; the reference [`GeometryProvider`].
#[derive(Clone, Debug)]
pub struct DiffractionGeometry {
    detector: DetectorProperties,
    environment: DiffractionEnvironment,
    rotation: Rotation3<f64>,
}

impl PartialEq for DiffractionGeometry {
    fn eq(&self, other: &Self) -> bool {
        self.detector == other.detector && self.environment == other.environment
    }
}

impl Default for DiffractionGeometry {
    fn default() -> Self {
        let detector = DetectorProperties::default();
        let rotation = detector.orientation.rotation();
        Self {
            detector,
            environment: DiffractionEnvironment::default(),
            rotation,
        }
    }
}

// Intermediate structs for the JSON configuration schema
#[derive(Deserialize)]
struct JsonConfig {
    #[serde(default)]
    detector: JsonDetector,
    #[serde(default)]
    environment: JsonEnvironment,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonDetector {
    shape: JsonShape,
    pixel_size_mm: [f64; 2],
    distance_mm: f64,
    beam_centre_px: Option<[f64; 2]>,
    orientation_deg: Orientation,
}

impl Default for JsonDetector {
    fn default() -> Self {
        let defaults = DetectorProperties::pilatus_2m();
        Self {
            shape: JsonShape::default(),
            pixel_size_mm: [defaults.pixel_size_mm.0, defaults.pixel_size_mm.1],
            distance_mm: defaults.distance_mm,
            beam_centre_px: None,
            orientation_deg: Orientation::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonShape {
    rows: usize,
    cols: usize,
}

impl Default for JsonShape {
    fn default() -> Self {
        let defaults = DetectorProperties::pilatus_2m();
        Self {
            rows: defaults.rows,
            cols: defaults.cols,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonEnvironment {
    wavelength_angstrom: Option<f64>,
    energy_kev: Option<f64>,
}

impl DiffractionGeometry {
    /// Creates a validated geometry.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] if either part is unphysical.
    pub fn new(detector: DetectorProperties, environment: DiffractionEnvironment) -> Result<Self> {
        detector.validate()?;
        environment.validate()?;
        let rotation = detector.orientation.rotation();
        Ok(Self {
            detector,
            environment,
            rotation,
        })
    }

    /// Load a geometry from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Load a geometry from a JSON string.
    ///
    /// Missing fields take Pilatus 2M defaults; a missing beam centre
    /// defaults to the middle of the detector. The environment accepts either
    /// `wavelength_angstrom` or `energy_kev`, the wavelength winning if both
    /// are present.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the geometry is unphysical.
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let detector = config.detector;
        let JsonShape { rows, cols } = detector.shape;

        let beam_centre = detector
            .beam_centre_px
            .map_or((cols as f64 / 2.0, rows as f64 / 2.0), |[x, y]| (x, y));

        let properties = DetectorProperties {
            rows,
            cols,
            pixel_size_mm: (detector.pixel_size_mm[0], detector.pixel_size_mm[1]),
            distance_mm: detector.distance_mm,
            beam_centre,
            orientation: detector.orientation_deg,
        };

        let environment = match (
            config.environment.wavelength_angstrom,
            config.environment.energy_kev,
        ) {
            (Some(wavelength), _) => DiffractionEnvironment { wavelength },
            (None, Some(energy)) => DiffractionEnvironment::from_energy_kev(energy),
            (None, None) => DiffractionEnvironment::default(),
        };

        Self::new(properties, environment)
    }

    /// Detector layout.
    #[must_use]
    pub fn detector(&self) -> &DetectorProperties {
        &self.detector
    }

    /// Beam environment.
    #[must_use]
    pub fn environment(&self) -> &DiffractionEnvironment {
        &self.environment
    }

    /// Lab-frame position of a detector point, in millimetres.
    #[must_use]
    pub fn lab_position(&self, x: f64, y: f64) -> Vector3<f64> {
        let d = &self.detector;
        let (bx, by) = d.beam_centre;
        let local = Vector3::new(
            (x - bx) * d.pixel_size_mm.0,
            (y - by) * d.pixel_size_mm.1,
            0.0,
        );
        self.rotation * local + Vector3::new(0.0, 0.0, d.distance_mm)
    }
}

impl GeometryProvider for DiffractionGeometry {
    fn shape(&self) -> (usize, usize) {
        (self.detector.rows, self.detector.cols)
    }

    fn beam_centre(&self) -> (f64, f64) {
        self.detector.beam_centre
    }

    fn pixel_to_q(&self, x: f64, y: f64) -> Vector3<f64> {
        let k = self.environment.wavenumber();
        let scattered = self.lab_position(x, y).normalize() * k;
        scattered - Vector3::new(0.0, 0.0, k)
    }

    fn scattering_angle(&self, q: &Vector3<f64>) -> f64 {
        let ratio = q.norm() / (2.0 * self.environment.wavenumber());
        2.0 * ratio.clamp(0.0, 1.0).asin()
    }

    fn wavelength(&self) -> f64 {
        self.environment.wavelength
    }

    fn key(&self) -> GeometryKey {
        GeometryKey {
            detector: self.detector.snapshot(),
            environment: Snapshot::from_values(&[self.environment.wavelength]),
        }
    }
}
