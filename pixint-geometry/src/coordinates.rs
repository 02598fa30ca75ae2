//! Per-pixel coordinate generation.
//!
//! Whole-pixel coordinates evaluate the geometry once per pixel at its sample
//! position. Envelope coordinates evaluate a `(rows + 1) × (cols + 1)` lattice
//! of pixel corners and take the min/max over each pixel's four corners.
//!
//! Corners on the far detector edges (row `rows` or column `cols`) are outside
//! the detector and are never passed to the geometry provider; they are
//! linearly extrapolated from the inward neighbours instead.
#![allow(clippy::cast_precision_loss, clippy::many_single_char_names)]

use log::debug;
use ndarray::{Array2, Zip};
use pixint_core::{CoordinateKind, PixelCoordinates, RadialAxisType};

use crate::provider::GeometryProvider;

/// Wraps an angle in degrees into `(-180, 180]`.
#[inline]
#[must_use]
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Coordinate of kind `kind` at the fractional detector position `(x, y)`.
///
/// Radial values are in the units the axis is binned in, so d-spacing
/// returns |q|.
#[must_use]
pub fn pixel_value(geometry: &dyn GeometryProvider, kind: CoordinateKind, x: f64, y: f64) -> f64 {
    match kind {
        CoordinateKind::Radial(axis_type) => match axis_type.binned_as() {
            RadialAxisType::Pixel => {
                let (bx, by) = geometry.beam_centre();
                (x - bx).hypot(y - by)
            }
            RadialAxisType::Angle => {
                let q = geometry.pixel_to_q(x, y);
                geometry.scattering_angle(&q).to_degrees()
            }
            RadialAxisType::Q | RadialAxisType::Resolution => geometry.pixel_to_q(x, y).norm(),
        },
        CoordinateKind::Azimuthal => {
            let q = geometry.pixel_to_q(x, y);
            wrap_degrees(q.y.atan2(q.x).to_degrees())
        }
    }
}

/// Sample offset inside a pixel: `0.5` for centre sampling, `0` otherwise.
#[inline]
#[must_use]
pub fn sample_offset(centre: bool) -> f64 {
    if centre {
        0.5
    } else {
        0.0
    }
}

/// One value per pixel, sampled at `(col + offset, row + offset)`.
#[must_use]
pub fn centre_coordinates(
    geometry: &dyn GeometryProvider,
    kind: CoordinateKind,
    centre: bool,
) -> Array2<f64> {
    let offset = sample_offset(centre);
    centre_values(geometry.shape(), |x, y| {
        pixel_value(geometry, kind, x + offset, y + offset)
    })
}

/// Evaluates `eval(col, row)` for every pixel in parallel over rows.
pub(crate) fn centre_values<F>(shape: (usize, usize), eval: F) -> Array2<f64>
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    let mut values = Array2::zeros(shape);
    Zip::indexed(&mut values).par_for_each(|(r, c), v| {
        *v = eval(c as f64, r as f64);
    });
    values
}

/// Corner lattice of shape `(rows + 1, cols + 1)`; entry `[r, c]` is the
/// coordinate at detector point `(c, r)`.
///
/// With `periodic`, differences used for extrapolation are taken modulo 360
/// and extrapolated corners are wrapped back into `(-180, 180]`.
pub(crate) fn corner_lattice<F>(shape: (usize, usize), periodic: bool, eval: F) -> Array2<f64>
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    let (rows, cols) = shape;
    let mut lattice = Array2::from_elem((rows + 1, cols + 1), f64::NAN);
    Zip::indexed(&mut lattice).par_for_each(|(r, c), v| {
        if r < rows && c < cols {
            *v = eval(c as f64, r as f64);
        }
    });

    if rows == 0 || cols == 0 {
        return lattice;
    }

    let extrapolate = |edge: f64, inner: f64| {
        if periodic {
            wrap_degrees(edge + wrap_degrees(edge - inner))
        } else {
            edge + (edge - inner)
        }
    };

    // Far column, one corner per evaluated row.
    for r in 0..rows {
        lattice[[r, cols]] = if cols > 1 {
            extrapolate(lattice[[r, cols - 1]], lattice[[r, cols - 2]])
        } else {
            lattice[[r, cols - 1]]
        };
    }
    // Far row, one corner per evaluated column.
    for c in 0..cols {
        lattice[[rows, c]] = if rows > 1 {
            extrapolate(lattice[[rows - 1, c]], lattice[[rows - 2, c]])
        } else {
            lattice[[rows - 1, c]]
        };
    }
    // Far corner, along the diagonal.
    lattice[[rows, cols]] = if rows > 1 && cols > 1 {
        extrapolate(lattice[[rows - 1, cols - 1]], lattice[[rows - 2, cols - 2]])
    } else {
        lattice[[rows - 1, cols - 1]]
    };

    lattice
}

/// The four corners of pixel `[r, c]` in a corner lattice.
#[inline]
pub(crate) fn pixel_corners(lattice: &Array2<f64>, r: usize, c: usize) -> [f64; 4] {
    [
        lattice[[r, c]],
        lattice[[r, c + 1]],
        lattice[[r + 1, c]],
        lattice[[r + 1, c + 1]],
    ]
}

/// Min and max of the finite values, `(NaN, NaN)` if there are none.
#[inline]
pub(crate) fn finite_extent(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::NAN, f64::NAN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Envelope of four azimuthal corner angles.
///
/// A spread above 180 degrees means the pixel straddles the ±180 cut; negative
/// angles are then shifted by +360 so the envelope is contiguous, and its
/// maximum may exceed 180.
#[must_use]
pub fn azimuthal_envelope(corners: [f64; 4]) -> (f64, f64) {
    let (lo, hi) = finite_extent(&corners);
    if hi - lo <= 180.0 {
        return (lo, hi);
    }
    let shifted = corners.map(|v| if v < 0.0 { v + 360.0 } else { v });
    finite_extent(&shifted)
}

/// True if the detector point `(bx, by)` lies in the footprint of pixel `[r, c]`.
#[inline]
fn footprint_contains(r: usize, c: usize, (bx, by): (f64, f64)) -> bool {
    let (x0, y0) = (c as f64, r as f64);
    bx >= x0 && bx < x0 + 1.0 && by >= y0 && by < y0 + 1.0
}

/// Min/max coordinate spanned by each pixel's footprint `[c, c+1] × [r, r+1]`.
#[must_use]
pub fn envelope_coordinates(
    geometry: &dyn GeometryProvider,
    kind: CoordinateKind,
) -> (Array2<f64>, Array2<f64>) {
    let shape = geometry.shape();
    let beam = geometry.beam_centre();
    let lattice = corner_lattice(shape, kind.is_periodic(), |x, y| {
        // Azimuth is undefined at the beam centre itself.
        if kind.is_periodic() && (x, y) == beam {
            f64::NAN
        } else {
            pixel_value(geometry, kind, x, y)
        }
    });

    let beam_value = match kind {
        CoordinateKind::Radial(_) => pixel_value(geometry, kind, beam.0, beam.1),
        CoordinateKind::Azimuthal => f64::NAN,
    };

    let mut min = Array2::zeros(shape);
    let mut max = Array2::zeros(shape);
    Zip::indexed(&mut min)
        .and(&mut max)
        .par_for_each(|(r, c), lo, hi| {
            let corners = pixel_corners(&lattice, r, c);
            let contains_beam = footprint_contains(r, c, beam);
            let (a, b) = match kind {
                CoordinateKind::Azimuthal if contains_beam => (-180.0, 180.0),
                CoordinateKind::Azimuthal => azimuthal_envelope(corners),
                CoordinateKind::Radial(_) => {
                    let (a, b) = finite_extent(&corners);
                    // Radial coordinates are non-negative; only extrapolated
                    // corners can undershoot.
                    let a = a.max(0.0);
                    if contains_beam {
                        (beam_value.min(a), b)
                    } else {
                        (a, b)
                    }
                }
            };
            *lo = a;
            *hi = b;
        });

    (min, max)
}

/// Coordinate array for one kind: centre values, or the footprint envelope when `split`.
#[must_use]
pub fn generate(
    geometry: &dyn GeometryProvider,
    kind: CoordinateKind,
    split: bool,
    centre: bool,
) -> PixelCoordinates {
    let (rows, cols) = geometry.shape();
    debug!(
        "generating {kind:?} coordinates for {rows}x{cols} detector (split={split}, centre={centre})"
    );
    if split {
        let (min, max) = envelope_coordinates(geometry, kind);
        PixelCoordinates::Envelope { min, max }
    } else {
        PixelCoordinates::Centre(centre_coordinates(geometry, kind, centre))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::detector::{DetectorProperties, DiffractionEnvironment, DiffractionGeometry};
    use approx::assert_relative_eq;

    fn geometry(rows: usize, cols: usize, beam: (f64, f64)) -> DiffractionGeometry {
        DiffractionGeometry::new(
            DetectorProperties::flat(rows, cols, 0.1, 100.0, beam),
            DiffractionEnvironment::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-180.0), 180.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(540.0), 180.0);
        assert_relative_eq!(wrap_degrees(-190.0), 170.0);
    }

    #[test]
    fn test_pixel_distance_centre_sampling() {
        let g = geometry(4, 4, (2.0, 2.0));
        let kind = CoordinateKind::Radial(RadialAxisType::Pixel);

        let centred = centre_coordinates(&g, kind, true);
        assert_relative_eq!(centred[[1, 1]], 0.5f64.hypot(0.5));
        assert_relative_eq!(centred[[0, 0]], 1.5f64.hypot(1.5));

        let integer = centre_coordinates(&g, kind, false);
        assert_eq!(integer[[2, 2]], 0.0);
        assert_relative_eq!(integer[[0, 2]], 2.0);
    }

    #[test]
    fn test_resolution_generates_q() {
        let g = geometry(8, 8, (4.0, 4.0));
        let q = centre_coordinates(&g, CoordinateKind::Radial(RadialAxisType::Q), true);
        let d = centre_coordinates(&g, CoordinateKind::Radial(RadialAxisType::Resolution), true);
        assert_eq!(q, d);
    }

    #[test]
    fn test_azimuth_quadrants() {
        let g = geometry(4, 4, (2.0, 2.0));
        let azimuth = centre_coordinates(&g, CoordinateKind::Azimuthal, true);
        // +x is column direction, +y is row direction.
        assert!(azimuth[[2, 3]] > 0.0 && azimuth[[2, 3]] < 90.0);
        assert!(azimuth[[1, 1]] < -90.0);
        assert!(azimuth.iter().all(|&a| a > -180.0 && a <= 180.0));
    }

    #[test]
    fn test_corner_lattice_extrapolates_far_edges() {
        let lattice = corner_lattice((2, 3), false, |x, y| x + 10.0 * y);
        assert_eq!(lattice.dim(), (3, 4));
        // A linear function is reproduced exactly.
        for ((r, c), &v) in lattice.indexed_iter() {
            assert_relative_eq!(v, c as f64 + 10.0 * r as f64);
        }
    }

    #[test]
    fn test_corner_lattice_single_pixel_copies() {
        let lattice = corner_lattice((1, 1), false, |_, _| 7.0);
        assert!(lattice.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_corner_lattice_periodic_extrapolation() {
        let lattice = corner_lattice((1, 2), true, |x, _| if x < 0.5 { 170.0 } else { 178.0 });
        assert_relative_eq!(lattice[[0, 2]], -174.0);
    }

    #[test]
    fn test_azimuthal_envelope_straddling_cut() {
        let (lo, hi) = azimuthal_envelope([170.0, -170.0, 175.0, -175.0]);
        assert_eq!(lo, 170.0);
        assert_eq!(hi, 190.0);

        let (lo, hi) = azimuthal_envelope([10.0, 20.0, 15.0, 12.0]);
        assert_eq!((lo, hi), (10.0, 20.0));
    }

    #[test]
    fn test_envelope_contains_centre_value() {
        let g = geometry(6, 6, (3.0, 3.0));
        let kind = CoordinateKind::Radial(RadialAxisType::Q);
        let centre = centre_coordinates(&g, kind, true);
        let (min, max) = envelope_coordinates(&g, kind);
        for ((r, c), &v) in centre.indexed_iter() {
            assert!(min[[r, c]] <= v + 1e-12, "min above centre at [{r}, {c}]");
            assert!(max[[r, c]] >= v - 1e-12, "max below centre at [{r}, {c}]");
        }
    }

    #[test]
    fn test_beam_pixel_envelopes() {
        let g = geometry(4, 4, (2.5, 2.5));
        let (min, _) = envelope_coordinates(&g, CoordinateKind::Radial(RadialAxisType::Angle));
        assert_eq!(min[[2, 2]], 0.0);
        assert!(min[[0, 0]] > 0.0);

        let (lo, hi) = envelope_coordinates(&g, CoordinateKind::Azimuthal);
        assert_eq!((lo[[2, 2]], hi[[2, 2]]), (-180.0, 180.0));
        assert!(hi[[0, 0]] - lo[[0, 0]] < 180.0);
    }

    #[test]
    fn test_generate_variants() {
        let g = geometry(3, 5, (1.0, 1.0));
        let kind = CoordinateKind::Radial(RadialAxisType::Pixel);
        let whole = generate(&g, kind, false, true);
        assert!(!whole.is_envelope());
        assert_eq!(whole.shape(), (3, 5));

        let split = generate(&g, kind, true, true);
        assert!(split.is_envelope());
        assert_eq!(split.shape(), (3, 5));
    }
}
