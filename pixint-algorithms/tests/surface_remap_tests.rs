#![allow(clippy::float_cmp, clippy::cast_precision_loss)]
use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::Array2;
use pixint_algorithms::{
    CoordinateRegistry, ExecutionStrategy, RemapCache, RemapOptions, SurfaceIntegrationCache,
    SurfaceOptions,
};
use pixint_core::Frame;
use pixint_geometry::{
    DetectorProperties, DiffractionEnvironment, DiffractionGeometry, GeometryProvider,
    SurfaceComponent, SurfaceOrientation,
};

fn grazing_geometry() -> Arc<dyn GeometryProvider> {
    // Beam near the bottom edge, as for a sample horizon low on the detector.
    Arc::new(
        DiffractionGeometry::new(
            DetectorProperties::flat(24, 30, 0.1, 80.0, (15.0, 22.0)),
            DiffractionEnvironment::from_energy_kev(10.0),
        )
        .unwrap(),
    )
}

fn surface_cache(options: SurfaceOptions) -> SurfaceIntegrationCache {
    SurfaceIntegrationCache::with_registry(
        grazing_geometry(),
        SurfaceOrientation::from_pitch_roll(0.5, 0.0),
        options,
        Arc::new(CoordinateRegistry::new(8)),
    )
    .unwrap()
}

#[test]
fn test_surface_map_with_splitting_conserves_weight() {
    let cache = surface_cache(SurfaceOptions::default().with_bins(16, 12).with_pixel_splitting(true));
    let output = cache
        .integrate(
            &Frame::new(Array2::from_elem((24, 30), 2.0)),
            None,
            None,
            ExecutionStrategy::Parallel,
        )
        .unwrap();
    let map = output.as_map().unwrap();
    assert_eq!(map.intensity.dim(), (12, 16));
    assert_eq!(map.y_axis.name, "q_perpendicular");
    assert_relative_eq!(output.total_weight(), 720.0, epsilon = 1e-6);
    for (&i, &w) in map.intensity.iter().zip(map.weight.iter()) {
        if w > 0.0 {
            assert_relative_eq!(i, 2.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_surface_profile_along_perpendicular() {
    let cache = surface_cache(
        SurfaceOptions::default()
            .with_to_1d(true)
            .with_perpendicular_primary(true)
            .with_bins(10, 20),
    );
    let output = cache
        .integrate(&Frame::new(Array2::ones((24, 30))), None, None, ExecutionStrategy::Serial)
        .unwrap();
    let profile = output.as_profile().unwrap();
    assert_eq!(profile.len(), 20);
    assert_eq!(profile.axis.name, "q_perpendicular");
    assert_relative_eq!(output.total_weight(), 720.0);
}

#[test]
fn test_surface_parallel_changes_sign_across_beam() {
    let cache = surface_cache(SurfaceOptions::default());
    let coords = cache.coordinates(SurfaceComponent::Parallel);
    // Columns on opposite sides of the beam have opposite in-plane sign.
    let left = coords.value(10, 2);
    let right = coords.value(10, 27);
    assert!(left * right < 0.0, "expected opposite signs, got {left} and {right}");
}

#[test]
fn test_remap_matches_surface_binning() {
    // Remapping onto the surface cache's own coordinates reproduces its map.
    let cache = surface_cache(SurfaceOptions::default().with_bins(9, 7));
    let parallel = cache.coordinates(SurfaceComponent::Parallel);
    let perpendicular = cache.coordinates(SurfaceComponent::Perpendicular);
    let x = Array2::from_shape_fn((24, 30), |(r, c)| parallel.value(r, c));
    let y = Array2::from_shape_fn((24, 30), |(r, c)| perpendicular.value(r, c));

    let frame = Frame::new(Array2::from_shape_fn((24, 30), |(r, c)| (r + 2 * c) as f64));
    let remap = RemapCache::new(
        x,
        y,
        RemapOptions::default()
            .with_bins(9, 7)
            .with_x_axis("q_parallel", "1/Angstrom")
            .with_y_axis("q_perpendicular", "1/Angstrom"),
    )
    .unwrap();
    let remapped = remap
        .remap(&frame, None, None, ExecutionStrategy::Serial)
        .unwrap();
    let integrated = cache
        .integrate(&frame, None, None, ExecutionStrategy::Serial)
        .unwrap();
    assert_eq!(&remapped, integrated.as_map().unwrap());
}
