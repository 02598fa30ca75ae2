#![allow(clippy::float_cmp, clippy::cast_precision_loss)]
use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::Array2;
use pixint_algorithms::{
    integrate, CoordinateRegistry, ExecutionStrategy, IntegrationCache, IntegrationOptions,
    IntegrationOutput, RadialAxisType,
};
use pixint_core::{Error, Frame, Mask, RectangularRegion};
use pixint_geometry::{DetectorProperties, DiffractionEnvironment, DiffractionGeometry, GeometryProvider};

fn geometry(rows: usize, cols: usize, beam: (f64, f64)) -> Arc<dyn GeometryProvider> {
    Arc::new(
        DiffractionGeometry::new(
            DetectorProperties::flat(rows, cols, 0.1, 100.0, beam),
            DiffractionEnvironment::default(),
        )
        .unwrap(),
    )
}

fn cache(geometry: Arc<dyn GeometryProvider>, options: IntegrationOptions) -> IntegrationCache {
    IntegrationCache::with_registry(geometry, options, Arc::new(CoordinateRegistry::new(8)))
        .unwrap()
}

/// Gaussian ring of radius 10 pixels on a flat background.
fn ring_frame(rows: usize, cols: usize, beam: (f64, f64)) -> Frame {
    let data = Array2::from_shape_fn((rows, cols), |(r, c)| {
        let d = (c as f64 + 0.5 - beam.0).hypot(r as f64 + 0.5 - beam.1);
        1.0 + 100.0 * (-(d - 10.0).powi(2) / 4.0).exp()
    });
    Frame::with_poisson_error(data)
}

#[test]
fn test_scenario_a_pixel_axis_weight_sum() {
    let options = IntegrationOptions::default()
        .with_axis_type(RadialAxisType::Pixel)
        .with_radial_bins(3);
    let cache = cache(geometry(4, 4, (2.0, 2.0)), options);
    let frame = Frame::new(Array2::ones((4, 4)));

    let output = cache.integrate(&frame, None, None).unwrap();
    let profile = output.as_profile().unwrap();
    assert_eq!(profile.len(), 3);
    assert_relative_eq!(output.total_weight(), 16.0);
    assert_eq!(profile.axis.name, "pixel");
}

#[test]
fn test_scenario_b_explicit_radial_edges() {
    let options = IntegrationOptions::default()
        .with_axis_type(RadialAxisType::Pixel)
        .with_radial_bins(2)
        .with_radial_range(Some([1.0, 3.0]));
    let cache = cache(geometry(4, 4, (2.0, 2.0)), options);
    assert_eq!(cache.radial_edges().unwrap().as_slice(), &[0.5, 1.5, 2.5, 3.5]);
}

#[test]
fn test_scenario_c_azimuthal_range_normalization() {
    let rejected = IntegrationOptions::default().with_azimuthal_range(Some([-190.0, 10.0]));
    let err = IntegrationCache::with_registry(
        geometry(4, 4, (2.0, 2.0)),
        rejected,
        Arc::new(CoordinateRegistry::new(1)),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    let accepted = IntegrationOptions::default().with_azimuthal_range(Some([350.0, 10.0]));
    let cache = cache(geometry(4, 4, (2.0, 2.0)), accepted);
    assert_eq!(cache.secondary_restriction().unwrap(), Some([10.0, 350.0]));
}

#[test]
fn test_scenario_d_mask_shape_mismatch() {
    let cache = cache(geometry(4, 4, (2.0, 2.0)), IntegrationOptions::default());
    let frame = Frame::new(Array2::ones((4, 4)));
    let mask = Mask::keep_all((4, 5));
    let err = cache.integrate(&frame, Some(&mask), None).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { what: "mask", .. }));

    let wrong_frame = Frame::new(Array2::ones((5, 4)));
    let err = cache.integrate(&wrong_frame, None, None).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { what: "frame", .. }));
}

#[test]
fn test_splitting_conserves_pixel_count() {
    let beam = (12.3, 9.7);
    for to_1d in [true, false] {
        let options = IntegrationOptions::default()
            .with_radial_bins(37)
            .with_azimuthal_bins(24)
            .with_to_1d(to_1d)
            .with_pixel_splitting(true);
        let cache = cache(geometry(20, 24, beam), options);
        let output = cache.integrate(&ring_frame(20, 24, beam), None, None).unwrap();
        assert_relative_eq!(output.total_weight(), 480.0, epsilon = 1e-6);
    }
}

#[test]
fn test_constant_frame_is_flat_under_splitting() {
    let beam = (16.0, 16.0);
    for bins in [7, 50, 211] {
        let options = IntegrationOptions::default()
            .with_radial_bins(bins)
            .with_pixel_splitting(true);
        let cache = cache(geometry(32, 32, beam), options);
        let output = cache
            .integrate(&Frame::new(Array2::from_elem((32, 32), 5.0)), None, None)
            .unwrap();
        let profile = output.as_profile().unwrap();
        for (&i, &w) in profile.intensity.iter().zip(&profile.weight) {
            if w > 0.0 {
                assert_relative_eq!(i, 5.0, epsilon = 1e-9);
            } else {
                assert_eq!(i, 0.0);
            }
        }
    }
}

#[test]
fn test_repeated_integration_is_identical() {
    let beam = (10.0, 8.0);
    let options = IntegrationOptions::default()
        .with_to_1d(false)
        .with_radial_bins(20)
        .with_azimuthal_bins(12)
        .with_pixel_splitting(true);
    let cache = cache(geometry(16, 20, beam), options);
    let frame = ring_frame(16, 20, beam);
    let first = cache.integrate(&frame, None, None).unwrap();
    let second = cache.integrate(&frame, None, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_all_masked_gives_zeros() {
    let beam = (8.0, 8.0);
    let cache = cache(geometry(16, 16, beam), IntegrationOptions::default().with_radial_bins(10));
    let mask = Mask::new(Array2::from_elem((16, 16), false));
    let output = cache
        .integrate(&ring_frame(16, 16, beam), Some(&mask), None)
        .unwrap();
    let profile = output.as_profile().unwrap();
    assert!(profile.weight.iter().all(|&w| w == 0.0));
    assert!(profile.intensity.iter().all(|&i| i == 0.0));
    assert!(profile.error.as_ref().unwrap().iter().all(|&e| e == 0.0));
}

#[test]
fn test_region_and_mask_combine() {
    let options = IntegrationOptions::default()
        .with_axis_type(RadialAxisType::Pixel)
        .with_radial_bins(5);
    let cache = cache(geometry(8, 8, (4.0, 4.0)), options);
    let mut keep = Array2::from_elem((8, 8), true);
    keep.column_mut(0).fill(false);
    let mask = Mask::new(keep);
    let region = RectangularRegion {
        x: 0.0,
        y: 0.0,
        width: 8.0,
        height: 4.0,
    };
    let output = cache
        .integrate(&Frame::new(Array2::ones((8, 8))), Some(&mask), Some(&region))
        .unwrap();
    assert_relative_eq!(output.total_weight(), 28.0);
}

#[test]
fn test_parallel_matches_serial() {
    let beam = (30.5, 21.0);
    let frame = ring_frame(48, 64, beam);
    for (to_1d, split) in [(true, false), (true, true), (false, false), (false, true)] {
        let options = IntegrationOptions::default()
            .with_to_1d(to_1d)
            .with_pixel_splitting(split)
            .with_radial_bins(40)
            .with_azimuthal_bins(18);
        let cache = cache(geometry(48, 64, beam), options);
        let serial = integrate(&cache, &frame, None, None, ExecutionStrategy::Serial).unwrap();
        let parallel = integrate(&cache, &frame, None, None, ExecutionStrategy::Parallel).unwrap();
        match (&serial, &parallel) {
            (IntegrationOutput::Profile(a), IntegrationOutput::Profile(b)) => {
                for (&x, &y) in a.intensity.iter().zip(&b.intensity) {
                    assert_relative_eq!(x, y, epsilon = 1e-9, max_relative = 1e-12);
                }
            }
            (IntegrationOutput::Map(a), IntegrationOutput::Map(b)) => {
                for (&x, &y) in a.intensity.iter().zip(b.intensity.iter()) {
                    assert_relative_eq!(x, y, epsilon = 1e-9, max_relative = 1e-12);
                }
            }
            _ => panic!("serial and parallel produced different output kinds"),
        }
        assert_relative_eq!(serial.total_weight(), parallel.total_weight(), epsilon = 1e-9);
    }
}

#[test]
fn test_pixel_across_cut_feeds_both_ends() {
    // Beam at the right-hand edge between rows 2 and 3: pixel [2, 0] looks
    // along the 180 degree direction. A full-turn range gives 36 bins of
    // 10 degrees with edges on -180 and 180.
    let options = IntegrationOptions::default()
        .with_azimuthal_primary(true)
        .with_azimuthal_bins(36)
        .with_azimuthal_range(Some([-180.0, 180.0]))
        .with_pixel_splitting(true);
    let cache = cache(geometry(5, 4, (3.5, 2.5)), options);
    let mut keep = Array2::from_elem((5, 4), false);
    keep[[2, 0]] = true;

    let output = cache
        .integrate(&Frame::new(Array2::ones((5, 4))), Some(&Mask::new(keep)), None)
        .unwrap();
    let profile = output.as_profile().unwrap();
    assert_eq!(profile.axis.name, "azimuthal angle");
    assert_eq!(profile.len(), 36);
    assert_relative_eq!(profile.axis.values[0], -175.0, epsilon = 1e-9);
    assert_relative_eq!(profile.axis.values[35], 175.0, epsilon = 1e-9);
    assert!(profile.weight[0] > 0.0);
    assert!(profile.weight[35] > 0.0);
    assert_relative_eq!(profile.weight[0], profile.weight[35], epsilon = 1e-9);
    assert_relative_eq!(output.total_weight(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_restriction_across_cut_keeps_its_span() {
    let beam = (3.5, 2.5);
    let frame = Frame::new(Array2::ones((5, 4)));
    let restricted = |range: [f64; 2]| {
        let options = IntegrationOptions::default()
            .with_axis_type(RadialAxisType::Pixel)
            .with_radial_bins(4)
            .with_pixel_splitting(false)
            .with_azimuthal_range(Some(range));
        cache(geometry(5, 4, beam), options)
            .integrate(&frame, None, None)
            .unwrap()
            .total_weight()
    };

    // The 20 degree arc through 180 holds the pixels left of the beam on its
    // row; the 340 degree arc holds everything else.
    let across = restricted([170.0, 190.0]);
    let rest = restricted([-170.0, 170.0]);
    assert!(across >= 3.0);
    assert!(across < rest);
    assert_relative_eq!(across + rest, 20.0);
    assert_relative_eq!(restricted([190.0, 170.0]), across);
}

#[test]
fn test_mask_narrows_automatic_range() {
    let beam = (8.0, 8.0);
    let options = IntegrationOptions::default()
        .with_axis_type(RadialAxisType::Pixel)
        .with_radial_bins(8)
        .with_pixel_splitting(false);
    let auto = cache(geometry(16, 16, beam), options);
    let mut keep = Array2::from_elem((16, 16), false);
    keep.slice_mut(ndarray::s![6..10, 6..10]).fill(true);
    let mask = Mask::new(keep);

    let unmasked_hi = auto.radial_edges().unwrap().hi();
    let masked = auto.primary_edges_for(Some(&mask)).unwrap();
    assert!(masked.hi() < unmasked_hi);
    assert!(masked.lo() > 0.0);

    let output = auto
        .integrate(&Frame::new(Array2::ones((16, 16))), Some(&mask), None)
        .unwrap();
    let profile = output.as_profile().unwrap();
    assert_eq!(profile.axis.values, masked.centres());
    // Kept pixels reach both ends of the narrowed grid.
    assert!(profile.weight[0] > 0.0);
    assert!(profile.weight[7] > 0.0);
    assert_relative_eq!(output.total_weight(), 16.0);

    // An explicit range ignores the mask.
    let explicit = cache(
        geometry(16, 16, beam),
        IntegrationOptions::default()
            .with_axis_type(RadialAxisType::Pixel)
            .with_radial_bins(8)
            .with_radial_range(Some([0.5, 8.5])),
    );
    let edges = explicit.primary_edges_for(Some(&mask)).unwrap();
    assert!(std::ptr::eq(&*edges, explicit.radial_edges().unwrap()));
}

#[test]
fn test_caches_share_registry_arrays() {
    let registry = Arc::new(CoordinateRegistry::new(8));
    // Distinct geometry objects describing the same detector.
    let a = IntegrationCache::with_registry(
        geometry(12, 12, (6.0, 6.0)),
        IntegrationOptions::default(),
        Arc::clone(&registry),
    )
    .unwrap();
    let b = IntegrationCache::with_registry(
        geometry(12, 12, (6.0, 6.0)),
        IntegrationOptions::default().with_radial_bins(17),
        Arc::clone(&registry),
    )
    .unwrap();

    assert!(Arc::ptr_eq(&a.radial_coordinates(), &b.radial_coordinates()));
    assert!(Arc::ptr_eq(&a.radial_coordinates(), &a.radial_coordinates()));
    assert_eq!(registry.stats().misses, 1);

    let c = IntegrationCache::with_registry(
        geometry(12, 12, (5.0, 6.0)),
        IntegrationOptions::default(),
        Arc::clone(&registry),
    )
    .unwrap();
    assert!(!Arc::ptr_eq(&a.radial_coordinates(), &c.radial_coordinates()));
}

#[test]
fn test_option_change_recomputes_edges() {
    let mut cache = cache(geometry(12, 12, (6.0, 6.0)), IntegrationOptions::default());
    assert_eq!(cache.radial_edges().unwrap().n_bins(), 1000);
    cache
        .set_options(IntegrationOptions::default().with_radial_bins(25))
        .unwrap();
    assert_eq!(cache.radial_edges().unwrap().n_bins(), 25);
    let profile = cache
        .integrate(&Frame::new(Array2::ones((12, 12))), None, None)
        .unwrap();
    assert_eq!(profile.as_profile().unwrap().len(), 25);
}

#[test]
fn test_two_dimensional_map_layout() {
    let beam = (9.0, 7.0);
    let options = IntegrationOptions::default()
        .with_to_1d(false)
        .with_radial_bins(11)
        .with_azimuthal_bins(6);
    let cache = cache(geometry(14, 18, beam), options);
    let output = cache.integrate(&ring_frame(14, 18, beam), None, None).unwrap();
    let map = output.as_map().unwrap();
    assert_eq!(map.intensity.dim(), (6, 11));
    assert_eq!(map.x_axis.len(), 11);
    assert_eq!(map.y_axis.len(), 6);
    assert_eq!(map.y_axis.units, "degrees");
    assert_relative_eq!(output.total_weight(), 252.0);
}
