//! End-to-end initial-condition scenarios on the host.

use swe_core::init::{DEFAULT_DEPTH, REFERENCE_LEVEL};
use swe_core::prelude::*;

fn options(args: &[&str]) -> ProgramOptions {
    let mut full = vec!["swe-gpu"];
    full.extend_from_slice(args);
    ProgramOptions::parse_from(full).expect("valid options")
}

fn square_100() -> ProgramOptions {
    options(&["--nx", "100", "--ny", "100", "--width", "1000", "--height", "1000"])
}

#[test]
fn test_default_basin_at_rest() {
    let opts = square_100();
    let init = InitConditions::init(&opts, &NoSource).unwrap();

    assert_eq!(init.dx(), 10.0);
    assert_eq!(init.dy(), 10.0);
    assert_eq!(init.nx(), 100);
    assert_eq!(init.ny(), 100);

    for (kind, field) in init.fields() {
        assert_eq!(field.nx(), 100, "{kind}");
        assert_eq!(field.ny(), 100, "{kind}");
        assert_eq!(field.ghost(), GHOST_CELLS, "{kind}");
        assert_eq!(
            field.len(),
            (100 + 2 * GHOST_CELLS) * (100 + 2 * GHOST_CELLS),
            "{kind}"
        );
    }

    assert!(init.bathymetry_field().interior().all(|b| b == REFERENCE_LEVEL - DEFAULT_DEPTH));
    assert!(init.h().interior().all(|h| h == DEFAULT_DEPTH));
    assert!(init.eta().interior().all(|e| e == 0.0));
    assert!(init.water_elevation_field().interior().all(|w| w == DEFAULT_DEPTH));
    assert!(init.u().as_slice().iter().all(|&u| u == 0.0));
    assert!(init.v().as_slice().iter().all(|&v| v == 0.0));
}

#[test]
fn test_external_bathymetry_with_wrong_shape() {
    let opts = options(&[
        "--nx", "100", "--ny", "100", "--width", "1000", "--height", "1000",
        "--bathymetry-no", "0",
    ]);
    let small = FieldInfo::filled(GridShape::from_extent(50, 50, 1000.0, 1000.0), -20.0);
    let source = MemorySource::new().with(SourceKind::Bathymetry, 0, small);

    let err = InitConditions::init(&opts, &source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);

    let msg = err.message();
    assert!(msg.contains("bathymetry"), "{msg}");
    assert!(msg.contains("100x100"), "{msg}");
    assert!(msg.contains("50x50"), "{msg}");
}

#[test]
fn test_selector_without_data() {
    let opts = options(&[
        "--nx", "10", "--ny", "10", "--width", "10", "--height", "10", "--eta-no", "4",
    ]);

    let err = InitConditions::init(&opts, &NoSource).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingSource);
    assert!(err.message().contains("eta"));
    assert!(err.message().contains('4'));
}

#[test]
fn test_zero_cells_rejected() {
    let err = ProgramOptions::parse_from([
        "swe-gpu", "--nx", "0", "--ny", "100", "--width", "1000", "--height", "1000",
    ])
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!err.message().is_empty());
}

#[test]
fn test_external_elevation_defines_eta() {
    let opts = options(&[
        "--nx", "16", "--ny", "8", "--width", "160", "--height", "80",
        "--bathymetry-no", "1", "--water-elevation-no", "2",
    ]);
    let shape = opts.grid_shape();

    let seabed = FieldInfo::from_fn(shape, |x, _| -5.0 - 0.05 * x);
    let elevation = FieldInfo::from_fn(shape, |x, y| 5.5 + 0.05 * x + 0.01 * y);
    let source = MemorySource::new()
        .with(SourceKind::Bathymetry, 1, seabed.clone())
        .with(SourceKind::WaterElevation, 2, elevation.clone());

    let init = InitConditions::init(&opts, &source).unwrap();

    assert_eq!(init.provenance(FieldKind::Bathymetry), Provenance::External(1));
    assert_eq!(init.provenance(FieldKind::WaterElevation), Provenance::External(2));
    assert_eq!(init.provenance(FieldKind::Eta), Provenance::Derived);

    // Buffers whose ghosts are already edge-extended are shared, not copied.
    assert!(std::sync::Arc::ptr_eq(init.bathymetry_field().data(), seabed.data()));
    assert!(std::sync::Arc::ptr_eq(init.water_elevation_field().data(), elevation.data()));

    for ((h, eta), w) in init
        .h()
        .as_slice()
        .iter()
        .zip(init.eta().as_slice())
        .zip(init.water_elevation_field().as_slice())
    {
        assert!((h + eta - w).abs() < 1e-4, "H + eta = {} but elevation = {}", h + eta, w);
    }
}

#[test]
fn test_external_ghosts_are_edge_extended() {
    let opts = options(&[
        "--nx", "6", "--ny", "4", "--width", "6", "--height", "4", "--bathymetry-no", "0",
    ]);
    let shape = opts.grid_shape();
    let (g, pnx) = (shape.ghost(), shape.padded_nx());

    let interior: Vec<f32> = (0..24).map(|v| -1.0 - v as f32).collect();
    let mut padded = FieldInfo::from_interior(shape, &interior).unwrap().as_slice().to_vec();
    for pj in 0..shape.padded_ny() {
        for pi in 0..pnx {
            if pi < g || pi >= g + 6 || pj < g || pj >= g + 4 {
                padded[pj * pnx + pi] = 999.0;
            }
        }
    }
    let raw = FieldInfo::wrap(shape, std::sync::Arc::new(padded)).unwrap();
    let source = MemorySource::new().with(SourceKind::Bathymetry, 0, raw.clone());

    let init = InitConditions::init(&opts, &source).unwrap();

    let expected = FieldInfo::from_interior(shape, &interior).unwrap();
    assert_eq!(init.bathymetry_field().as_slice(), expected.as_slice());
    for (h, b) in init.h().as_slice().iter().zip(init.bathymetry_field().as_slice()) {
        assert_eq!(*h, REFERENCE_LEVEL - b);
    }
    assert!(!init.water_elevation_field().as_slice().contains(&(REFERENCE_LEVEL - 999.0)));

    // The source's buffer is left as supplied.
    assert_eq!(raw.as_slice()[0], 999.0);
}

#[test]
fn test_external_eta_defines_elevation() {
    let opts = options(&[
        "--nx", "12", "--ny", "12", "--width", "12", "--height", "12", "--eta-no", "0",
    ]);
    let eta = FieldInfo::from_fn(opts.grid_shape(), |x, y| 0.1 * (x - y));
    let source = MemorySource::new().with(SourceKind::Eta, 0, eta);

    let init = InitConditions::init(&opts, &source).unwrap();
    assert_eq!(init.provenance(FieldKind::WaterElevation), Provenance::Derived);

    let w = init.water_elevation_field().get(11, 0).unwrap();
    let e = init.eta().get(11, 0).unwrap();
    assert!((w - (DEFAULT_DEPTH + e)).abs() < 1e-5);
}

#[test]
fn test_init_is_deterministic() {
    let opts = options(&[
        "--nx", "64", "--ny", "32", "--width", "640", "--height", "320",
        "--profile", "gaussian-hump",
    ]);

    let a = InitConditions::init(&opts, &NoSource).unwrap();
    let b = InitConditions::init(&opts, &NoSource).unwrap();

    for ((kind, fa), (_, fb)) in a.fields().zip(b.fields()) {
        let bits_a: Vec<u32> = fa.as_slice().iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u32> = fb.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b, "{kind} differs between runs");
    }
}

#[test]
fn test_ghost_cells_extend_interior() {
    let opts = options(&[
        "--nx", "10", "--ny", "10", "--width", "100", "--height", "100",
        "--profile", "gaussian-hump",
    ]);
    let init = InitConditions::init(&opts, &NoSource).unwrap();
    let eta = init.eta();
    let shape = eta.shape();

    // Left ghost columns repeat the first interior column.
    let first = eta.as_slice()[shape.index(0, 3)];
    let row_start = (3 + shape.ghost()) * shape.padded_nx();
    for g in 0..shape.ghost() {
        assert_eq!(eta.as_slice()[row_start + g], first);
    }
}
