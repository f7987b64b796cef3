//! Compute context integration tests.
//!
//! These tests require a GPU (or a software adapter such as lavapipe).
//! Run with: cargo test -p swe-wgpu -- --ignored

use swe_core::prelude::*;
use swe_wgpu::prelude::*;

fn open_context(build: &BuildOptions) -> Option<ComputeContext> {
    if !swe_wgpu::is_available(build.backends) {
        eprintln!("Skipping test: no compute-capable adapter");
        return None;
    }

    let platforms = ComputeSetup::new(build.clone())
        .enumerate()
        .expect("Failed to enumerate platforms");
    let platform = (0..platforms.len())
        .find(|&p| platforms.device_count(p) > 0)
        .expect("No platform with devices");
    let adapter = platforms.select(platform, 0).expect("Failed to select device");

    let context = SelectedDevice::open(adapter, build)
        .expect("Failed to open device")
        .build_program(&KernelSource::builtin(), BUILTIN_ENTRY_POINTS)
        .expect("Failed to build program");
    Some(context)
}

fn initial_conditions() -> InitConditions {
    let options = ProgramOptions::parse_from([
        "swe-gpu", "--nx", "40", "--ny", "24", "--width", "400", "--height", "240",
        "--profile", "gaussian-hump",
    ])
    .unwrap();
    InitConditions::init(&options, &NoSource).unwrap()
}

#[test]
#[ignore] // Requires GPU
fn test_field_round_trip() {
    let Some(context) = open_context(&BuildOptions::default()) else {
        return;
    };
    let init = initial_conditions();

    let buffer = context.upload_field(init.eta(), "eta").unwrap();
    assert_eq!(buffer.size(), (init.eta().len() * 4) as u64);

    let back = context.download_field(&buffer).unwrap();
    assert!(back.shape().matches(&init.shape()));
    assert_eq!(back.as_slice(), init.eta().as_slice());
}

#[test]
#[ignore] // Requires GPU
fn test_total_depth_kernel_matches_host() {
    let Some(context) = open_context(&BuildOptions::default()) else {
        return;
    };
    let init = initial_conditions();
    let shape = init.shape();

    let params = context.grid_params(&shape).unwrap();
    let h = context.upload_field(init.h(), "H").unwrap();
    let eta = context.upload_field(init.eta(), "eta").unwrap();
    let out = context.create_field(&shape, "total depth").unwrap();

    let bind_group = context
        .bind_fields("total_depth", &params, &[&h, &eta, &out])
        .unwrap();
    context.dispatch("total_depth", &bind_group, &shape).unwrap();

    let depth = context.download_field(&out).unwrap();
    for (gpu, host) in depth
        .as_slice()
        .iter()
        .zip(init.water_elevation_field().as_slice())
    {
        assert!((gpu - host).abs() < 1e-5);
    }
}

#[test]
#[ignore] // Requires GPU
fn test_surface_deviation_kernel_matches_host() {
    let Some(context) = open_context(&BuildOptions::default()) else {
        return;
    };

    let options = ProgramOptions::parse_from([
        "swe-gpu", "--nx", "16", "--ny", "8", "--width", "160", "--height", "80",
        "--bathymetry-no", "1", "--water-elevation-no", "2",
    ])
    .unwrap();
    let shape = options.grid_shape();
    let source = MemorySource::new()
        .with(SourceKind::Bathymetry, 1, FieldInfo::from_fn(shape, |x, _| -5.0 - 0.05 * x))
        .with(
            SourceKind::WaterElevation,
            2,
            FieldInfo::from_fn(shape, |x, y| 5.5 + 0.05 * x + 0.01 * y),
        );
    let init = InitConditions::init(&options, &source).unwrap();

    let params = context.grid_params(&shape).unwrap();
    let elevation = context
        .upload_field(init.water_elevation_field(), "water elevation")
        .unwrap();
    let h = context.upload_field(init.h(), "H").unwrap();
    let out = context.create_field(&shape, "surface deviation").unwrap();

    let bind_group = context
        .bind_fields("surface_deviation", &params, &[&elevation, &h, &out])
        .unwrap();
    context
        .dispatch("surface_deviation", &bind_group, &shape)
        .unwrap();

    let eta = context.download_field(&out).unwrap();
    for (gpu, host) in eta.as_slice().iter().zip(init.eta().as_slice()) {
        assert!((gpu - host).abs() < 1e-5, "device {} vs host {}", gpu, host);
    }
}

#[test]
#[ignore] // Requires GPU
fn test_custom_tile_size() {
    let build = BuildOptions {
        workgroup_width: 8,
        workgroup_height: 8,
        ..BuildOptions::default()
    };
    let Some(context) = open_context(&build) else {
        return;
    };

    assert_eq!(context.workgroup_size(), (8, 8));
    assert_eq!(context.entry_points(), vec!["surface_deviation", "total_depth"]);
}

#[test]
#[ignore] // Requires GPU
fn test_unknown_entry_point() {
    let Some(context) = open_context(&BuildOptions::default()) else {
        return;
    };

    let err = context.pipeline("advance").unwrap_err();
    assert!(matches!(err, DeviceError::MissingKernel(_)));
}
