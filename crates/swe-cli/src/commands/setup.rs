//! `swe-gpu setup` command - Validate options, build initial conditions and
//! hand them to a freshly built compute context.

use std::ffi::OsString;

use colored::Colorize;
use swe_core::{FieldKind, InitConditions, NoSource, ProgramOptions};
use swe_wgpu::{
    BuildOptions, ComputeContext, ComputeSetup, FieldBuffer, KernelSource, SelectedDevice,
    BUILTIN_ENTRY_POINTS,
};
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// Largest accepted difference between a device-computed field and its host value.
const HANDOFF_TOLERANCE: f32 = 1e-4;

/// Execute the `setup` command with the raw simulation options.
pub fn execute(args: Vec<OsString>) -> CliResult<()> {
    let options =
        ProgramOptions::parse_from(std::iter::once(OsString::from("swe-gpu setup")).chain(args))?;

    println!("{} Configuration", "→".bright_cyan());
    for line in options.to_string().lines() {
        println!("  {} {}", "•".dimmed(), line);
    }
    if let Some(path) = options.config_file() {
        println!("  {} config file: {}", "•".dimmed(), path.display().to_string().bright_yellow());
    }
    println!();

    // Host side first: bad input never touches the device.
    let init = InitConditions::init(&options, &NoSource)?;
    for kind in FieldKind::ALL {
        debug!("{}: {}", kind, init.provenance(kind));
    }

    let build = BuildOptions::from_options(&options);
    let platforms = ComputeSetup::new(build.clone()).enumerate()?;
    debug!("Compute platforms:\n{}", platforms.listing());

    let adapter = platforms.select(options.platform(), options.device())?;
    let device = SelectedDevice::open(adapter, &build)?;

    let source = match options.kernel_file() {
        Some(path) => KernelSource::load(path)?,
        None => KernelSource::builtin(),
    };
    let context = device.build_program(&source, BUILTIN_ENTRY_POINTS)?;

    let buffers = init
        .fields()
        .map(|(kind, field)| context.upload_field(field, kind.name()))
        .collect::<Result<Vec<_>, _>>()?;

    let buffer = |kind: FieldKind| &buffers[kind as usize];
    let depth_error = verify_kernel(
        &context,
        &init,
        "total_depth",
        [buffer(FieldKind::H), buffer(FieldKind::Eta)],
        FieldKind::WaterElevation,
    )?;
    let deviation_error = verify_kernel(
        &context,
        &init,
        "surface_deviation",
        [buffer(FieldKind::WaterElevation), buffer(FieldKind::H)],
        FieldKind::Eta,
    )?;
    info!(
        "Device fields match host within {:e} (total depth) and {:e} (surface deviation)",
        depth_error, deviation_error
    );

    print_summary(&options, &context, &init, &buffers)
}

/// Run `entry` on two uploaded fields and compare the result with the host `expected` field.
fn verify_kernel(
    context: &ComputeContext,
    init: &InitConditions,
    entry: &str,
    operands: [&FieldBuffer; 2],
    expected: FieldKind,
) -> CliResult<f32> {
    let shape = init.shape();

    let params = context.grid_params(&shape)?;
    let out = context.create_field(&shape, entry)?;
    let bind_group = context.bind_fields(entry, &params, &[operands[0], operands[1], &out])?;
    context.dispatch(entry, &bind_group, &shape)?;

    let result = context.download_field(&out)?;
    let max_error = result
        .as_slice()
        .iter()
        .zip(init.field(expected).as_slice())
        .map(|(device, host)| (device - host).abs())
        .fold(0.0f32, f32::max);
    debug!("{}: max difference from host {} is {:e}", entry, expected, max_error);

    if max_error > HANDOFF_TOLERANCE {
        return Err(CliError::Check(format!(
            "{} differs from host {} by {} (tolerance {})",
            entry, expected, max_error, HANDOFF_TOLERANCE
        )));
    }

    Ok(max_error)
}

fn print_summary(
    options: &ProgramOptions,
    context: &ComputeContext,
    init: &InitConditions,
    buffers: &[FieldBuffer],
) -> CliResult<()> {
    let info = context.device_info();
    let (gx, gy, _) = context.dispatch_size(&init.shape())?;
    let (wx, wy) = context.workgroup_size();
    let bytes: u64 = buffers.iter().map(FieldBuffer::size).sum();

    println!("{} Compute context", "→".bright_cyan());
    println!(
        "  {} Device: {} ({:?}, {:?})",
        "•".dimmed(),
        info.name.bright_white(),
        info.backend,
        info.device_type
    );
    println!(
        "  {} Kernels: {}",
        "•".dimmed(),
        context.entry_points().join(", ").bright_yellow()
    );
    println!(
        "  {} Dispatch: {}x{} work groups of {}x{}",
        "•".dimmed(),
        gx,
        gy,
        wx,
        wy
    );
    println!();

    println!("{} Initial conditions", "→".bright_cyan());
    for (kind, field) in init.fields() {
        println!(
            "  {} {:<16} {}x{} (+{} ghost)  {}",
            "•".dimmed(),
            kind.name(),
            field.nx(),
            field.ny(),
            field.ghost(),
            init.provenance(kind).to_string().dimmed()
        );
    }
    println!(
        "  {} {} fields resident on device ({} KiB)",
        "•".dimmed(),
        buffers.len(),
        bytes / 1024
    );
    println!();

    let output = options
        .output_file()
        .map_or_else(|| "none".to_string(), |p| p.display().to_string());
    println!(
        "{} Ready for solver (output: {})",
        "✓".green().bold(),
        output.bright_yellow()
    );
    Ok(())
}
