//! `swe-gpu devices` command - List compute platforms and devices.

use colored::Colorize;
use swe_core::BackendChoice;
use swe_wgpu::shader::backend_mask;
use swe_wgpu::{BuildOptions, ComputeSetup};

use crate::error::CliResult;

/// Execute the `devices` command.
pub fn execute(backends: &[BackendChoice]) -> CliResult<()> {
    let build = BuildOptions {
        backends: backend_mask(backends),
        ..BuildOptions::default()
    };

    println!("{} Enumerating compute devices", "→".bright_cyan());
    println!("  {} Backends: {:?}", "•".dimmed(), build.backends);
    println!();

    let platforms = ComputeSetup::new(build).enumerate()?;

    for line in platforms.listing().lines() {
        if line.starts_with("Platform") {
            println!("{}", line.bright_white());
        } else {
            println!("{}", line);
        }
    }

    Ok(())
}
