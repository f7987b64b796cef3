//! swe-gpu - Host-side setup for a GPU 2-D shallow-water simulator.
//!
//! # Commands
//!
//! - `swe-gpu devices` - List compute platforms and devices
//! - `swe-gpu setup <options>` - Validate options, build initial conditions and
//!   prepare the compute context
//!
//! # Examples
//!
//! ```bash
//! # Show what the Vulkan and Metal backends offer
//! swe-gpu devices --backends vulkan,metal
//!
//! # 100x100 cells over a 1 km square, Gaussian hump, second device
//! swe-gpu -v setup --nx 100 --ny 100 --width 1000 --height 1000 \
//!     --profile gaussian-hump --device 1
//!
//! # Options from a file, overriding the grid size
//! swe-gpu setup --config run.toml --nx 400
//! ```
//!
//! Global flags (`-v`, `-q`) go before the subcommand arguments.

use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use swe_core::{BackendChoice, ErrorKind};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use commands::{devices, setup};
use error::CliError;

/// swe-gpu - GPU shallow-water simulator setup
#[derive(Parser)]
#[command(name = "swe-gpu")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List compute platforms and their devices
    Devices {
        /// Backends to search (comma-separated)
        #[arg(short, long, value_enum, value_delimiter = ',', default_value = "all")]
        backends: Vec<BackendChoice>,
    },

    /// Validate options, build initial conditions and prepare the compute context
    ///
    /// Run `swe-gpu setup --help` for the simulation options.
    #[command(disable_help_flag = true)]
    Setup {
        /// Simulation options
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    setup_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Devices { backends } => devices::execute(&backends),
        Commands::Setup { args } => setup::execute(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Config(e)) if e.kind() == ErrorKind::Help => {
            print!("{}", e.message());
            ExitCode::SUCCESS
        }
        Err(CliError::Device(e)) => {
            eprintln!("{} {}", "Error:".red().bold(), e.diagnostic());
            eprintln!("  {}", e);
            CliError::Device(e).exit_code()
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            e.exit_code()
        }
    }
}
