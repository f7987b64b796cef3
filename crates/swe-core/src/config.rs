//! Program options: the immutable configuration snapshot of one run.
//!
//! Options come from the command line and, optionally, a TOML file given with
//! `--config`. Command-line values override file values. All values are
//! validated in one pass and every problem found is reported together.
//!
//! # Example
//!
//! ```toml
//! nx = 200
//! ny = 100
//! width = 2000.0
//! height = 1000.0
//! duration = 3600.0
//! profile = "gaussian-hump"
//! backends = ["vulkan", "metal"]
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::field::GridShape;

/// Default work-group tile width and height.
pub const DEFAULT_WORKGROUP: (u32, u32) = (16, 16);

/// Deterministic profile used for initial fields not supplied externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitialProfile {
    /// Flat seabed, flat free surface.
    #[default]
    Flat,
    /// Flat seabed with a Gaussian hump on the free surface in the domain centre.
    GaussianHump,
}

/// Graphics backends to search for compute devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Every backend compiled into the GPU layer.
    All,
    /// Backends with first-class support (Vulkan, Metal, DX12, WebGPU).
    Primary,
    /// Vulkan.
    Vulkan,
    /// Apple Metal.
    Metal,
    /// Direct3D 12.
    Dx12,
    /// OpenGL / OpenGL ES.
    Gl,
}

/// Raw command-line options, before validation.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "swe-gpu",
    version,
    about = "Prepare initial conditions and a compute context for a GPU shallow-water run",
    allow_negative_numbers = true
)]
pub struct OptionArgs {
    /// Global weighting factor in [0, 1]
    #[arg(long, value_name = "W")]
    pub w_global: Option<f32>,

    /// Index of an external surface-deviation (eta) field; needs a field source from the embedding program, `swe-gpu setup` has none
    #[arg(long, value_name = "N")]
    pub eta_no: Option<usize>,

    /// Index of an external water-elevation field; needs a field source from the embedding program, `swe-gpu setup` has none
    #[arg(long, value_name = "N")]
    pub water_elevation_no: Option<usize>,

    /// Index of an external bathymetry field; needs a field source from the embedding program, `swe-gpu setup` has none
    #[arg(long, value_name = "N")]
    pub bathymetry_no: Option<usize>,

    /// Interior grid cells in x
    #[arg(long)]
    pub nx: Option<i64>,

    /// Interior grid cells in y
    #[arg(long)]
    pub ny: Option<i64>,

    /// Domain width in meters
    #[arg(long)]
    pub width: Option<f32>,

    /// Domain height in meters
    #[arg(long)]
    pub height: Option<f32>,

    /// Simulated duration in seconds
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Wall-clock budget in seconds
    #[arg(long, value_name = "SECONDS")]
    pub wall_duration: Option<f64>,

    /// Target compute utilisation fraction in (0, 1]
    #[arg(long, value_name = "FRACTION")]
    pub cpu: Option<f32>,

    /// Output destination
    #[arg(long, value_name = "PATH")]
    pub output_file: Option<PathBuf>,

    /// Compute platform index
    #[arg(long)]
    pub platform: Option<usize>,

    /// Device index on the selected platform
    #[arg(long)]
    pub device: Option<usize>,

    /// WGSL kernel source (defaults to the built-in kernel)
    #[arg(long, value_name = "PATH")]
    pub kernel_file: Option<PathBuf>,

    /// Work-group tile width
    #[arg(long)]
    pub wgnx: Option<u32>,

    /// Work-group tile height
    #[arg(long)]
    pub wgny: Option<u32>,

    /// Backends to search (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub backends: Vec<BackendChoice>,

    /// Initial profile for fields not read from a source
    #[arg(long, value_enum)]
    pub profile: Option<InitialProfile>,

    /// TOML file with default values for any of the options above
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Option values read from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    w_global: Option<f32>,
    eta_no: Option<usize>,
    water_elevation_no: Option<usize>,
    bathymetry_no: Option<usize>,
    nx: Option<i64>,
    ny: Option<i64>,
    width: Option<f32>,
    height: Option<f32>,
    duration: Option<f64>,
    wall_duration: Option<f64>,
    cpu: Option<f32>,
    output_file: Option<PathBuf>,
    platform: Option<usize>,
    device: Option<usize>,
    kernel_file: Option<PathBuf>,
    wgnx: Option<u32>,
    wgny: Option<u32>,
    backends: Option<Vec<BackendChoice>>,
    profile: Option<InitialProfile>,
}

impl FileConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&text).map_err(|e| {
            ConfigError::InvalidArgument(format!("{}: {}", path.display(), e.message()))
        })
    }
}

/// Validated, immutable run parameters.
#[derive(Debug, Clone)]
pub struct ProgramOptions {
    w_global: f32,
    eta_no: Option<usize>,
    water_elevation_no: Option<usize>,
    bathymetry_no: Option<usize>,
    nx: usize,
    ny: usize,
    width: f32,
    height: f32,
    dx: f32,
    dy: f32,
    duration: Option<f64>,
    wall_duration: Option<f64>,
    cpu: f32,
    output_file: Option<PathBuf>,
    platform: usize,
    device: usize,
    kernel_file: Option<PathBuf>,
    workgroup: (u32, u32),
    backends: Vec<BackendChoice>,
    profile: InitialProfile,
    config_file: Option<PathBuf>,
}

impl ProgramOptions {
    /// Parse and validate a full argument list (program name first).
    pub fn parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = OptionArgs::try_parse_from(args).map_err(ConfigError::from_clap)?;
        Self::from_args(args)
    }

    /// Validate already tokenized options, merging in the `--config` file if given.
    pub fn from_args(args: OptionArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    fn resolve(args: OptionArgs, file: FileConfig) -> Result<Self> {
        let mut problems = Vec::new();

        let nx = positive_count("--nx", args.nx.or(file.nx), &mut problems);
        let ny = positive_count("--ny", args.ny.or(file.ny), &mut problems);
        if nx > 0 && ny > 0 && !GridShape::new(nx, ny, 1.0, 1.0).is_addressable() {
            problems.push(format!(
                "grid of {} x {} cells is too large: padded fields must hold at most {} cells",
                nx,
                ny,
                u32::MAX
            ));
        }
        let width = positive_length("--width", args.width.or(file.width), &mut problems);
        let height = positive_length("--height", args.height.or(file.height), &mut problems);

        let w_global = args.w_global.or(file.w_global).unwrap_or(1.0);
        if !(0.0..=1.0).contains(&w_global) {
            problems.push(format!(
                "--w-global must be within [0, 1] (got {})",
                w_global
            ));
        }

        let cpu = args.cpu.or(file.cpu).unwrap_or(1.0);
        if !(cpu > 0.0 && cpu <= 1.0) {
            problems.push(format!("--cpu must be within (0, 1] (got {})", cpu));
        }

        let duration = optional_duration("--duration", args.duration.or(file.duration), &mut problems);
        let wall_duration = optional_duration(
            "--wall-duration",
            args.wall_duration.or(file.wall_duration),
            &mut problems,
        );

        let eta_no = args.eta_no.or(file.eta_no);
        let water_elevation_no = args.water_elevation_no.or(file.water_elevation_no);
        if let (Some(eta), Some(elevation)) = (eta_no, water_elevation_no) {
            problems.push(format!(
                "--eta-no ({}) and --water-elevation-no ({}) both describe the free surface; give only one",
                eta, elevation
            ));
        }

        let wgnx = args.wgnx.or(file.wgnx).unwrap_or(DEFAULT_WORKGROUP.0);
        let wgny = args.wgny.or(file.wgny).unwrap_or(DEFAULT_WORKGROUP.1);
        if wgnx == 0 || wgny == 0 {
            problems.push(format!(
                "work-group tile must be non-empty (got {}x{})",
                wgnx, wgny
            ));
        }

        if !problems.is_empty() {
            return Err(ConfigError::InvalidArgument(problems.join("\n")));
        }

        let mut backends = if args.backends.is_empty() {
            file.backends.unwrap_or_default()
        } else {
            args.backends
        };
        if backends.is_empty() {
            backends.push(BackendChoice::All);
        }

        Ok(Self {
            w_global,
            eta_no,
            water_elevation_no,
            bathymetry_no: args.bathymetry_no.or(file.bathymetry_no),
            nx,
            ny,
            width,
            height,
            dx: width / nx as f32,
            dy: height / ny as f32,
            duration,
            wall_duration,
            cpu,
            output_file: args.output_file.or(file.output_file),
            platform: args.platform.or(file.platform).unwrap_or(0),
            device: args.device.or(file.device).unwrap_or(0),
            kernel_file: args.kernel_file.or(file.kernel_file),
            workgroup: (wgnx, wgny),
            backends,
            profile: args.profile.or(file.profile).unwrap_or_default(),
            config_file: args.config,
        })
    }

    /// Global weighting factor.
    pub fn w_global(&self) -> f32 {
        self.w_global
    }

    /// Selector of an external surface-deviation field.
    pub fn eta_no(&self) -> Option<usize> {
        self.eta_no
    }

    /// Selector of an external water-elevation field.
    pub fn water_elevation_no(&self) -> Option<usize> {
        self.water_elevation_no
    }

    /// Selector of an external bathymetry field.
    pub fn bathymetry_no(&self) -> Option<usize> {
        self.bathymetry_no
    }

    /// Interior grid cells in x.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Interior grid cells in y.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Domain width in meters.
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Domain height in meters.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Cell width, `width / nx`.
    pub fn dx(&self) -> f32 {
        self.dx
    }

    /// Cell height, `height / ny`.
    pub fn dy(&self) -> f32 {
        self.dy
    }

    /// Simulated duration in seconds (`None` means no limit).
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Wall-clock budget in seconds (`None` means no limit).
    pub fn wall_duration(&self) -> Option<f64> {
        self.wall_duration
    }

    /// Target compute utilisation fraction.
    pub fn cpu(&self) -> f32 {
        self.cpu
    }

    /// Output destination.
    pub fn output_file(&self) -> Option<&Path> {
        self.output_file.as_deref()
    }

    /// Compute platform index.
    pub fn platform(&self) -> usize {
        self.platform
    }

    /// Device index on the selected platform.
    pub fn device(&self) -> usize {
        self.device
    }

    /// WGSL kernel source, if not the built-in one.
    pub fn kernel_file(&self) -> Option<&Path> {
        self.kernel_file.as_deref()
    }

    /// Work-group tile `(width, height)`.
    pub fn workgroup(&self) -> (u32, u32) {
        self.workgroup
    }

    /// Backends to search for devices.
    pub fn backends(&self) -> &[BackendChoice] {
        &self.backends
    }

    /// Profile for synthesised initial fields.
    pub fn profile(&self) -> InitialProfile {
        self.profile
    }

    /// Configuration file the options were merged with.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Grid shape implied by these options.
    pub fn grid_shape(&self) -> GridShape {
        GridShape::new(self.nx, self.ny, self.dx, self.dy)
    }
}

fn positive_count(flag: &str, value: Option<i64>, problems: &mut Vec<String>) -> usize {
    match value {
        None => {
            problems.push(format!("missing required option {}", flag));
            0
        }
        Some(v) if v <= 0 => {
            problems.push(format!("{} must be a positive integer (got {})", flag, v));
            0
        }
        Some(v) => match usize::try_from(v) {
            Ok(n) => n,
            Err(_) => {
                problems.push(format!("{} is too large (got {})", flag, v));
                0
            }
        },
    }
}

fn positive_length(flag: &str, value: Option<f32>, problems: &mut Vec<String>) -> f32 {
    match value {
        None => {
            problems.push(format!("missing required option {}", flag));
            0.0
        }
        Some(v) if !(v.is_finite() && v > 0.0) => {
            problems.push(format!("{} must be a positive length in meters (got {})", flag, v));
            0.0
        }
        Some(v) => v,
    }
}

fn optional_duration(flag: &str, value: Option<f64>, problems: &mut Vec<String>) -> Option<f64> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            problems.push(format!("{} must be a positive number of seconds (got {})", flag, v));
            None
        }
        other => other,
    }
}

fn or_unlimited(value: Option<f64>) -> String {
    value.map_or_else(|| "unlimited".to_string(), |v| format!("{} s", v))
}

fn or_none(value: Option<usize>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for ProgramOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "grid:          {} x {} cells, {} m x {} m (dx = {} m, dy = {} m)",
            self.nx, self.ny, self.width, self.height, self.dx, self.dy
        )?;
        writeln!(
            f,
            "sources:       bathymetry {}, water elevation {}, eta {}",
            or_none(self.bathymetry_no),
            or_none(self.water_elevation_no),
            or_none(self.eta_no)
        )?;
        writeln!(f, "profile:       {:?}", self.profile)?;
        writeln!(
            f,
            "duration:      {} simulated, {} wall clock",
            or_unlimited(self.duration),
            or_unlimited(self.wall_duration)
        )?;
        writeln!(f, "w_global:      {}", self.w_global)?;
        writeln!(f, "cpu:           {}", self.cpu)?;
        writeln!(
            f,
            "device:        platform {}, device {}, tile {}x{}",
            self.platform, self.device, self.workgroup.0, self.workgroup.1
        )?;
        write!(
            f,
            "output:        {}",
            self.output_file
                .as_deref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string())
        )
    }
}
