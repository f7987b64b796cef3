//! Kernel sources and build options.
//!
//! Kernels are written in WGSL. Tile sizes are not preprocessor macros: the
//! host prepends a generated prelude declaring typed constants that the
//! kernel uses in its `@workgroup_size` attribute.
//!
//! ```text
//! const WGNX: u32 = 16u;
//! const WGNY: u32 = 16u;
//! ```

use std::borrow::Cow;
use std::path::Path;

use swe_core::{BackendChoice, ProgramOptions};

use crate::error::{DeviceError, Result};

/// WGSL unit bundled with the crate.
const BUILTIN_KERNEL: &str = include_str!("../kernels/fields.wgsl");

/// Entry points defined by the bundled kernel.
pub const BUILTIN_ENTRY_POINTS: &[&str] = &["total_depth", "surface_deviation"];

/// Options fixed at program-build time.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Work-group tile width (`WGNX`).
    pub workgroup_width: u32,
    /// Work-group tile height (`WGNY`).
    pub workgroup_height: u32,
    /// Lowest acceptable shader model.
    pub min_shader_model: wgpu::ShaderModel,
    /// Backends searched for devices.
    pub backends: wgpu::Backends,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            workgroup_width: 16,
            workgroup_height: 16,
            min_shader_model: wgpu::ShaderModel::Sm5,
            backends: wgpu::Backends::all(),
        }
    }
}

impl BuildOptions {
    /// Build options for a validated option snapshot.
    pub fn from_options(options: &ProgramOptions) -> Self {
        let (workgroup_width, workgroup_height) = options.workgroup();
        Self {
            workgroup_width,
            workgroup_height,
            backends: backend_mask(options.backends()),
            ..Self::default()
        }
    }

    /// Generated WGSL declarations for the build-time constants.
    pub fn prelude(&self) -> String {
        format!(
            "const WGNX: u32 = {}u;\nconst WGNY: u32 = {}u;\n",
            self.workgroup_width, self.workgroup_height
        )
    }

    /// Invocations per work group.
    pub fn invocations(&self) -> u32 {
        self.workgroup_width.saturating_mul(self.workgroup_height)
    }

    /// Check the tile against device limits, describing the first violation.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> std::result::Result<(), String> {
        if self.workgroup_width > limits.max_compute_workgroup_size_x {
            return Err(format!(
                "work-group width {} exceeds device limit {}",
                self.workgroup_width, limits.max_compute_workgroup_size_x
            ));
        }
        if self.workgroup_height > limits.max_compute_workgroup_size_y {
            return Err(format!(
                "work-group height {} exceeds device limit {}",
                self.workgroup_height, limits.max_compute_workgroup_size_y
            ));
        }
        if self.invocations() > limits.max_compute_invocations_per_workgroup {
            return Err(format!(
                "{} invocations per work group exceed device limit {}",
                self.invocations(),
                limits.max_compute_invocations_per_workgroup
            ));
        }
        Ok(())
    }

    /// Check a device's shader model against the floor.
    pub fn check_shader_model(&self, model: wgpu::ShaderModel) -> std::result::Result<(), String> {
        if shader_model_rank(model) < shader_model_rank(self.min_shader_model) {
            return Err(format!(
                "shader model {:?} is below the required {:?}",
                model, self.min_shader_model
            ));
        }
        Ok(())
    }
}

fn shader_model_rank(model: wgpu::ShaderModel) -> u8 {
    match model {
        wgpu::ShaderModel::Sm2 => 2,
        wgpu::ShaderModel::Sm4 => 4,
        wgpu::ShaderModel::Sm5 => 5,
    }
}

/// Union of the requested backends.
pub fn backend_mask(choices: &[BackendChoice]) -> wgpu::Backends {
    if choices.is_empty() {
        return wgpu::Backends::all();
    }

    choices
        .iter()
        .fold(wgpu::Backends::empty(), |mask, choice| {
            mask | match choice {
                BackendChoice::All => wgpu::Backends::all(),
                BackendChoice::Primary => wgpu::Backends::PRIMARY,
                BackendChoice::Vulkan => wgpu::Backends::VULKAN,
                BackendChoice::Metal => wgpu::Backends::METAL,
                BackendChoice::Dx12 => wgpu::Backends::DX12,
                BackendChoice::Gl => wgpu::Backends::GL,
            }
        })
}

/// One WGSL compilation unit.
#[derive(Debug, Clone)]
pub struct KernelSource {
    name: String,
    text: Cow<'static, str>,
}

impl KernelSource {
    /// The kernel bundled with this crate.
    pub fn builtin() -> Self {
        Self {
            name: "fields.wgsl".to_string(),
            text: Cow::Borrowed(BUILTIN_KERNEL),
        }
    }

    /// Read a kernel from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            let err = DeviceError::KernelSource {
                path: path.to_path_buf(),
                source,
            };
            tracing::error!("{}: {}", err.diagnostic(), err);
            err
        })?;

        tracing::debug!("Loaded kernel source {} ({} bytes)", path.display(), text.len());

        Ok(Self {
            name: path.display().to_string(),
            text: Cow::Owned(text),
        })
    }

    /// Kernel from an in-memory string.
    pub fn from_wgsl(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Cow::Owned(text.into()),
        }
    }

    /// Label used for the shader module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source text without the prelude.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Full source handed to the compiler.
    pub fn with_prelude(&self, options: &BuildOptions) -> String {
        let mut source = options.prelude();
        source.push('\n');
        source.push_str(&self.text);
        source
    }
}
