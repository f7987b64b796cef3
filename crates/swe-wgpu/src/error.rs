//! Device and driver errors.
//!
//! Every variant is fatal for the run. Each one names the driver call that
//! failed and carries a stable numeric code so the binary can report
//! `'<call>' returned <code>` and terminate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`DeviceError`].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Failures while setting up the compute context.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No backend reported any adapter.
    #[error("No compute platforms found (searched {backends})")]
    NoPlatforms {
        /// Backends that were searched.
        backends: String,
    },

    /// The selected platform has no usable device.
    #[error("Platform {platform} ({name}) has no compute-capable devices")]
    NoDevices {
        /// Platform index.
        platform: usize,
        /// Platform name.
        name: String,
    },

    /// A platform or device index is out of range.
    #[error("Invalid {what} index {index} ({available} available)")]
    InvalidSelection {
        /// "platform" or "device".
        what: &'static str,
        /// Requested index.
        index: usize,
        /// Number of entries to choose from.
        available: usize,
    },

    /// The device is below the required capability floor.
    #[error("Device {device} is not supported: {reason}")]
    Unsupported {
        /// Device name.
        device: String,
        /// What is missing.
        reason: String,
    },

    /// Opening the logical device failed.
    #[error("Failed to open device {device}: {reason}")]
    RequestDevice {
        /// Device name.
        device: String,
        /// Driver message.
        reason: String,
    },

    /// The kernel source file could not be read.
    #[error("Failed to read kernel source {}: {source}", path.display())]
    KernelSource {
        /// Source path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The driver rejected a call (shader compile errors included).
    #[error("{call} failed: {description}")]
    Validation {
        /// Failing call.
        call: &'static str,
        /// Driver diagnostic.
        description: String,
    },

    /// The device ran out of memory.
    #[error("{call} failed: out of device memory")]
    OutOfMemory {
        /// Failing call.
        call: &'static str,
    },

    /// A kernel entry point was not built into the program.
    #[error("Kernel entry point '{0}' not found in program")]
    MissingKernel(String),

    /// A grid does not fit the 32-bit sizes and indices the device uses.
    #[error("Grid {shape} is too large for device buffers")]
    BufferSize {
        /// The offending grid shape.
        shape: String,
    },

    /// Reading a buffer back to the host failed.
    #[error("Transfer failed: {0}")]
    Transfer(String),
}

impl DeviceError {
    /// Name of the driver call that failed.
    pub fn call(&self) -> &'static str {
        match self {
            DeviceError::NoPlatforms { .. } => "enumerate_adapters",
            DeviceError::NoDevices { .. } | DeviceError::InvalidSelection { .. } => {
                "select_device"
            }
            DeviceError::Unsupported { .. } => "get_downlevel_capabilities",
            DeviceError::RequestDevice { .. } => "request_device",
            DeviceError::KernelSource { .. } => "load_kernel_source",
            DeviceError::Validation { call, .. } | DeviceError::OutOfMemory { call } => *call,
            DeviceError::MissingKernel(_) => "create_compute_pipeline",
            DeviceError::BufferSize { .. } => "create_buffer",
            DeviceError::Transfer(_) => "map_async",
        }
    }

    /// Stable numeric code of this failure.
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::NoPlatforms { .. } => -1001,
            DeviceError::NoDevices { .. } => -1,
            DeviceError::Unsupported { .. } => -2,
            DeviceError::OutOfMemory { .. } => -4,
            DeviceError::Transfer(_) => -5,
            DeviceError::RequestDevice { .. } => -6,
            DeviceError::Validation { .. } => -11,
            DeviceError::KernelSource { .. } => -30,
            DeviceError::InvalidSelection { .. } => -33,
            DeviceError::MissingKernel(_) => -46,
            DeviceError::BufferSize { .. } => -61,
        }
    }

    /// One-line diagnostic in the form `'<call>' returned <code>`.
    pub fn diagnostic(&self) -> String {
        format!("'{}' returned {}", self.call(), self.code())
    }

    pub(crate) fn from_wgpu(call: &'static str, err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => DeviceError::OutOfMemory { call },
            other => DeviceError::Validation {
                call,
                description: other.to_string(),
            },
        }
    }
}
