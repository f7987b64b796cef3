//! # SWE wgpu
//!
//! Compute context for the shallow-water simulator on WebGPU (`wgpu`).
//!
//! Setup is fail-fast: every step returns a [`DeviceError`] naming the driver
//! call that failed and a numeric code, and the next step can only be reached
//! with the value produced by a successful previous one.
//!
//! ## Example
//!
//! ```ignore
//! use swe_wgpu::prelude::*;
//!
//! let build = BuildOptions::default();
//! let platforms = ComputeSetup::new(build.clone()).enumerate()?;
//! println!("{}", platforms.listing());
//!
//! let adapter = platforms.select(0, 0)?;
//! let context = SelectedDevice::open(adapter, &build)?
//!     .build_program(&KernelSource::builtin(), BUILTIN_ENTRY_POINTS)?;
//!
//! let eta = context.upload_field(init.eta(), "eta")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod context;
pub mod error;
pub mod memory;
pub mod shader;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{DeviceHandle, DeviceInfo, Platforms};
    pub use crate::context::{ComputeContext, ComputeSetup, SelectedDevice};
    pub use crate::error::{DeviceError, Result};
    pub use crate::memory::{FieldBuffer, GridParams};
    pub use crate::shader::{BuildOptions, KernelSource, BUILTIN_ENTRY_POINTS};
}

// Re-exports for convenience
pub use adapter::{DeviceHandle, DeviceInfo, Platforms};
pub use context::{checked, dispatch_size, ComputeContext, ComputeSetup, SelectedDevice};
pub use error::{DeviceError, Result};
pub use memory::{FieldBuffer, GridParams};
pub use shader::{BuildOptions, KernelSource, BUILTIN_ENTRY_POINTS};

/// Check whether any adapter with compute support exists on `backends`.
pub fn is_available(backends: wgpu::Backends) -> bool {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    });

    instance
        .enumerate_adapters(backends)
        .iter()
        .any(|adapter| adapter.supports_compute())
}
