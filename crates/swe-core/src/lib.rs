//! # SWE Core
//!
//! Host-side data model for a GPU-accelerated 2-D shallow-water simulator.
//!
//! This crate owns everything the solver kernels need from the host before the
//! first time step:
//!
//! - [`ProgramOptions`] - immutable, validated run parameters
//! - [`FieldInfo`] - a ghost-padded, reference-counted 2-D field of `f32`
//! - [`InitConditions`] - the six solver-ready initial fields
//! - [`FieldSource`] - the interface to external field readers
//!
//! ## Example
//!
//! ```ignore
//! use swe_core::prelude::*;
//!
//! let options = ProgramOptions::parse_from([
//!     "swe-gpu", "--nx", "100", "--ny", "100", "--width", "1000", "--height", "1000",
//! ])?;
//! let init = InitConditions::init(&options, &NoSource)?;
//! assert_eq!(init.dx(), 10.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod field;
pub mod init;
pub mod source;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BackendChoice, InitialProfile, OptionArgs, ProgramOptions};
    pub use crate::error::{ConfigError, ErrorKind, Result};
    pub use crate::field::{FieldInfo, FieldPtr, GridShape, GHOST_CELLS};
    pub use crate::init::{FieldKind, InitConditions, Provenance};
    pub use crate::source::{FieldSource, MemorySource, NoSource, SourceKind};
}

// Re-exports for convenience
pub use config::{BackendChoice, InitialProfile, ProgramOptions};
pub use error::{ConfigError, ErrorKind, Result};
pub use field::{FieldInfo, FieldPtr, GridShape, GHOST_CELLS};
pub use init::{FieldKind, InitConditions, Provenance};
pub use source::{FieldSource, MemorySource, NoSource, SourceKind};
