//! Error types for the swe-gpu CLI.

use std::process::ExitCode;

use swe_core::{ConfigError, ErrorKind};
use swe_wgpu::DeviceError;
use thiserror::Error;

/// CLI result type alias.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error type.
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid options or initial data.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Device discovery, program build or transfer failure.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Device results disagree with the host.
    #[error("Device check failed: {0}")]
    Check(String),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Configuration problems exit with 2 like other usage errors; device
    /// failures exit with 1.
    pub fn exit_status(&self) -> u8 {
        match self {
            CliError::Config(e) if e.kind() == ErrorKind::Help => 0,
            CliError::Config(_) => 2,
            CliError::Device(_) | CliError::Check(_) => 1,
        }
    }

    /// Exit code for [`exit_status`](Self::exit_status).
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let config = CliError::from(ConfigError::InvalidArgument("--nx".to_string()));
        assert_eq!(config.exit_status(), 2);

        let help = CliError::from(ConfigError::Help("usage".to_string()));
        assert_eq!(help.exit_status(), 0);

        let device = CliError::from(DeviceError::NoPlatforms {
            backends: "all".to_string(),
        });
        assert_eq!(device.exit_status(), 1);
    }
}
