//! Error types for cascade configuration and resource allocation.

use thiserror::Error;

use crate::params::{MAX_MAP_SIZE, MIN_MAP_SIZE};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OceanError {
    /// Map size is not a power of two inside the supported range
    #[error(
        "Invalid map resolution {0}: must be a power of two in {min}..={max}",
        min = MIN_MAP_SIZE,
        max = MAX_MAP_SIZE
    )]
    InvalidResolution(u32),

    #[error("At least one wave cascade must be configured")]
    NoCascades,

    #[error("Cascade index {index} out of range ({count} configured)")]
    CascadeIndex { index: usize, count: usize },

    /// `step` was called before a successful `configure`
    #[error("Cascade manager is not configured")]
    NotConfigured,

    #[error("Failed to reserve {bytes} bytes for {what}")]
    ResourceExhausted { what: &'static str, bytes: usize },

    #[error("Failed to find suitable GPU adapter")]
    NoAdapter,

    #[error("GPU device error: {0}")]
    Device(String),
}

impl OceanError {
    /// True for errors caused by the caller's configuration rather than the device.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            OceanError::InvalidResolution(_) | OceanError::NoCascades | OceanError::CascadeIndex { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OceanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = OceanError::InvalidResolution(300);
        assert!(err.to_string().contains("300"));
        assert!(err.is_configuration());

        let err = OceanError::ResourceExhausted {
            what: "spectrum",
            bytes: 64,
        };
        assert_eq!(err.to_string(), "Failed to reserve 64 bytes for spectrum");
        assert!(!err.is_configuration());
    }
}
