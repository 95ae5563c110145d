// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types shared by the camera bridge crates.
//!
//! Component-specific failures (transcoder spawn, snapshot fetch) live next to the
//! component that produces them; this module holds the errors that cross crate
//! boundaries: configuration validation, slot accounting and plain I/O.

use thiserror::Error;

/// Main error type for camera configuration and shared bookkeeping.
#[derive(Debug, Error)]
pub enum HapCamError {
    /// Configuration or parameter validation error.
    ///
    /// Examples:
    /// - Empty camera key
    /// - Zero stream count or FPS bound
    /// - Two cameras sharing the same key
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stream slot index outside the camera's capacity, or no free slot left.
    #[error("Stream slot unavailable: {0}")]
    SlotUnavailable(String),

    /// I/O error (snapshot cache, placeholder image).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using `HapCamError`.
pub type Result<T> = std::result::Result<T, HapCamError>;

impl From<HapCamError> for String {
    fn from(err: HapCamError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HapCamError::Configuration("stream_count must be at least 1".to_string());
        assert_eq!(err.to_string(), "Configuration error: stream_count must be at least 1");

        let err = HapCamError::SlotUnavailable("all 2 slots in use".to_string());
        assert_eq!(err.to_string(), "Stream slot unavailable: all 2 slots in use");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "placeholder missing");
        let err: HapCamError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("placeholder missing"));
    }
}
