// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use hapcam_core::HapCamError;
use thiserror::Error;

/// One snapshot fetch failed. The fetcher logs it, backs off and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("camera '{0}' has no snapshot endpoint")]
    UnknownCamera(String),

    /// Anything but `200 OK`.
    #[error("snapshot endpoint answered HTTP {0}")]
    Status(u16),

    #[error("snapshot request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("snapshot transfer exceeded {0}ms")]
    Timeout(u128),

    #[error("snapshot write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Short label for the `outcome` metric attribute.
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::UnknownCamera(_) => "unknown_camera",
            Self::Status(_) => "http_status",
            Self::Request(_) => "request_error",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io_error",
        }
    }
}

/// The snapshot service could not be brought up.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to seed snapshot cache: {0}")]
    Seed(#[source] HapCamError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to start snapshot fetcher thread: {0}")]
    Thread(#[source] std::io::Error),
}
