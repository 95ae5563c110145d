// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;
use std::time::Duration;

use hapcam_core::DEFAULT_SNAPSHOT_WIDTH;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cameras")
}

fn default_placeholder() -> PathBuf {
    PathBuf::from("./assets/snapshot.jpg")
}

const fn default_debounce_ms() -> u64 {
    30_000
}

const fn default_transfer_timeout_ms() -> u64 {
    10_000
}

const fn default_failure_backoff_ms() -> u64 {
    3_000
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_queue_capacity() -> usize {
    256
}

const fn default_width() -> u32 {
    DEFAULT_SNAPSHOT_WIDTH
}

/// Snapshot pipeline configuration.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SnapshotSettings {
    /// Directory holding one `<camera>.jpg` per camera.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Image copied into every camera's slot at startup.
    #[serde(default = "default_placeholder")]
    pub placeholder: PathBuf,
    /// Minimum time between two fetches for the same camera.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound on one request plus body transfer.
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
    /// Pause after a failed fetch before taking the next request.
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Maximum number of distinct requests waiting at once.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Width requested when HomeKit does not ask for one.
    #[serde(default = "default_width")]
    pub default_width: u32,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            placeholder: default_placeholder(),
            debounce_ms: default_debounce_ms(),
            transfer_timeout_ms: default_transfer_timeout_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            default_width: default_width(),
        }
    }
}

impl SnapshotSettings {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub const fn failure_backoff(&self) -> Duration {
        Duration::from_millis(self.failure_backoff_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
