// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_program() -> String {
    "ffmpeg".to_string()
}

const fn default_watch_interval_ms() -> u64 {
    5000
}

const fn default_terminate_grace_ms() -> u64 {
    2000
}

const fn default_startup_check_ms() -> u64 {
    0
}

const fn default_hide_banner() -> bool {
    true
}

/// Transcoder launch and supervision settings, shared by every camera.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct TranscoderSettings {
    /// Transcoder executable (name on `PATH` or absolute path).
    #[serde(default = "default_program")]
    pub program: String,
    /// How often a running session's process is probed.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// How long a stopped process may take to exit after SIGTERM before it is killed.
    #[serde(default = "default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,
    /// How long a fresh launch is watched for an immediate exit before it is
    /// reported as started. `0` only checks once, right after launch.
    #[serde(default = "default_startup_check_ms")]
    pub startup_check_ms: u64,
    /// Pass `-hide_banner -nostats` to keep stderr down to real diagnostics.
    #[serde(default = "default_hide_banner")]
    pub hide_banner: bool,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            watch_interval_ms: default_watch_interval_ms(),
            terminate_grace_ms: default_terminate_grace_ms(),
            startup_check_ms: default_startup_check_ms(),
            hide_banner: default_hide_banner(),
        }
    }
}

impl TranscoderSettings {
    pub const fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }

    pub const fn startup_check(&self) -> Duration {
        Duration::from_millis(self.startup_check_ms)
    }

    pub const fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }
}
