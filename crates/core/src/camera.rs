// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-camera runtime configuration.
//!
//! A [`CameraRuntimeConfig`] is resolved once at bridge startup (vendor metadata,
//! credentials and URLs already filled in) and is read-only afterwards. Fields
//! omitted from the configuration file fall back to the defaults below.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{HapCamError, Result};

/// Codec name that makes the transcoder pass the source video through untouched.
pub const PASSTHROUGH_CODEC: &str = "copy";

/// Snapshot width used when HomeKit does not ask for a specific one.
pub const DEFAULT_SNAPSHOT_WIDTH: u32 = 1380;

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "libopus".to_string()
}

fn default_video_map() -> String {
    "0:v:0".to_string()
}

fn default_audio_map() -> String {
    "0:a:0".to_string()
}

const fn default_max_width() -> u32 {
    1920
}

const fn default_max_height() -> u32 {
    1080
}

const fn default_max_fps() -> u32 {
    30
}

const fn default_video_packet_size() -> u32 {
    1316
}

const fn default_audio_packet_size() -> u32 {
    188
}

const fn default_stream_count() -> usize {
    3
}

fn default_width_param() -> String {
    "w".to_string()
}

/// Low-FPS modes offered only when the camera's FPS bound is higher.
const SLOW_RESOLUTIONS: [(u32, u32, u32); 2] = [(320, 180, 15), (320, 240, 15)];

const RESOLUTIONS: [(u32, u32); 12] = [
    (320, 180),
    (320, 240),
    (480, 270),
    (480, 360),
    (640, 360),
    (640, 480),
    (1024, 576),
    (1024, 768),
    (1280, 720),
    (1280, 960),
    (1920, 1080),
    (1600, 1200),
];

/// A video mode advertised to HomeKit controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// HTTP endpoint serving still images for one camera.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct SnapshotEndpoint {
    /// Base image URL on the NVR. May already carry a query string.
    pub url: String,
    /// HTTP Basic credentials.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Query parameter carrying the requested width (`w` or `width` depending on vendor).
    #[serde(default = "default_width_param")]
    pub width_param: String,
}

impl SnapshotEndpoint {
    /// Returns the image URL with the requested width appended as a query parameter.
    pub fn url_for_width(&self, width: u32) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}={width}", self.url, self.width_param)
    }
}

/// Immutable per-camera settings.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct CameraRuntimeConfig {
    /// Stable camera identity. Names the snapshot file, so it must be path-safe.
    pub key: String,
    /// Accessory name shown in HomeKit and used to tag transcoder logs.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Source the transcoder reads from (usually an RTSP URL on the NVR).
    pub stream_source: String,
    /// Force RTSP over TCP (`-rtsp_transport tcp`).
    #[serde(default)]
    pub force_tcp: bool,
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_video_map")]
    pub video_map: String,
    #[serde(default = "default_audio_map")]
    pub audio_map: String,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
    #[serde(default = "default_video_packet_size")]
    pub video_packet_size: u32,
    #[serde(default = "default_audio_packet_size")]
    pub audio_packet_size: u32,
    /// Maximum number of concurrent streams HomeKit may open.
    #[serde(default = "default_stream_count")]
    pub stream_count: usize,
    #[serde(default)]
    pub support_audio: bool,
    /// Extra transcoder flags placed ahead of the input (e.g. `-probesize 32`).
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Address SRTP packets are sent to when the controller does not supply one.
    #[serde(default)]
    pub stream_address: Option<String>,
    #[serde(default)]
    pub snapshot: Option<SnapshotEndpoint>,
    /// Device key of a doorbell linked to this camera.
    #[serde(default)]
    pub linked_doorbell: Option<u64>,
    /// Expose the camera's motion state as a motion sensor.
    #[serde(default)]
    pub motion_sensor: bool,
}

impl CameraRuntimeConfig {
    /// Builds a configuration with defaults for everything but identity and source.
    pub fn new(key: impl Into<String>, stream_source: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display_name: None,
            stream_source: stream_source.into(),
            force_tcp: false,
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            video_map: default_video_map(),
            audio_map: default_audio_map(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            max_fps: default_max_fps(),
            video_packet_size: default_video_packet_size(),
            audio_packet_size: default_audio_packet_size(),
            stream_count: default_stream_count(),
            support_audio: false,
            extra_args: Vec::new(),
            stream_address: None,
            snapshot: None,
            linked_doorbell: None,
            motion_sensor: false,
        }
    }

    /// Name used in logs and HomeKit; falls back to the camera key.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    pub fn is_passthrough(&self) -> bool {
        self.video_codec == PASSTHROUGH_CODEC
    }

    /// Video modes this camera can serve, slow modes first.
    pub fn supported_resolutions(&self) -> Vec<Resolution> {
        let slow = SLOW_RESOLUTIONS.iter().filter(|&&(w, h, fps)| {
            w <= self.max_width && h <= self.max_height && fps < self.max_fps
        });
        let standard = RESOLUTIONS
            .iter()
            .filter(|&&(w, h)| w <= self.max_width && h <= self.max_height)
            .map(|&(w, h)| (w, h, self.max_fps));

        slow.copied()
            .chain(standard)
            .map(|(width, height, fps)| Resolution { width, height, fps })
            .collect()
    }

    /// Checks the invariants the streaming and snapshot paths rely on.
    ///
    /// # Errors
    ///
    /// Returns `HapCamError::Configuration` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if !is_path_safe_key(&self.key) {
            return Err(HapCamError::Configuration(format!(
                "camera key '{}' must be non-empty and must not contain path separators",
                self.key
            )));
        }
        if self.stream_source.trim().is_empty() {
            return Err(HapCamError::Configuration(format!(
                "camera '{}' has no stream_source",
                self.key
            )));
        }
        if self.stream_count == 0 {
            return Err(HapCamError::Configuration(format!(
                "camera '{}': stream_count must be at least 1",
                self.key
            )));
        }
        if self.max_fps == 0 || self.max_width == 0 || self.max_height == 0 {
            return Err(HapCamError::Configuration(format!(
                "camera '{}': max_width, max_height and max_fps must be non-zero",
                self.key
            )));
        }
        if let Some(snapshot) = &self.snapshot {
            if snapshot.url.trim().is_empty() || snapshot.width_param.trim().is_empty() {
                return Err(HapCamError::Configuration(format!(
                    "camera '{}': snapshot url and width_param must be set",
                    self.key
                )));
            }
        }
        Ok(())
    }
}

fn is_path_safe_key(key: &str) -> bool {
    !key.trim().is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}

/// Validates every camera and rejects duplicate keys.
///
/// # Errors
///
/// Returns the first validation failure, or a configuration error naming the duplicated key.
pub fn validate_cameras<'a>(cameras: impl IntoIterator<Item = &'a CameraRuntimeConfig>) -> Result<()> {
    let mut seen = HashSet::new();
    for camera in cameras {
        camera.validate()?;
        if !seen.insert(camera.key.as_str()) {
            return Err(HapCamError::Configuration(format!(
                "camera key '{}' is used more than once",
                camera.key
            )));
        }
    }
    Ok(())
}
