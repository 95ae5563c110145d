// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Stream parameters negotiated with a HomeKit controller.
//!
//! These arrive from the HAP transport layer once a controller has set up the
//! endpoints and selected a codec profile. They are plain data: the stream
//! controller only reads them to build the transcoder argument vector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// H.264 profile requested by the controller.
///
/// HomeKit encodes the profile as a small integer; the ordering is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoProfile {
    Baseline,
    Main,
    High,
}

impl VideoProfile {
    /// Decodes the controller's profile id. Ids beyond `2` are not defined.
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Baseline),
            1 => Some(Self::Main),
            2 => Some(Self::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Main => "main",
            Self::High => "high",
        }
    }
}

impl fmt::Display for VideoProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SRTP output leg (video or audio).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrtpLeg {
    pub ssrc: u32,
    pub port: u16,
    /// Base64 master key + salt, passed verbatim to `-srtp_out_params`.
    pub srtp_key: String,
    /// Negotiated ceiling in kbit/s.
    pub max_bitrate: u32,
}

/// Audio leg plus its negotiated sample rate (kHz).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioLeg {
    #[serde(flatten)]
    pub srtp: SrtpLeg,
    pub sample_rate: u32,
}

/// Everything a controller negotiated for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Controller address the RTP packets are sent to.
    pub address: String,
    pub video_profile_id: u8,
    pub video: SrtpLeg,
    /// Absent when the controller did not set up an audio leg.
    #[serde(default)]
    pub audio: Option<AudioLeg>,
}

/// Identity of a negotiated stream session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    /// Stream slot the controller was given for this session.
    pub stream_idx: usize,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, stream_idx: usize) -> Self {
        Self { id: id.into(), stream_idx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_profile_mapping() {
        assert_eq!(VideoProfile::from_id(0), Some(VideoProfile::Baseline));
        assert_eq!(VideoProfile::from_id(1), Some(VideoProfile::Main));
        assert_eq!(VideoProfile::from_id(2), Some(VideoProfile::High));
        assert_eq!(VideoProfile::from_id(3), None);
        assert_eq!(VideoProfile::Main.to_string(), "main");
    }
}
