// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HapCam Core - shared data model for the HomeKit camera bridge.
//!
//! ## Core Modules
//!
//! - [`camera`]: Per-camera runtime configuration and advertised video modes
//! - [`types`]: Stream parameters negotiated with a HomeKit controller
//! - [`slots`]: Concurrent-stream slot accounting
//! - [`error`]: Error types and handling

pub mod camera;
pub mod error;
pub mod slots;
pub mod types;

pub use camera::{
    validate_cameras, CameraRuntimeConfig, Resolution, SnapshotEndpoint, DEFAULT_SNAPSHOT_WIDTH,
    PASSTHROUGH_CODEC,
};
pub use error::HapCamError;
pub use slots::StreamSlots;
pub use types::{AudioLeg, SessionInfo, SrtpLeg, StreamConfig, VideoProfile};
