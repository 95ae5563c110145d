// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HapCam Stream - transcoder-backed HomeKit stream sessions.
//!
//! ## Modules
//!
//! - [`command`]: Builds the transcoder argument vector from camera and negotiated parameters
//! - [`controller`]: [`StreamSessionController`], one per camera
//! - [`watchdog`]: Liveness polling and crash cleanup
//! - [`log_pump`]: Stderr forwarding into `tracing`
//! - [`process`]: Subprocess launch, PID probe and termination

pub mod command;
pub mod controller;
pub mod error;
pub mod log_pump;
pub mod metrics;
pub mod process;
pub mod session;
pub mod settings;
pub mod watchdog;

pub use command::{audio_args, build_transcoder_args, video_args};
pub use controller::StreamSessionController;
pub use error::{SpawnError, TerminateError};
pub use log_pump::StderrLogPump;
pub use process::{check_transcoder, TranscoderProcess};
pub use settings::TranscoderSettings;
pub use watchdog::{ProcessWatchdog, WatchState, WatchdogTask};
