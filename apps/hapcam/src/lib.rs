// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod accessory;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod logging;
pub mod server;
pub mod telemetry;

// Re-export commonly used items for convenience
pub use accessory::CameraAccessory;
pub use bridge::{Bridge, BridgeHandle, BridgeStop};
pub use config::Config;
pub use server::ShutdownOutcome;
