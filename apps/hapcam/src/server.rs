// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Gateway lifecycle: start the snapshot service and bridges, wait for a
//! shutdown signal, then tear everything down with bounded waits.

use std::sync::Arc;
use std::time::Duration;

use hapcam_core::CameraRuntimeConfig;
use hapcam_snapshot::SnapshotService;

use crate::bridge::{Bridge, BridgeHandle, BridgeStop};
use crate::config::Config;

/// Result of a gateway shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    /// One or more bridge threads did not stop in time; the process should
    /// exit and be restarted by its supervisor.
    RestartRequired { bridges: Vec<String> },
}

/// Starts every configured bridge against one shared snapshot service.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the snapshot service
/// cannot start, or a bridge thread cannot be spawned. Bridges already started
/// are stopped before returning.
pub fn start_bridges(config: &Config) -> anyhow::Result<(Arc<SnapshotService>, Vec<BridgeHandle>)> {
    config.validate()?;

    let cameras: Vec<CameraRuntimeConfig> = config.cameras().cloned().collect();
    let snapshots = Arc::new(SnapshotService::start(config.snapshots.clone(), &cameras)?);

    let mut handles = Vec::with_capacity(config.bridges.len());
    for bridge in &config.bridges {
        match Bridge::spawn(bridge, &config.transcoder, &snapshots) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                tracing::error!(bridge = %bridge.name, error = %e, "Failed to start bridge");
                stop_bridges(handles, config.shutdown.bridge_join_timeout());
                snapshots.shutdown(config.shutdown.bridge_join_timeout());
                return Err(e.into());
            },
        }
    }

    tracing::info!(bridges = handles.len(), cameras = cameras.len(), "Camera gateway started");
    Ok((snapshots, handles))
}

/// Stops every bridge, each with its own `timeout`.
///
/// A stuck bridge does not keep the others from stopping their transcoders.
/// Returns `RestartRequired` naming every bridge that timed out.
pub fn stop_bridges(handles: Vec<BridgeHandle>, timeout: Duration) -> ShutdownOutcome {
    let mut stuck = Vec::new();
    for handle in handles {
        let name = handle.name().to_string();
        if handle.stop(timeout) == BridgeStop::TimedOut {
            stuck.push(name);
        }
    }
    if stuck.is_empty() {
        ShutdownOutcome::Clean
    } else {
        ShutdownOutcome::RestartRequired { bridges: stuck }
    }
}

/// Runs the gateway until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if startup fails or the teardown task panics.
pub async fn run(config: Config) -> anyhow::Result<ShutdownOutcome> {
    let (snapshots, handles) = start_bridges(&config)?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping bridges");

    let timeout = config.shutdown.bridge_join_timeout();
    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = stop_bridges(handles, timeout);
        if !snapshots.shutdown(timeout) {
            tracing::warn!("Snapshot service did not stop cleanly");
        }
        outcome
    })
    .await?;

    if let ShutdownOutcome::RestartRequired { bridges } = &outcome {
        tracing::error!(bridges = ?bridges, "Bridges stuck during shutdown, restart required");
    } else {
        tracing::info!("Camera gateway stopped");
    }
    Ok(outcome)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
