// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HomeKit bridges, each on its own OS thread with a single-threaded event loop.
//!
//! Stopping a bridge stops every accessory's streams on that loop and then waits
//! for the thread with a bounded timeout. A thread that does not come back in
//! time is reported so the caller can restart the whole gateway instead of
//! leaking it.

use std::future::Future;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::future::join_all;
use hapcam_snapshot::SnapshotService;
use hapcam_stream::TranscoderSettings;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::accessory::CameraAccessory;
use crate::config::BridgeConfig;

/// How a bridge stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStop {
    Joined,
    TimedOut,
}

pub struct Bridge;

impl Bridge {
    /// Builds the bridge's accessories and starts its event loop thread.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread or its runtime cannot be created.
    pub fn spawn(
        config: &BridgeConfig,
        transcoder: &TranscoderSettings,
        snapshots: &Arc<SnapshotService>,
    ) -> std::io::Result<BridgeHandle> {
        let accessories: Vec<Arc<CameraAccessory>> = config
            .cameras
            .iter()
            .map(|camera| {
                Arc::new(CameraAccessory::new(camera.clone(), transcoder.clone(), snapshots.clone()))
            })
            .collect();

        let shutdown = CancellationToken::new();
        let (handle_tx, handle_rx) = mpsc::channel::<std::io::Result<Handle>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let name = config.name.clone();
        let token = shutdown.clone();
        let owned = accessories.clone();
        let thread = std::thread::Builder::new().name(format!("bridge-{name}")).spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = handle_tx.send(Err(e));
                    return;
                },
            };
            if handle_tx.send(Ok(runtime.handle().clone())).is_err() {
                return;
            }

            tracing::info!(bridge = %name, accessories = owned.len(), "Bridge running");
            runtime.block_on(async {
                token.cancelled().await;
                join_all(owned.iter().map(|accessory| accessory.stop())).await;
            });
            tracing::info!(bridge = %name, "Bridge stopped");
            let _ = done_tx.send(());
        })?;

        let runtime = handle_rx
            .recv()
            .map_err(|_| std::io::Error::other("bridge thread exited during startup"))??;

        Ok(BridgeHandle {
            name: config.name.clone(),
            accessories,
            runtime,
            shutdown,
            done: done_rx,
            thread: Some(thread),
        })
    }
}

/// Owner's side of a running bridge.
pub struct BridgeHandle {
    name: String,
    accessories: Vec<Arc<CameraAccessory>>,
    runtime: Handle,
    shutdown: CancellationToken,
    done: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl BridgeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessories(&self) -> &[Arc<CameraAccessory>] {
        &self.accessories
    }

    pub fn accessory(&self, camera_key: &str) -> Option<&Arc<CameraAccessory>> {
        self.accessories.iter().find(|a| a.key() == camera_key)
    }

    /// Runs a task on the bridge's event loop.
    pub fn run<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }

    /// Stops every accessory on the bridge loop, then waits up to `timeout` for the thread.
    pub fn stop(mut self, timeout: Duration) -> BridgeStop {
        tracing::info!(bridge = %self.name, "Stopping bridge");
        self.shutdown.cancel();

        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::error!(bridge = %self.name, "Bridge thread panicked");
                    }
                }
                BridgeStop::Joined
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    bridge = %self.name,
                    timeout_ms = timeout.as_millis(),
                    "Bridge thread did not stop in time"
                );
                BridgeStop::TimedOut
            },
        }
    }
}
