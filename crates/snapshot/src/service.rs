// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Process-wide snapshot service: cache, queue and the dedicated fetcher thread.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use hapcam_core::CameraRuntimeConfig;
use tokio_util::sync::CancellationToken;

use crate::cache::SnapshotCache;
use crate::error::ServiceError;
use crate::fetcher::SnapshotFetcher;
use crate::queue::{snapshot_queue, Enqueue, SnapshotRequest, SnapshotRequestQueue};
use crate::settings::SnapshotSettings;

/// Shared by every bridge. Requests are cheap and non-blocking; reads hit the
/// local file only.
#[derive(Debug)]
pub struct SnapshotService {
    queue: SnapshotRequestQueue,
    cache: SnapshotCache,
    default_width: u32,
    shutdown: CancellationToken,
    /// Fetcher thread and the channel it signals on once its loop has returned.
    thread: Mutex<Option<(JoinHandle<()>, mpsc::Receiver<()>)>>,
}

impl SnapshotService {
    /// Seeds every camera's snapshot file, then starts the fetcher thread.
    ///
    /// Only cameras with a snapshot endpoint are fetched; the others keep the
    /// placeholder.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError` if seeding fails, the HTTP client cannot be built,
    /// or the thread cannot be spawned.
    pub fn start(settings: SnapshotSettings, cameras: &[CameraRuntimeConfig]) -> Result<Self, ServiceError> {
        let cache = SnapshotCache::new(&settings.cache_dir, &settings.placeholder);
        cache.seed(cameras.iter().map(|c| c.key.as_str())).map_err(ServiceError::Seed)?;

        let endpoints: HashMap<_, _> = cameras
            .iter()
            .filter_map(|c| c.snapshot.clone().map(|endpoint| (c.key.clone(), endpoint)))
            .collect();

        let (queue, receiver) = snapshot_queue(settings.queue_capacity);
        let default_width = settings.default_width;
        let fetcher = SnapshotFetcher::new(endpoints, cache.clone(), settings).map_err(ServiceError::Client)?;

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("snapshot-fetcher".to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(runtime) => runtime.block_on(fetcher.run(receiver, token)),
                    Err(e) => tracing::error!(error = %e, "Failed to build snapshot fetcher runtime"),
                }
                let _ = done_tx.send(());
            })
            .map_err(ServiceError::Thread)?;

        Ok(Self { queue, cache, default_width, shutdown, thread: Mutex::new(Some((thread, done_rx))) })
    }

    /// Asks for a fresh image. `None` width means the configured default.
    pub fn request_snapshot(&self, camera_key: &str, width: Option<u32>) -> Enqueue {
        let width = width.unwrap_or(self.default_width);
        self.queue.put(SnapshotRequest::new(camera_key, width))
    }

    /// Latest image on disk for a camera (placeholder until the first fetch lands).
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the camera's file cannot be read.
    pub fn read_snapshot(&self, camera_key: &str) -> io::Result<Vec<u8>> {
        self.cache.read(camera_key)
    }

    pub const fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn queue(&self) -> &SnapshotRequestQueue {
        &self.queue
    }

    /// Stops the fetcher and waits up to `timeout` for its thread. Returns `true`
    /// if the thread was joined.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        let Some((thread, done)) = self.thread.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return true;
        };

        match done.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    tracing::error!("Snapshot fetcher thread panicked");
                }
                true
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout_ms = timeout.as_millis(), "Snapshot fetcher did not stop in time");
                false
            },
        }
    }
}

impl Drop for SnapshotService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
