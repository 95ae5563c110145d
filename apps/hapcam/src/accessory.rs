// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Camera accessory: the surface the HomeKit layer calls into.
//!
//! One accessory per configured camera. Stream operations go to the camera's
//! [`StreamSessionController`]; snapshot operations go to the process-wide
//! [`SnapshotService`].

use std::io;
use std::sync::Arc;

use hapcam_core::{CameraRuntimeConfig, Resolution, SessionInfo, StreamConfig};
use hapcam_snapshot::SnapshotService;
use hapcam_stream::{StreamSessionController, TranscoderSettings};

pub struct CameraAccessory {
    camera: Arc<CameraRuntimeConfig>,
    streams: StreamSessionController,
    snapshots: Arc<SnapshotService>,
}

impl CameraAccessory {
    pub fn new(
        camera: CameraRuntimeConfig,
        transcoder: TranscoderSettings,
        snapshots: Arc<SnapshotService>,
    ) -> Self {
        let camera = Arc::new(camera);
        let streams = StreamSessionController::new(camera.clone(), transcoder);
        Self { camera, streams, snapshots }
    }

    pub fn key(&self) -> &str {
        &self.camera.key
    }

    pub fn name(&self) -> &str {
        self.camera.name()
    }

    /// Video modes to advertise to controllers.
    pub fn supported_resolutions(&self) -> Vec<Resolution> {
        self.camera.supported_resolutions()
    }

    pub const fn streams(&self) -> &StreamSessionController {
        &self.streams
    }

    pub async fn start_stream(&self, session: &SessionInfo, stream: &StreamConfig) -> bool {
        self.streams.start(session, stream).await
    }

    pub fn reconfigure_stream(&self, session: &SessionInfo, stream: &StreamConfig) -> bool {
        self.streams.reconfigure(session, stream)
    }

    pub async fn stop_stream(&self, session: &SessionInfo) {
        self.streams.stop(session).await;
    }

    /// Stops every stream this accessory is serving.
    pub async fn stop(&self) {
        tracing::info!(camera = %self.name(), "Stopping camera accessory");
        self.streams.stop_all().await;
    }

    /// Queues a refresh and returns the image currently on disk.
    ///
    /// The refresh lands asynchronously; this call returns the previous image
    /// (or the placeholder) immediately.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the camera's snapshot file cannot be read.
    pub fn get_snapshot(&self, width: Option<u32>) -> io::Result<Vec<u8>> {
        if self.camera.snapshot.is_some() {
            let outcome = self.snapshots.request_snapshot(&self.camera.key, width);
            tracing::trace!(camera = %self.camera.key, ?outcome, "Snapshot requested");
        }
        self.snapshots.read_snapshot(&self.camera.key)
    }
}
