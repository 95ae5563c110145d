// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The snapshot fetch worker.
//!
//! One fetcher serves every camera. It owns the per-camera debounce state
//! outright, so nothing else touches it and it needs no lock. A failing camera
//! costs one backoff period and is then skipped past.

use std::collections::HashMap;
use std::time::Instant;

use futures::StreamExt;
use hapcam_core::SnapshotEndpoint;
use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::cache::SnapshotCache;
use crate::error::FetchError;
use crate::queue::{SnapshotReceiver, SnapshotRequest};
use crate::settings::SnapshotSettings;

/// Result of handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new image was written; carries its size in bytes.
    Fetched(u64),
    /// Skipped: the camera was fetched within the debounce window.
    Debounced,
}

pub struct SnapshotFetcher {
    client: reqwest::Client,
    endpoints: HashMap<String, SnapshotEndpoint>,
    cache: SnapshotCache,
    settings: SnapshotSettings,
    last_fetch: HashMap<String, Instant>,
    fetches: Counter<u64>,
}

impl SnapshotFetcher {
    /// Builds a fetcher over a fixed camera catalog.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the HTTP client cannot be built.
    pub fn new(
        endpoints: HashMap<String, SnapshotEndpoint>,
        cache: SnapshotCache,
        settings: SnapshotSettings,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().connect_timeout(settings.connect_timeout()).build()?;
        let fetches = global::meter("hapcam_snapshot")
            .u64_counter("snapshot.fetches")
            .with_description("Snapshot requests handled by the fetcher, by outcome")
            .build();

        Ok(Self { client, endpoints, cache, settings, last_fetch: HashMap::new(), fetches })
    }

    /// Handles one request: debounce check, then GET and atomic file replace.
    ///
    /// The debounce timestamp is taken before the request goes out, so a slow
    /// fetch is not retriggered while it is still in flight.
    ///
    /// # Errors
    ///
    /// Returns `FetchError` for unknown cameras, non-200 answers, transport or
    /// write errors, and transfers exceeding the timeout. The cached image is
    /// left untouched in every error case.
    pub async fn process(&mut self, request: &SnapshotRequest) -> Result<FetchOutcome, FetchError> {
        let endpoint = self
            .endpoints
            .get(&request.camera_key)
            .ok_or_else(|| FetchError::UnknownCamera(request.camera_key.clone()))?;

        let now = Instant::now();
        if let Some(last) = self.last_fetch.get(&request.camera_key) {
            if now.duration_since(*last) < self.settings.debounce() {
                return Ok(FetchOutcome::Debounced);
            }
        }
        self.last_fetch.insert(request.camera_key.clone(), now);

        let url = endpoint.url_for_width(request.width);
        let mut builder = self.client.get(&url);
        if let Some(username) = &endpoint.username {
            builder = builder.basic_auth(username, endpoint.password.as_ref());
        }

        tracing::debug!(camera = %request.camera_key, width = request.width, "Fetching snapshot");

        let timeout = self.settings.transfer_timeout();
        let result = match tokio::time::timeout(timeout, self.transfer(builder, &request.camera_key)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout.as_millis())),
        };

        if result.is_err() {
            let part = self.cache.partial_path_for(&request.camera_key);
            if let Err(e) = tokio::fs::remove_file(&part).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %part.display(), error = %e, "Failed to remove partial snapshot");
                }
            }
        }
        result.map(FetchOutcome::Fetched)
    }

    async fn transfer(&self, builder: reqwest::RequestBuilder, camera_key: &str) -> Result<u64, FetchError> {
        let response = builder.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }

        let part = self.cache.partial_path_for(camera_key);
        let mut file = tokio::fs::File::create(&part).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part, self.cache.path_for(camera_key)).await?;
        Ok(written)
    }

    /// Drains the queue until cancelled or every producer is gone.
    pub async fn run(mut self, mut requests: SnapshotReceiver, shutdown: CancellationToken) {
        tracing::info!(cameras = self.endpoints.len(), "Snapshot fetcher started");
        loop {
            let request = tokio::select! {
                () = shutdown.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            let attrs = |outcome: &'static str| {
                [KeyValue::new("camera", request.camera_key.clone()), KeyValue::new("outcome", outcome)]
            };

            match self.process(&request).await {
                Ok(FetchOutcome::Fetched(bytes)) => {
                    tracing::debug!(camera = %request.camera_key, bytes, "Snapshot updated");
                    self.fetches.add(1, &attrs("ok"));
                },
                Ok(FetchOutcome::Debounced) => {
                    tracing::trace!(camera = %request.camera_key, "Snapshot debounced");
                    self.fetches.add(1, &attrs("debounced"));
                },
                Err(e) => {
                    tracing::warn!(camera = %request.camera_key, width = request.width, error = %e, "Snapshot fetch failed");
                    self.fetches.add(1, &attrs(e.outcome()));
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(self.settings.failure_backoff()) => {},
                    }
                },
            }
        }
        tracing::info!("Snapshot fetcher stopped");
    }
}
