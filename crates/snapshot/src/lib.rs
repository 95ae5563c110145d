// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! HapCam Snapshot - still-image pipeline shared by all cameras.
//!
//! Bridges enqueue `(camera, width)` requests on a deduplicating queue; a single
//! fetcher thread drains it, debounces per camera, downloads the image from the
//! NVR and replaces the camera's file on disk. Reads are plain file reads.

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod queue;
pub mod service;
pub mod settings;

pub use cache::SnapshotCache;
pub use error::{FetchError, ServiceError};
pub use fetcher::{FetchOutcome, SnapshotFetcher};
pub use queue::{snapshot_queue, Enqueue, SnapshotReceiver, SnapshotRequest, SnapshotRequestQueue};
pub use service::SnapshotService;
pub use settings::SnapshotSettings;
