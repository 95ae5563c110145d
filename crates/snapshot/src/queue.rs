// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Deduplicating snapshot request queue.
//!
//! Producers (bridge event loops) enqueue without blocking; the single fetcher
//! drains it. A pending set guards the channel: a `(camera, width)` pair that is
//! already queued and not yet taken is not queued again, so a burst of requests
//! for the same image collapses into one fetch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opentelemetry::metrics::Counter;
use opentelemetry::{global, KeyValue};
use tokio::sync::mpsc;

/// One unit of snapshot work. Both fields take part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotRequest {
    pub camera_key: String,
    pub width: u32,
}

impl SnapshotRequest {
    pub fn new(camera_key: impl Into<String>, width: u32) -> Self {
        Self { camera_key: camera_key.into(), width }
    }
}

/// What `put` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Queued,
    /// The same request is already waiting.
    AlreadyPending,
    /// The queue is full or its consumer is gone.
    Dropped,
}

type PendingSet = Arc<Mutex<HashSet<SnapshotRequest>>>;

fn lock(pending: &PendingSet) -> MutexGuard<'_, HashSet<SnapshotRequest>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer side. Cheap to clone; every bridge holds one.
#[derive(Debug, Clone)]
pub struct SnapshotRequestQueue {
    tx: mpsc::Sender<SnapshotRequest>,
    pending: PendingSet,
    enqueued: Counter<u64>,
    deduplicated: Counter<u64>,
}

/// Consumer side, owned by the fetcher.
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: mpsc::Receiver<SnapshotRequest>,
    pending: PendingSet,
}

/// Creates a queue holding at most `capacity` distinct pending requests.
pub fn snapshot_queue(capacity: usize) -> (SnapshotRequestQueue, SnapshotReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = PendingSet::default();
    let meter = global::meter("hapcam_snapshot");

    let queue = SnapshotRequestQueue {
        tx,
        pending: pending.clone(),
        enqueued: meter
            .u64_counter("snapshot.requests.enqueued")
            .with_description("Snapshot requests queued for fetching")
            .build(),
        deduplicated: meter
            .u64_counter("snapshot.requests.deduplicated")
            .with_description("Snapshot requests collapsed into one already pending")
            .build(),
    };
    (queue, SnapshotReceiver { rx, pending })
}

impl SnapshotRequestQueue {
    /// Enqueues a request unless the identical one is still pending. Never blocks.
    pub fn put(&self, request: SnapshotRequest) -> Enqueue {
        let attrs = [KeyValue::new("camera", request.camera_key.clone())];
        let mut pending = lock(&self.pending);
        if pending.contains(&request) {
            self.deduplicated.add(1, &attrs);
            return Enqueue::AlreadyPending;
        }

        match self.tx.try_send(request.clone()) {
            Ok(()) => {
                pending.insert(request);
                self.enqueued.add(1, &attrs);
                Enqueue::Queued
            },
            Err(e) => {
                tracing::warn!(
                    camera = %request.camera_key,
                    width = request.width,
                    error = %e,
                    "Dropping snapshot request"
                );
                Enqueue::Dropped
            },
        }
    }

    pub fn is_pending(&self, request: &SnapshotRequest) -> bool {
        lock(&self.pending).contains(request)
    }

    /// Number of requests waiting to be taken.
    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotReceiver {
    fn take(&self, request: SnapshotRequest) -> SnapshotRequest {
        lock(&self.pending).remove(&request);
        request
    }

    /// Waits for the next request. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<SnapshotRequest> {
        let request = self.rx.recv().await?;
        Some(self.take(request))
    }

    pub fn try_recv(&mut self) -> Option<SnapshotRequest> {
        let request = self.rx.try_recv().ok()?;
        Some(self.take(request))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_put_yields_single_item() {
        let (queue, mut rx) = snapshot_queue(8);
        let request = SnapshotRequest::new("porch", 640);

        assert_eq!(queue.put(request.clone()), Enqueue::Queued);
        assert_eq!(queue.put(request.clone()), Enqueue::AlreadyPending);
        assert!(queue.is_pending(&request));
        assert_eq!(queue.len(), 1);

        assert_eq!(rx.recv().await.unwrap(), request);
        assert!(rx.try_recv().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_width_is_part_of_identity() {
        let (queue, mut rx) = snapshot_queue(8);

        assert_eq!(queue.put(SnapshotRequest::new("porch", 640)), Enqueue::Queued);
        assert_eq!(queue.put(SnapshotRequest::new("porch", 1380)), Enqueue::Queued);
        assert_eq!(queue.put(SnapshotRequest::new("drive", 640)), Enqueue::Queued);
        assert_eq!(queue.len(), 3);

        let mut drained = Vec::new();
        while let Some(request) = rx.try_recv() {
            drained.push(request);
        }
        assert_eq!(drained.len(), 3);
    }

    #[tokio::test]
    async fn test_requeue_after_dequeue() {
        let (queue, mut rx) = snapshot_queue(8);
        let request = SnapshotRequest::new("porch", 640);

        queue.put(request.clone());
        rx.recv().await.unwrap();
        assert_eq!(queue.put(request), Enqueue::Queued);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_marking_pending() {
        let (queue, _rx) = snapshot_queue(1);

        assert_eq!(queue.put(SnapshotRequest::new("porch", 640)), Enqueue::Queued);
        let overflow = SnapshotRequest::new("drive", 640);
        assert_eq!(queue.put(overflow.clone()), Enqueue::Dropped);
        assert!(!queue.is_pending(&overflow));
    }

    #[tokio::test]
    async fn test_recv_ends_when_producers_drop() {
        let (queue, mut rx) = snapshot_queue(4);
        drop(queue);
        assert!(rx.recv().await.is_none());
    }
}
