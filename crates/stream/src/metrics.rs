// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use opentelemetry::metrics::{Counter, Gauge};
use opentelemetry::{global, KeyValue};

/// Stream session instruments, shared by a controller and its watchdogs.
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    camera: KeyValue,
    started: Counter<u64>,
    failed: Counter<u64>,
    crashed: Counter<u64>,
    active: Gauge<u64>,
}

impl StreamMetrics {
    pub fn new(camera_key: &str) -> Self {
        let meter = global::meter("hapcam_stream");
        Self {
            camera: KeyValue::new("camera", camera_key.to_string()),
            started: meter
                .u64_counter("stream.sessions.started")
                .with_description("Transcoder sessions launched")
                .build(),
            failed: meter
                .u64_counter("stream.sessions.failed")
                .with_description("Stream starts that did not produce a running transcoder")
                .build(),
            crashed: meter
                .u64_counter("stream.sessions.crashed")
                .with_description("Transcoders that exited without being stopped")
                .build(),
            active: meter
                .u64_gauge("stream.sessions.active")
                .with_description("Running transcoder sessions")
                .build(),
        }
    }

    pub fn record_started(&self) {
        self.started.add(1, std::slice::from_ref(&self.camera));
    }

    pub fn record_failed(&self) {
        self.failed.add(1, std::slice::from_ref(&self.camera));
    }

    pub fn record_crashed(&self) {
        self.crashed.add(1, std::slice::from_ref(&self.camera));
    }

    pub fn record_active(&self, count: usize) {
        self.active.record(count as u64, std::slice::from_ref(&self.camera));
    }
}
