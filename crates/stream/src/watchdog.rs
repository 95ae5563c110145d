// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Liveness supervision for transcoder sessions.
//!
//! A watchdog polls its session's process. When the process is found dead the
//! session is removed from the table, its log pump is cancelled and its stream
//! slot is handed back. Removal happens under the table lock, so whichever of
//! the watchdog and an explicit stop gets there first is the only one that
//! releases the slot.

use std::time::Duration;

use hapcam_core::StreamSlots;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::metrics::StreamMetrics;
use crate::session::SessionTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Watching,
    Ended,
}

#[derive(Debug)]
pub struct ProcessWatchdog {
    session_id: String,
    sessions: SessionTable,
    slots: StreamSlots,
    metrics: StreamMetrics,
    state: WatchState,
}

impl ProcessWatchdog {
    pub const fn new(
        session_id: String,
        sessions: SessionTable,
        slots: StreamSlots,
        metrics: StreamMetrics,
    ) -> Self {
        Self { session_id, sessions, slots, metrics, state: WatchState::Watching }
    }

    pub const fn state(&self) -> WatchState {
        self.state
    }

    /// Probes the session's process once.
    pub async fn poll(&mut self) -> WatchState {
        if self.state == WatchState::Ended {
            return WatchState::Ended;
        }

        let mut sessions = self.sessions.lock().await;
        let alive = match sessions.get_mut(&self.session_id) {
            Some(session) => session.process.is_alive(),
            // Stopped explicitly; the stop path owns the slot.
            None => {
                self.state = WatchState::Ended;
                return WatchState::Ended;
            },
        };
        if alive {
            return WatchState::Watching;
        }

        let Some(mut session) = sessions.remove(&self.session_id) else {
            self.state = WatchState::Ended;
            return WatchState::Ended;
        };
        let remaining = sessions.len();
        drop(sessions);

        tracing::warn!(
            session_id = %self.session_id,
            pid = session.pid(),
            stream_idx = session.info.stream_idx,
            "Transcoder exited unexpectedly, releasing stream slot"
        );

        session.detach_tasks();
        self.slots.release(session.info.stream_idx);
        self.metrics.record_crashed();
        self.metrics.record_active(remaining);

        self.state = WatchState::Ended;
        WatchState::Ended
    }
}

/// Periodic poll loop for one [`ProcessWatchdog`].
#[derive(Debug)]
pub struct WatchdogTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl WatchdogTask {
    pub fn spawn(mut watchdog: ProcessWatchdog, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {
                        if watchdog.poll().await == WatchState::Ended {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(session_id = %watchdog.session_id, "Watchdog stopped");
        });

        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
