// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-camera stream session lifecycle.
//!
//! Each HomeKit stream session is served by its own transcoder process. The
//! controller launches it, attaches a watchdog and a stderr pump, and tears
//! everything down on stop. Failures never escape as errors: a failed start is
//! reported as `false`, and termination problems are logged and swallowed.

use std::sync::Arc;

use futures::future::join_all;
use hapcam_core::{CameraRuntimeConfig, SessionInfo, StreamConfig, StreamSlots};
use tokio::sync::Mutex;

use crate::command::build_transcoder_args;
use crate::log_pump::StderrLogPump;
use crate::metrics::StreamMetrics;
use crate::process::TranscoderProcess;
use crate::session::{new_session_table, SessionTable, StreamSession};
use crate::settings::TranscoderSettings;
use crate::watchdog::{ProcessWatchdog, WatchState, WatchdogTask};

pub struct StreamSessionController {
    camera: Arc<CameraRuntimeConfig>,
    settings: TranscoderSettings,
    slots: StreamSlots,
    sessions: SessionTable,
    last_command: Mutex<Option<Vec<String>>>,
    metrics: StreamMetrics,
}

impl StreamSessionController {
    pub fn new(camera: Arc<CameraRuntimeConfig>, settings: TranscoderSettings) -> Self {
        let slots = StreamSlots::new(camera.stream_count);
        let metrics = StreamMetrics::new(&camera.key);
        Self {
            camera,
            settings,
            slots,
            sessions: new_session_table(),
            last_command: Mutex::new(None),
            metrics,
        }
    }

    pub fn camera(&self) -> &CameraRuntimeConfig {
        &self.camera
    }

    /// Stream slot table; the HAP layer reads it to advertise availability.
    pub const fn slots(&self) -> &StreamSlots {
        &self.slots
    }

    /// Launches a transcoder for a negotiated session.
    ///
    /// Returns `true` once the process is running with its watchdog and log pump
    /// attached. Returns `false` if the slot is taken, the process cannot be
    /// launched, or it is already gone at the first liveness poll. With a
    /// non-zero `startup_check_ms` that poll happens only after the process has
    /// survived the check window.
    pub async fn start(&self, info: &SessionInfo, stream: &StreamConfig) -> bool {
        let camera = self.camera.name();

        if self.sessions.lock().await.contains_key(&info.id) {
            tracing::warn!(camera = %camera, session_id = %info.id, "Session already running, restarting it");
            self.stop(info).await;
        }

        if let Err(e) = self.slots.claim(info.stream_idx) {
            tracing::warn!(camera = %camera, session_id = %info.id, error = %e, "Cannot start stream");
            self.metrics.record_failed();
            return false;
        }

        let args = build_transcoder_args(&self.camera, stream, self.settings.hide_banner);
        tracing::debug!(camera = %camera, session_id = %info.id, command = ?args, "Transcoder command");
        *self.last_command.lock().await = Some(args.clone());

        let (mut process, stderr) = match TranscoderProcess::spawn(&self.settings.program, &args) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::error!(camera = %camera, session_id = %info.id, error = %e, "Failed to start transcoder");
                self.slots.release(info.stream_idx);
                self.metrics.record_failed();
                return false;
            },
        };

        let pid = process.pid();
        tracing::info!(
            camera = %camera,
            session_id = %info.id,
            stream_idx = info.stream_idx,
            pid,
            "Transcoder started"
        );

        let pump = StderrLogPump::spawn(camera.to_string(), info.id.clone(), stderr);
        let startup_check = self.settings.startup_check();
        if !startup_check.is_zero() && process.wait_for_exit(startup_check).await {
            tracing::debug!(camera = %camera, session_id = %info.id, pid, "Transcoder exited during startup check");
        }
        let active = {
            let mut sessions = self.sessions.lock().await;
            sessions.insert(info.id.clone(), StreamSession::new(info.clone(), process, pump));
            sessions.len()
        };
        self.metrics.record_started();
        self.metrics.record_active(active);

        let mut watchdog = ProcessWatchdog::new(
            info.id.clone(),
            self.sessions.clone(),
            self.slots.clone(),
            self.metrics.clone(),
        );
        if watchdog.poll().await == WatchState::Ended {
            tracing::warn!(camera = %camera, session_id = %info.id, pid, "Transcoder exited right after launch");
            return false;
        }

        let task = WatchdogTask::spawn(watchdog, self.settings.watch_interval());
        match self.sessions.lock().await.get_mut(&info.id) {
            Some(session) => session.watchdog = Some(task),
            None => task.cancel(),
        }
        true
    }

    /// Acknowledges a reconfiguration request without applying it.
    ///
    /// A running transcoder cannot change bitrate or resolution in place.
    pub fn reconfigure(&self, info: &SessionInfo, stream: &StreamConfig) -> bool {
        tracing::debug!(
            camera = %self.camera.name(),
            session_id = %info.id,
            video_max_bitrate = stream.video.max_bitrate,
            "Ignoring stream reconfiguration"
        );
        true
    }

    /// Stops a session. Unknown or already-stopped sessions are a no-op.
    pub async fn stop(&self, info: &SessionInfo) {
        let camera = self.camera.name();
        let (session, remaining) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.remove(&info.id);
            (session, sessions.len())
        };
        let Some(mut session) = session else {
            tracing::debug!(camera = %camera, session_id = %info.id, "No running transcoder for session");
            return;
        };

        session.detach_tasks();

        let pid = session.pid();
        if session.process.is_alive() {
            tracing::info!(camera = %camera, session_id = %info.id, pid, "Stopping transcoder");
            if let Err(e) = session.process.terminate(self.settings.terminate_grace()).await {
                tracing::warn!(camera = %camera, session_id = %info.id, error = %e, "Graceful stop failed, killing transcoder");
                if let Err(e) = session.process.kill().await {
                    tracing::error!(camera = %camera, session_id = %info.id, error = %e, "Failed to kill transcoder");
                }
            }
        } else {
            tracing::debug!(camera = %camera, session_id = %info.id, pid, "Transcoder already exited");
        }

        self.slots.release(session.info.stream_idx);
        self.metrics.record_active(remaining);
        tracing::debug!(
            camera = %camera,
            session_id = %info.id,
            uptime_secs = session.started_at.elapsed().as_secs(),
            "Stream session ended"
        );
    }

    /// Stops every session of this camera concurrently, so the total wait is
    /// bounded by one termination grace period rather than one per session.
    pub async fn stop_all(&self) {
        let sessions: Vec<SessionInfo> = self.active_sessions().await;
        join_all(sessions.iter().map(|info| self.stop(info))).await;
    }

    pub async fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.lock().await.values().map(|s| s.info.clone()).collect()
    }

    /// Argument vector of the most recent launch attempt.
    pub async fn last_command(&self) -> Option<Vec<String>> {
        self.last_command.lock().await.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hapcam_core::SrtpLeg;

    fn stream_config() -> StreamConfig {
        StreamConfig {
            address: "127.0.0.1".to_string(),
            video_profile_id: 1,
            video: SrtpLeg { ssrc: 1, port: 50000, srtp_key: "a2V5".to_string(), max_bitrate: 299 },
            audio: None,
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_returns_false() {
        let camera = Arc::new(CameraRuntimeConfig::new("porch", "rtsp://nvr/porch"));
        let settings =
            TranscoderSettings { program: "/nonexistent/ffmpeg".to_string(), ..TranscoderSettings::default() };
        let controller = StreamSessionController::new(camera, settings);
        let info = SessionInfo::new("s1", 0);

        assert!(!controller.start(&info, &stream_config()).await);
        assert!(controller.active_sessions().await.is_empty());
        assert!(controller.slots().is_available(0));
        assert!(controller.last_command().await.is_some());
    }

    #[tokio::test]
    async fn test_reconfigure_is_acknowledged() {
        let camera = Arc::new(CameraRuntimeConfig::new("porch", "rtsp://nvr/porch"));
        let controller = StreamSessionController::new(camera, TranscoderSettings::default());
        assert!(controller.reconfigure(&SessionInfo::new("s1", 0), &stream_config()));
        assert!(controller.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_unknown_session_is_noop() {
        let camera = Arc::new(CameraRuntimeConfig::new("porch", "rtsp://nvr/porch"));
        let controller = StreamSessionController::new(camera, TranscoderSettings::default());
        let info = SessionInfo::new("never-started", 2);

        controller.stop(&info).await;
        controller.stop(&info).await;
        assert_eq!(controller.slots().in_use(), 0);
    }
}
