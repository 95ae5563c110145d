// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Live stream sessions and the table they are registered in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hapcam_core::SessionInfo;
use tokio::sync::Mutex;

use crate::log_pump::StderrLogPump;
use crate::process::TranscoderProcess;
use crate::watchdog::WatchdogTask;

/// One negotiated stream and the transcoder serving it.
///
/// A session is only registered once its process is running, so every entry
/// in a [`SessionTable`] has a process to poll.
#[derive(Debug)]
pub struct StreamSession {
    pub info: SessionInfo,
    pub process: TranscoderProcess,
    pub log_pump: Option<StderrLogPump>,
    pub watchdog: Option<WatchdogTask>,
    pub started_at: Instant,
}

impl StreamSession {
    pub fn new(info: SessionInfo, process: TranscoderProcess, log_pump: StderrLogPump) -> Self {
        Self { info, process, log_pump: Some(log_pump), watchdog: None, started_at: Instant::now() }
    }

    pub const fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Cancels the watchdog and log pump, if still attached.
    pub fn detach_tasks(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.cancel();
        }
        if let Some(pump) = self.log_pump.take() {
            pump.cancel();
        }
    }
}

/// Sessions of one camera, keyed by session id.
pub type SessionTable = Arc<Mutex<HashMap<String, StreamSession>>>;

pub fn new_session_table() -> SessionTable {
    Arc::new(Mutex::new(HashMap::new()))
}
