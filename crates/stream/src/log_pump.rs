// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Forwards transcoder stderr into the log, one line per event.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Background task draining one subprocess's stderr.
///
/// Ends by itself at EOF. `cancel` stops it early when the session is torn down
/// before the pipe closes.
#[derive(Debug)]
pub struct StderrLogPump {
    cancel: CancellationToken,
    handle: JoinHandle<usize>,
}

impl StderrLogPump {
    pub fn spawn<R>(accessory: String, session_id: String, stderr: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut forwarded = 0usize;
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        tracing::debug!(accessory = %accessory, session_id = %session_id, "Stderr pump cancelled");
                        break;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            forwarded += 1;
                            tracing::debug!(accessory = %accessory, session_id = %session_id, "{line}");
                        },
                        Ok(None) => {
                            tracing::debug!(accessory = %accessory, session_id = %session_id, "Transcoder stderr closed");
                            break;
                        },
                        Err(e) => {
                            tracing::warn!(accessory = %accessory, session_id = %session_id, error = %e, "Failed to read transcoder stderr");
                            break;
                        },
                    },
                }
            }
            forwarded
        });

        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Token that cancels this pump; lets an owner observe cancellation after handing the pump off.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the task and returns how many lines it forwarded.
    pub async fn join(self) -> usize {
        self.handle.await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stderr pump task failed");
            0
        })
    }
}
