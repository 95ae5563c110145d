// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Transcoder subprocess handle: launch, liveness probe and termination.

use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, ChildStderr, Command};

use crate::error::{SpawnError, TerminateError};

/// Non-destructive existence check (signal 0) on a PID.
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn pid_is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// One running transcoder. Dropping the handle kills the process.
#[derive(Debug)]
pub struct TranscoderProcess {
    child: Child,
    pid: u32,
}

impl TranscoderProcess {
    /// Launches `program` with stdout discarded and stderr piped.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the program cannot be executed or its PID/stderr
    /// cannot be obtained.
    pub fn spawn(program: &str, args: &[String]) -> Result<(Self, ChildStderr), SpawnError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpawnError::Spawn { program: program.to_string(), source })?;

        let pid = child.id().ok_or(SpawnError::MissingPid)?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingStderr)?;

        Ok((Self { child, pid }, stderr))
    }

    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Reaps the child if it has exited, then probes the PID.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = self.pid, %status, "Transcoder has exited");
                false
            },
            Ok(None) => pid_is_alive(self.pid),
            Err(e) => {
                tracing::debug!(pid = self.pid, error = %e, "try_wait failed, probing pid");
                pid_is_alive(self.pid)
            },
        }
    }

    /// Waits up to `timeout` for the process to exit. Returns `true` if it did.
    pub async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        matches!(tokio::time::timeout(timeout, self.child.wait()).await, Ok(Ok(_)))
    }

    /// Sends SIGTERM and waits up to `grace` for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns `TerminateError` if the signal cannot be delivered or the process
    /// outlives the grace period.
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), TerminateError> {
        let raw = i32::try_from(self.pid).map_err(|_| TerminateError::Signal {
            pid: self.pid,
            source: Errno::ESRCH,
        })?;
        kill(Pid::from_raw(raw), Signal::SIGTERM)
            .map_err(|source| TerminateError::Signal { pid: self.pid, source })?;

        if self.wait_for_exit(grace).await {
            Ok(())
        } else {
            Err(TerminateError::GraceExpired { pid: self.pid, grace_ms: grace.as_millis() })
        }
    }

    /// Sends SIGKILL and reaps the process.
    ///
    /// # Errors
    ///
    /// Returns `TerminateError::Kill` if the kill or the wait fails.
    pub async fn kill(&mut self) -> Result<(), TerminateError> {
        self.child.kill().await.map_err(|source| TerminateError::Kill { pid: self.pid, source })
    }
}

/// Runs `<program> -version` and returns the first line of its output.
///
/// # Errors
///
/// Returns `SpawnError` if the program cannot be run or exits unsuccessfully.
pub async fn check_transcoder(program: &str) -> Result<String, SpawnError> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| SpawnError::Spawn { program: program.to_string(), source })?;

    if !output.status.success() {
        return Err(SpawnError::VersionCheck {
            program: program.to_string(),
            reason: format!("exited with {}", output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("unknown").to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sh(script: &str) -> (TranscoderProcess, ChildStderr) {
        TranscoderProcess::spawn("sh", &["-c".to_string(), script.to_string()]).unwrap()
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = TranscoderProcess::spawn("/nonexistent/transcoder", &[]).unwrap_err();
        assert!(matches!(err, SpawnError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_exited_process_is_not_alive() {
        let (mut process, _stderr) = sh("exit 0");
        assert!(process.wait_for_exit(Duration::from_secs(5)).await);
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let (mut process, _stderr) = sh("sleep 30");
        assert!(process.is_alive());
        assert!(pid_is_alive(process.pid()));

        process.terminate(Duration::from_secs(5)).await.unwrap();
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn test_grace_expires_then_kill() {
        let (mut process, _stderr) = sh("trap '' TERM; sleep 30");
        // Give the shell time to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = process.terminate(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, TerminateError::GraceExpired { .. }));

        process.kill().await.unwrap();
        assert!(!process.is_alive());
    }

    #[tokio::test]
    async fn test_check_transcoder_missing() {
        assert!(check_transcoder("/nonexistent/transcoder").await.is_err());
    }
}
