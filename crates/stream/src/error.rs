// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use thiserror::Error;

/// The transcoder could not be launched.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcoder started without a stderr pipe")]
    MissingStderr,

    /// The child exited before its PID could be read.
    #[error("transcoder exited before reporting a PID")]
    MissingPid,

    #[error("'{program} -version' failed: {reason}")]
    VersionCheck { program: String, reason: String },
}

/// A termination attempt failed. Always logged and swallowed by the caller.
#[derive(Debug, Error)]
pub enum TerminateError {
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("pid {pid} still running after {grace_ms}ms")]
    GraceExpired { pid: u32, grace_ms: u128 },

    #[error("failed to kill pid {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_program() {
        let err = SpawnError::Spawn {
            program: "/opt/ffmpeg".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to launch '/opt/ffmpeg': no such file");
    }
}
