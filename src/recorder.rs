//! Recorder collaborator interface
//!
//! The platform-specific sampling engine lives behind this trait. The
//! coordinator only needs start/stop: `start` begins sampling and
//! hands back an opaque handle, `stop` ends sampling and returns the
//! raw trace plus capture metadata. How samples are captured is the
//! implementation's business.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a recorder implementation.
///
/// The coordinator never propagates these to callers; a failed start
/// or stop is logged and the affected session simply produces no
/// artifact.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("failed to open trace output: {0}")]
    Output(String),

    #[error("sampler failed to start: {0}")]
    Start(String),

    #[error("sampler failed to stop: {0}")]
    Stop(String),
}

/// Opaque token identifying one in-flight recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingHandle {
    token: u64,
}

impl RecordingHandle {
    pub fn new(token: u64) -> Self {
        RecordingHandle { token }
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Everything the sampler reports when a recording stops.
///
/// A zero-length `raw_trace` means the capture produced nothing
/// useful; the downstream transport is expected to discard such
/// artifacts, but the coordinator still builds and returns them with
/// whatever metadata it has.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub raw_trace: Vec<u8>,
    pub duration: Duration,
    pub environment: String,
    pub cpu_architecture: String,
}

/// Start/stop contract for the underlying sampling engine.
///
/// Implementations are expected to be fast and synchronous from the
/// coordinator's point of view; any internal asynchrony is their own.
pub trait Recorder: Send + Sync {
    /// Begin sampling. Called at most once per session.
    fn start(&self) -> Result<RecordingHandle, RecorderError>;

    /// End sampling for the given handle and return the capture.
    /// Called exactly once per successful `start`.
    fn stop(&self, handle: RecordingHandle) -> Result<Capture, RecorderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_round_trip() {
        let h = RecordingHandle::new(7);
        assert_eq!(h.token(), 7);
        assert_eq!(h, RecordingHandle::new(7));
    }

    #[test]
    fn test_error_display() {
        let e = RecorderError::Start("perf event unavailable".to_string());
        assert_eq!(e.to_string(), "sampler failed to start: perf event unavailable");
    }

    #[test]
    fn test_capture_serializes() {
        let cap = Capture {
            raw_trace: vec![1, 2, 3],
            duration: Duration::from_millis(250),
            environment: "production".to_string(),
            cpu_architecture: "aarch64".to_string(),
        };
        let json = serde_json::to_string(&cap).unwrap();
        assert!(json.contains("aarch64"));
        let back: Capture = serde_json::from_str(&json).unwrap();
        assert_eq!(back.raw_trace, vec![1, 2, 3]);
        assert_eq!(back.duration, Duration::from_millis(250));
    }
}
