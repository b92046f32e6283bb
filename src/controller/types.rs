use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Controller lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerState {
    /// Polling the detector
    Idle,
    /// Notification in flight
    Alerting,
    /// Recorder owns the frame source
    Recording,
    /// Pause after a recording
    Cooldown,
    /// Terminal; the frame source has been released
    Shutdown,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Idle => "Idle",
            ControllerState::Alerting => "Alerting",
            ControllerState::Recording => "Recording",
            ControllerState::Cooldown => "Cooldown",
            ControllerState::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Why the control loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// External stop request (signal name, or "cancelled")
    Signal(String),
    /// The frame source reported end of stream while idle
    StreamEnded,
    /// A non-recoverable frame source error
    Error(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal ({})", name),
            ShutdownReason::StreamEnded => f.write_str("stream ended"),
            ShutdownReason::Error(details) => write!(f, "error: {}", details),
        }
    }
}

/// Counters for one `run`
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: ShutdownReason,
    /// Frames read while idle
    pub polls: u64,
    pub read_errors: u64,
    pub analysis_errors: u64,
    pub motion_events: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub clips_saved: u64,
    pub recording_failures: u64,
    pub clips: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub(super) struct RunStats {
    pub polls: u64,
    pub read_errors: u64,
    pub analysis_errors: u64,
    pub motion_events: u64,
    pub notifications_sent: u64,
    pub notification_failures: u64,
    pub clips_saved: u64,
    pub recording_failures: u64,
    pub clips: Vec<PathBuf>,
}

impl RunStats {
    pub fn into_summary(self, reason: ShutdownReason) -> RunSummary {
        RunSummary {
            reason,
            polls: self.polls,
            read_errors: self.read_errors,
            analysis_errors: self.analysis_errors,
            motion_events: self.motion_events,
            notifications_sent: self.notifications_sent,
            notification_failures: self.notification_failures,
            clips_saved: self.clips_saved,
            recording_failures: self.recording_failures,
            clips: self.clips,
        }
    }
}
