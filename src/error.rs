use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotioncamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] DashboardError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl MotioncamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Frame source failures
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera device {device} unavailable: {details}")]
    DeviceUnavailable { device: u32, details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Timed out waiting for a frame after {timeout_ms}ms")]
    CaptureTimeout { timeout_ms: u64 },

    #[error("Frame read failed: {details}")]
    FrameRead { details: String },

    #[error("Camera stream ended")]
    StreamEnded,

    #[error("Camera is not open")]
    NotOpen,
}

impl CameraError {
    /// Per-frame failures that the pipeline absorbs and retries
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CameraError::CaptureTimeout { .. } | CameraError::FrameRead { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Frame conversion failed: {details}")]
    FrameConversion { details: String },

    #[error("Frame dimensions differ: {previous:?} vs {current:?}")]
    DimensionMismatch {
        previous: (u32, u32),
        current: (u32, u32),
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Storage IO failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to open video writer for {}: {details}", path.display())]
    WriterOpen { path: PathBuf, details: String },

    #[error("Failed to encode frame {frame_id}: {details}")]
    Encode { frame_id: u64, details: String },

    #[error("Failed to finalize {}: {details}", path.display())]
    Finalization { path: PathBuf, details: String },

    #[error("No encoder available for {container} clips: {details}")]
    EncoderUnavailable { container: String, details: String },
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification delivery failed: {details}")]
    Delivery { details: String },

    #[error("Notification rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

/// Clip browser failures
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Dashboard server failed: {details}")]
    Server { details: String },

    #[error("Invalid path component '{component}'")]
    InvalidComponent { component: String },

    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Clip {} is empty", path.display())]
    EmptyClip { path: PathBuf },

    #[error("Unsupported clip type: {name}")]
    UnsupportedType { name: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MotioncamError>;
