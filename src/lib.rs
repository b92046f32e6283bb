pub mod analyzer;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod frame;
pub mod logging;
pub mod notify;
pub mod recorder;
pub mod storage;

#[cfg(feature = "dashboard")]
pub mod dashboard;

pub use analyzer::{motion_score, MotionDetector, MotionReading};
pub use camera::{open_camera, CaptureParams, FrameSource, FrameSourceBuilder, MockFrameSource};
pub use config::MotioncamConfig;
pub use controller::{Controller, ControllerState, RunSummary, ShutdownReason};
pub use error::{MotioncamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, MotioncamEvent};
pub use frame::{FrameData, FrameFormat};
pub use notify::{notifier_from_config, LogNotifier, NotificationSink};
pub use recorder::{Recorder, RecordingOutcome, WriterFactory};
pub use storage::{ClipPath, Clock, StorageManager, SystemClock};

#[cfg(feature = "dashboard")]
pub use dashboard::{ClipLibrary, DashboardServer, DashboardServerBuilder};
