mod builder;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst_source;
mod mock;
mod source;

pub use builder::{open_camera, FrameSourceBuilder, SIMULATED_MOTION_PERIOD_SECS};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst_source::GstCameraSource;
pub use mock::{AfterScript, MockFrameSource, MockSourceHandle, MockStep, SyntheticScene};
pub use source::{CaptureParams, FrameSource};
