use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::time::Duration;

/// Capture parameters requested from, or reported by, a frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureParams {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            width: config.resolution.0,
            height: config.resolution.1,
            fps: config.fps,
        }
    }

    /// Nominal time between two frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000u64 / self.fps.max(1) as u64)
    }
}

/// A camera-like producer of frames.
///
/// Implementations hold the device exclusively between `open` and `release`.
/// `configure` is best-effort: the returned parameters are the ones actually
/// in effect and may differ from the request.
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the device
    async fn open(&mut self) -> Result<(), CameraError>;

    /// Request capture parameters, returning the effective ones
    async fn configure(&mut self, requested: CaptureParams) -> Result<CaptureParams, CameraError>;

    /// Block until the next frame is available
    async fn read_frame(&mut self) -> Result<FrameData, CameraError>;

    /// Release the device. Safe to call any number of times.
    async fn release(&mut self);

    fn is_open(&self) -> bool;

    /// Parameters currently in effect
    fn params(&self) -> CaptureParams;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}
