use super::mock::MockFrameSource;
use super::source::{CaptureParams, FrameSource};
use crate::config::CameraConfig;
use crate::error::{MotioncamError, Result};
use tracing::info;

/// Seconds between motion bursts of the simulated scene
pub const SIMULATED_MOTION_PERIOD_SECS: u64 = 30;

/// Builder selecting the frame source backend
pub struct FrameSourceBuilder {
    config: Option<CameraConfig>,
    simulate: bool,
}

impl FrameSourceBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            simulate: false,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a synthetic scene instead of a camera device
    pub fn simulate(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    /// Build the source. The device itself is not opened yet.
    pub fn build(self) -> Result<Box<dyn FrameSource>> {
        let config = self
            .config
            .ok_or_else(|| MotioncamError::system("Camera configuration must be specified"))?;
        let params = CaptureParams::from_config(&config);

        if self.simulate {
            info!(
                "Using simulated camera ({}x{} @ {}fps, motion every {}s)",
                params.width, params.height, params.fps, SIMULATED_MOTION_PERIOD_SECS
            );
            return Ok(Box::new(MockFrameSource::simulated(
                params,
                SIMULATED_MOTION_PERIOD_SECS,
            )));
        }

        build_device_source(&config)
    }
}

impl Default for FrameSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_device_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    info!("Using GStreamer camera /dev/video{}", config.index);
    Ok(Box::new(super::gst_source::GstCameraSource::new(config)))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_device_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    tracing::warn!(
        "Camera support not compiled in; rebuild with --features camera or use --simulate"
    );
    Err(MotioncamError::Camera(crate::error::CameraError::DeviceUnavailable {
        device: config.index,
        details: "camera backend not enabled in this build".to_string(),
    }))
}

/// Shorthand for `FrameSourceBuilder::new().config(..).simulate(..).build()`
pub fn open_camera(config: &CameraConfig, simulate: bool) -> Result<Box<dyn FrameSource>> {
    FrameSourceBuilder::new()
        .config(config.clone())
        .simulate(simulate)
        .build()
}
