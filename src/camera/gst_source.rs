use super::source::{CaptureParams, FrameSource};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// V4L2 camera read through a GStreamer pipeline ending in an RGB appsink
pub struct GstCameraSource {
    device_index: u32,
    read_timeout: Duration,
    params: CaptureParams,
    pipeline: Option<Pipeline>,
    appsink: Option<AppSink>,
    /// First sample, pulled while reading back the negotiated caps
    pending: Option<gstreamer::Sample>,
    frame_counter: u64,
}

/// Width, height and rate described by negotiated raw video caps
pub(crate) fn negotiated_params(caps: &gstreamer::CapsRef) -> Result<CaptureParams, CameraError> {
    let info = VideoInfo::from_caps(caps).map_err(|e| CameraError::Configuration {
        details: format!("Failed to parse negotiated caps: {}", e),
    })?;
    let fps = info.fps();
    let rate = if fps.numer() > 0 && fps.denom() > 0 {
        (fps.numer() / fps.denom()).max(1) as u32
    } else {
        1
    };
    Ok(CaptureParams::new(info.width(), info.height(), rate))
}

impl GstCameraSource {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            device_index: config.index,
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
            params: CaptureParams::from_config(config),
            pipeline: None,
            appsink: None,
            pending: None,
            frame_counter: 0,
        }
    }

    /// Build GStreamer pipeline string; caps are filled in by `configure`
    fn build_pipeline_string(&self) -> String {
        format!(
            "v4l2src device=/dev/video{} ! \
             videoconvert ! videoscale ! videorate ! \
             capsfilter name=caps caps=video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=2 drop=true enable-last-sample=false",
            self.device_index
        )
    }

    fn unavailable(&self, details: String) -> CameraError {
        CameraError::DeviceUnavailable {
            device: self.device_index,
            details,
        }
    }

    fn stop_pipeline(&mut self) -> bool {
        self.appsink = None;
        self.pending = None;
        match self.pipeline.take() {
            Some(pipeline) => {
                if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                    warn!("Failed to stop camera pipeline cleanly: {}", e);
                }
                true
            }
            None => false,
        }
    }

    /// Fatal pipeline errors posted on the bus, such as an unplugged device
    fn pending_bus_error(&self) -> Option<String> {
        let bus = self.pipeline.as_ref()?.bus()?;
        let msg = bus.pop_filtered(&[gstreamer::MessageType::Error])?;
        match msg.view() {
            gstreamer::MessageView::Error(err) => Some(format!(
                "{} ({})",
                err.error(),
                err.debug().unwrap_or_default()
            )),
            _ => None,
        }
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<FrameData, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::FrameRead {
            details: "No buffer in sample".to_string(),
        })?;
        let caps = sample.caps().ok_or_else(|| CameraError::FrameRead {
            details: "No caps in sample".to_string(),
        })?;
        let video_info = VideoInfo::from_caps(caps).map_err(|e| CameraError::FrameRead {
            details: format!("Failed to get video info: {}", e),
        })?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        let map = buffer.map_readable().map_err(|e| CameraError::FrameRead {
            details: format!("Failed to map buffer: {}", e),
        })?;
        let bytes = map.as_slice();

        // RGB rows are padded to 4-byte boundaries when width * 3 is not
        let data = if stride == row_bytes {
            bytes.to_vec()
        } else {
            let mut packed = Vec::with_capacity(row_bytes * height as usize);
            for row in bytes.chunks(stride).take(height as usize) {
                packed.extend_from_slice(&row[..row_bytes.min(row.len())]);
            }
            packed
        };

        let frame_id = self.frame_counter;
        self.frame_counter += 1;
        trace!("Captured RGB frame {} ({}x{})", frame_id, width, height);

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            width,
            height,
            FrameFormat::Rgb24,
        ))
    }
}

#[async_trait]
impl FrameSource for GstCameraSource {
    async fn open(&mut self) -> Result<(), CameraError> {
        if self.pipeline.is_some() {
            debug!("Camera {} already open", self.device_index);
            return Ok(());
        }

        gstreamer::init()
            .map_err(|e| self.unavailable(format!("Failed to initialize GStreamer: {}", e)))?;

        let pipeline_desc = self.build_pipeline_string();
        info!("Creating GStreamer camera pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| self.unavailable(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| self.unavailable("Failed to downcast to Pipeline".to_string()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| self.unavailable("Failed to get appsink element".to_string()))?
            .downcast::<AppSink>()
            .map_err(|_| self.unavailable("Failed to downcast to AppSink".to_string()))?;

        // v4l2src opens the device node on the NULL -> READY transition
        if let Err(e) = pipeline.set_state(gstreamer::State::Ready) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(self.unavailable(format!("Device could not be opened: {}", e)));
        }

        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        info!("Camera /dev/video{} opened", self.device_index);
        Ok(())
    }

    async fn configure(&mut self, requested: CaptureParams) -> Result<CaptureParams, CameraError> {
        let pipeline = self.pipeline.as_ref().ok_or(CameraError::NotOpen)?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", requested.width as i32)
            .field("height", requested.height as i32)
            .field("framerate", gstreamer::Fraction::new(requested.fps as i32, 1))
            .build();

        let capsfilter = pipeline.by_name("caps").ok_or_else(|| CameraError::Configuration {
            details: "Failed to get capsfilter element".to_string(),
        })?;
        capsfilter.set_property("caps", &caps);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to start camera pipeline: {}", e),
            })?;

        let appsink = self.appsink.clone().ok_or(CameraError::NotOpen)?;
        let timeout = self.read_timeout;
        let first = tokio::task::spawn_blocking(move || {
            appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(
                timeout.as_millis() as u64,
            ))
        })
        .await
        .map_err(|e| CameraError::Configuration {
            details: format!("Caps read-back task failed: {}", e),
        })?;

        let effective = match first.as_ref().and_then(|sample| sample.caps()) {
            Some(caps) => negotiated_params(caps)?,
            None => {
                warn!(
                    "No frame within {:?}; assuming the requested caps were applied",
                    timeout
                );
                requested
            }
        };
        self.pending = first;
        self.params = effective;

        info!(
            "Camera configured: {}x{} @ {}fps",
            effective.width, effective.height, effective.fps
        );
        Ok(effective)
    }

    async fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        if let Some(sample) = self.pending.take() {
            return self.sample_to_frame(sample);
        }

        let appsink = self.appsink.clone().ok_or(CameraError::NotOpen)?;
        let timeout = self.read_timeout;

        let (sample, at_eos) = tokio::task::spawn_blocking(move || {
            let sample = appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(
                timeout.as_millis() as u64,
            ));
            let at_eos = appsink.is_eos();
            (sample, at_eos)
        })
        .await
        .map_err(|e| CameraError::FrameRead {
            details: format!("Frame pull task failed: {}", e),
        })?;

        match sample {
            Some(sample) => self.sample_to_frame(sample),
            None if at_eos => Err(CameraError::StreamEnded),
            None => {
                if let Some(details) = self.pending_bus_error() {
                    warn!("Camera pipeline reported an error: {}", details);
                    return Err(CameraError::StreamEnded);
                }
                Err(CameraError::CaptureTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn release(&mut self) {
        if self.stop_pipeline() {
            info!("Camera /dev/video{} released", self.device_index);
        }
    }

    fn is_open(&self) -> bool {
        self.pipeline.is_some()
    }

    fn params(&self) -> CaptureParams {
        self.params
    }

    fn describe(&self) -> String {
        format!(
            "/dev/video{} {}x{} @ {}fps",
            self.device_index, self.params.width, self.params.height, self.params.fps
        )
    }
}

impl Drop for GstCameraSource {
    fn drop(&mut self) {
        self.stop_pipeline();
    }
}
