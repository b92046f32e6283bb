use super::writer::{VideoWriter, WriterFactory, WriterParams};
use crate::config::VideoContainer;
use crate::error::RecordingError;
use crate::frame::FrameData;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSrc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Seconds to wait for the muxer to finish after end-of-stream
const FINALIZE_TIMEOUT_SECS: u64 = 30;

/// Opens GStreamer encoding pipelines for one container
#[derive(Debug, Clone, Copy)]
pub struct GstWriterFactory {
    container: VideoContainer,
    jpeg_quality: u8,
}

impl GstWriterFactory {
    /// H.264 in MP4 through x264enc
    pub fn mp4() -> Self {
        Self {
            container: VideoContainer::Mp4,
            jpeg_quality: 85,
        }
    }

    /// Motion JPEG in AVI through jpegenc
    pub fn mjpeg_avi(jpeg_quality: u8) -> Self {
        Self {
            container: VideoContainer::Avi,
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn container(&self) -> VideoContainer {
        self.container
    }
}

impl WriterFactory for GstWriterFactory {
    fn extension(&self) -> &'static str {
        self.container.extension()
    }

    fn create(
        &self,
        path: &Path,
        params: WriterParams,
    ) -> Result<Box<dyn VideoWriter>, RecordingError> {
        let description = pipeline_description(self.container, params, self.jpeg_quality);
        Ok(Box::new(GstWriter::create(path, params, &description)?))
    }
}

/// appsrc → encoder → muxer → filesink; the sink location is set after parsing
pub(crate) fn pipeline_description(
    container: VideoContainer,
    params: WriterParams,
    jpeg_quality: u8,
) -> String {
    let encode = match container {
        VideoContainer::Mp4 => format!(
            "video/x-raw,format=I420 ! \
             x264enc speed-preset=veryfast tune=zerolatency key-int-max={} ! \
             h264parse ! mp4mux faststart=true",
            params.fps * 2
        ),
        VideoContainer::Avi => format!(
            "video/x-raw,format=I420 ! jpegenc quality={} ! avimux",
            jpeg_quality
        ),
    };

    format!(
        "appsrc name=src format=time is-live=false \
         caps=video/x-raw,format=RGB,width={},height={},framerate={}/1 ! \
         videoconvert ! {} ! filesink name=sink",
        params.width, params.height, params.fps, encode
    )
}

pub struct GstWriter {
    path: PathBuf,
    params: WriterParams,
    pipeline: Pipeline,
    appsrc: AppSrc,
    frame_duration_ns: u64,
    frames: u64,
}

impl GstWriter {
    pub fn create(
        path: &Path,
        params: WriterParams,
        description: &str,
    ) -> Result<Self, RecordingError> {
        let open_error = |details: String| RecordingError::WriterOpen {
            path: path.to_path_buf(),
            details,
        };

        gstreamer::init()
            .map_err(|e| open_error(format!("Failed to initialize GStreamer: {}", e)))?;
        debug!("Writer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| open_error(format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| open_error("Failed to downcast to Pipeline".to_string()))?;

        let appsrc = pipeline
            .by_name("src")
            .ok_or_else(|| open_error("Failed to get appsrc element".to_string()))?
            .downcast::<AppSrc>()
            .map_err(|_| open_error("Failed to downcast to AppSrc".to_string()))?;
        appsrc.set_property("format", gstreamer::Format::Time);

        let filesink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_error("Failed to get filesink element".to_string()))?;
        filesink.set_property("location", path.to_string_lossy().to_string());

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(open_error(format!("Failed to start pipeline: {}", e)));
        }

        info!("Started encoding pipeline for {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            params,
            pipeline,
            appsrc,
            frame_duration_ns: 1_000_000_000 / params.fps.max(1) as u64,
            frames: 0,
        })
    }

    fn wait_for_eos(&self) -> Result<(), RecordingError> {
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| RecordingError::Finalization {
                path: self.path.clone(),
                details: "pipeline has no bus".to_string(),
            })?;

        for msg in bus.iter_timed(gstreamer::ClockTime::from_seconds(FINALIZE_TIMEOUT_SECS)) {
            match msg.view() {
                gstreamer::MessageView::Eos(..) => return Ok(()),
                gstreamer::MessageView::Error(err) => {
                    return Err(RecordingError::Finalization {
                        path: self.path.clone(),
                        details: format!(
                            "{} ({})",
                            err.error(),
                            err.debug().unwrap_or_default()
                        ),
                    })
                }
                _ => {}
            }
        }

        Err(RecordingError::Finalization {
            path: self.path.clone(),
            details: format!("no end-of-stream within {}s", FINALIZE_TIMEOUT_SECS),
        })
    }
}

impl VideoWriter for GstWriter {
    fn write_frame(&mut self, frame: &FrameData) -> Result<(), RecordingError> {
        let encode_error = |details: String| RecordingError::Encode {
            frame_id: frame.id,
            details,
        };

        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(encode_error(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width, frame.height, self.params.width, self.params.height
            )));
        }

        let rgb = frame.to_rgb_bytes().map_err(|e| encode_error(e.to_string()))?;
        let mut buffer = gstreamer::Buffer::from_mut_slice(rgb.to_vec());
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| encode_error("buffer not writable".to_string()))?;
            buffer_ref.set_pts(gstreamer::ClockTime::from_nseconds(
                self.frames * self.frame_duration_ns,
            ));
            buffer_ref.set_duration(gstreamer::ClockTime::from_nseconds(self.frame_duration_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| encode_error(format!("Failed to push buffer: {:?}", e)))?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(self: Box<Self>) -> Result<PathBuf, RecordingError> {
        let result = self
            .appsrc
            .end_of_stream()
            .map_err(|e| RecordingError::Finalization {
                path: self.path.clone(),
                details: format!("Failed to signal EOS: {:?}", e),
            })
            .and_then(|_| self.wait_for_eos());

        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop encoding pipeline: {}", e);
        }
        result?;

        info!(
            "Finalized {} ({} frames)",
            self.path.display(),
            self.frames
        );
        Ok(self.path)
    }
}
