use crate::camera::CaptureParams;
use crate::config::RecordingConfig;
use crate::error::RecordingError;
use crate::frame::FrameData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Geometry and rate a writer is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl From<CaptureParams> for WriterParams {
    fn from(params: CaptureParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            fps: params.fps.max(1),
        }
    }
}

/// Sink for the frames of one clip
pub trait VideoWriter: Send {
    fn write_frame(&mut self, frame: &FrameData) -> Result<(), RecordingError>;

    fn frames_written(&self) -> u64;

    /// Flush and close the container, returning the final path
    fn finish(self: Box<Self>) -> Result<PathBuf, RecordingError>;
}

/// Opens writers for a particular container
pub trait WriterFactory: Send + Sync {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn create(
        &self,
        path: &Path,
        params: WriterParams,
    ) -> Result<Box<dyn VideoWriter>, RecordingError>;
}

/// Pick the writer for the configured container
#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub fn writer_factory_for(
    config: &RecordingConfig,
) -> Result<Arc<dyn WriterFactory>, RecordingError> {
    use super::gst_writer::GstWriterFactory;
    use crate::config::VideoContainer;
    use tracing::info;

    let factory = match config.container {
        VideoContainer::Mp4 => {
            info!("Recording H.264/MP4 clips through GStreamer");
            GstWriterFactory::mp4()
        }
        VideoContainer::Avi => {
            info!(
                "Recording MJPEG/AVI clips through GStreamer (quality {})",
                config.jpeg_quality
            );
            GstWriterFactory::mjpeg_avi(config.jpeg_quality)
        }
    };
    Ok(Arc::new(factory))
}

#[cfg(not(all(feature = "video_encoding", target_os = "linux")))]
pub fn writer_factory_for(
    config: &RecordingConfig,
) -> Result<Arc<dyn WriterFactory>, RecordingError> {
    tracing::warn!("Video encoding not compiled in; rebuild with --features video_encoding");
    Err(RecordingError::EncoderUnavailable {
        container: config.container.extension().to_string(),
        details: "GStreamer encoding not enabled in this build".to_string(),
    })
}
