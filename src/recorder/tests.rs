use super::*;
use crate::camera::{AfterScript, CaptureParams, FrameSource, MockFrameSource, MockStep};
use crate::config::{RecordingConfig, VideoContainer};
use crate::error::RecordingError;
use crate::frame::FrameData;
use crate::storage::ClipPath;
use chrono::NaiveDate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Writes packed RGB frames back to back so paused-clock tests need no encoder
#[derive(Debug, Default)]
pub(crate) struct RawWriterFactory {
    finishes: Arc<AtomicUsize>,
    fail_finish: bool,
}

impl RawWriterFactory {
    pub(crate) fn failing_finish() -> Self {
        Self {
            fail_finish: true,
            ..Self::default()
        }
    }

    /// Writers finalized so far, successful or not
    pub(crate) fn finishes(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }
}

impl WriterFactory for RawWriterFactory {
    fn extension(&self) -> &'static str {
        "raw"
    }

    fn create(
        &self,
        path: &Path,
        params: WriterParams,
    ) -> Result<Box<dyn VideoWriter>, RecordingError> {
        let file = File::create(path).map_err(|e| RecordingError::WriterOpen {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        Ok(Box::new(RawWriter {
            path: path.to_path_buf(),
            params,
            file: BufWriter::new(file),
            frames: 0,
            finishes: Arc::clone(&self.finishes),
            fail_finish: self.fail_finish,
        }))
    }
}

struct RawWriter {
    path: PathBuf,
    params: WriterParams,
    file: BufWriter<File>,
    frames: u64,
    finishes: Arc<AtomicUsize>,
    fail_finish: bool,
}

impl VideoWriter for RawWriter {
    fn write_frame(&mut self, frame: &FrameData) -> Result<(), RecordingError> {
        let encode_error = |details: String| RecordingError::Encode {
            frame_id: frame.id,
            details,
        };
        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(encode_error("wrong frame size".to_string()));
        }
        let rgb = frame.to_rgb_bytes().map_err(|e| encode_error(e.to_string()))?;
        self.file
            .write_all(&rgb)
            .map_err(|e| encode_error(e.to_string()))?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> Result<PathBuf, RecordingError> {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        let finalization = |details: String| RecordingError::Finalization {
            path: self.path.clone(),
            details,
        };
        if self.fail_finish {
            return Err(finalization("disk full".to_string()));
        }
        self.file.flush().map_err(|e| finalization(e.to_string()))?;
        Ok(self.path)
    }
}

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;
const FPS: u32 = 10;

fn params() -> CaptureParams {
    CaptureParams::new(WIDTH, HEIGHT, FPS)
}

fn frame(shade: u8) -> FrameData {
    FrameData::solid_rgb(0, WIDTH, HEIGHT, [shade, shade, shade])
}

fn clip_in(dir: &Path, name: &str) -> ClipPath {
    let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    ClipPath {
        path: dir.join(name),
        filename: name.to_string(),
        date,
        created_at: date.and_hms_opt(12, 0, 0).unwrap(),
    }
}

fn create_test_recorder() -> (Recorder, Arc<RawWriterFactory>) {
    let factory = Arc::new(RawWriterFactory::default());
    (Recorder::new(factory.clone()), factory)
}

/// Bytes one packed RGB test frame occupies
const FRAME_BYTES: u64 = (WIDTH * HEIGHT * 3) as u64;

async fn open_source(source: MockFrameSource) -> MockFrameSource {
    let mut source = source;
    source.open().await.unwrap();
    source
}

#[tokio::test(start_paused = true)]
async fn test_records_for_requested_duration() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "motion_detected_12-00-00.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_frames(vec![frame(10)])
            .then(AfterScript::RepeatLast),
    )
    .await;

    let (recorder, _) = create_test_recorder();
    let outcome = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let interval = params().frame_interval();
    assert!(outcome.elapsed >= Duration::from_secs(1));
    assert!(outcome.elapsed <= Duration::from_secs(1) + interval);
    assert_eq!(outcome.frames_written, 10);
    assert_eq!(outcome.frames_dropped, 0);
    assert!(!outcome.interrupted);
    assert_eq!(outcome.filename, "motion_detected_12-00-00.raw");
    assert!(outcome.path.exists());
    assert!(source.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_failed_reads_do_not_end_session_early() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "clip.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_steps(vec![
                MockStep::Frame(frame(20)),
                MockStep::ReadFailure("glitch".to_string()),
                MockStep::Timeout,
                MockStep::ReadFailure("glitch".to_string()),
                MockStep::Frame(frame(30)),
            ])
            .then(AfterScript::RepeatLast),
    )
    .await;

    let (recorder, _) = create_test_recorder();
    let outcome = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_secs(2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.read_failures, 3);
    assert!(outcome.elapsed >= Duration::from_secs(2));
    assert!(outcome.frames_written > 10);
    assert!(!outcome.interrupted);
}

#[tokio::test(start_paused = true)]
async fn test_dead_source_still_produces_finalized_clip() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "clip.raw");
    let mut source = open_source(MockFrameSource::new(params())).await;
    let (recorder, factory) = create_test_recorder();

    let outcome = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.frames_written, 0);
    assert!(outcome.read_failures > 0);
    assert!(outcome.elapsed >= Duration::from_secs(1));
    assert_eq!(factory.finishes(), 1);
    assert_eq!(std::fs::metadata(&outcome.path).unwrap().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_finalizes_writer() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "clip.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_frames(vec![frame(40)])
            .then(AfterScript::RepeatLast),
    )
    .await;
    let (recorder, factory) = create_test_recorder();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });

    let outcome = recorder
        .record(&mut source, &clip, Duration::from_secs(10), &cancel)
        .await
        .unwrap();

    assert!(outcome.interrupted);
    assert!(outcome.elapsed < Duration::from_secs(1));
    assert_eq!(outcome.frames_written, 3);
    assert_eq!(factory.finishes(), 1);
    assert_eq!(
        std::fs::metadata(&outcome.path).unwrap().len(),
        3 * FRAME_BYTES
    );
}

#[tokio::test(start_paused = true)]
async fn test_finalization_failure_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "clip.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_frames(vec![frame(60)])
            .then(AfterScript::RepeatLast),
    )
    .await;
    let factory = Arc::new(RawWriterFactory::failing_finish());
    let recorder = Recorder::new(factory.clone());

    let result = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_millis(300),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RecordingError::Finalization { .. })));
    assert_eq!(factory.finishes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_writer_open_failure_reads_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(&temp_dir.path().join("missing"), "clip.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_frames(vec![frame(70)])
            .then(AfterScript::RepeatLast),
    )
    .await;
    let handle = source.handle();
    let (recorder, factory) = create_test_recorder();

    let result = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(RecordingError::WriterOpen { .. })));
    assert_eq!(handle.reads(), 0);
    assert_eq!(factory.finishes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_frames_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let clip = clip_in(temp_dir.path(), "clip.raw");
    let mut source = open_source(
        MockFrameSource::new(params())
            .with_frames(vec![
                frame(1),
                FrameData::solid_rgb(0, 4, 4, [1, 1, 1]),
                frame(2),
                FrameData::solid_rgb(0, 16, 12, [1, 1, 1]),
            ])
            .then(AfterScript::RepeatLast),
    )
    .await;

    let (recorder, _) = create_test_recorder();
    let outcome = recorder
        .record(
            &mut source,
            &clip,
            Duration::from_millis(400),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.frames_written, 2);
    assert_eq!(outcome.frames_dropped, 2);
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
#[test]
fn test_writer_factory_selection() {
    let mut config = RecordingConfig {
        duration_seconds: 10,
        container: VideoContainer::Mp4,
        jpeg_quality: 85,
    };
    assert_eq!(writer_factory_for(&config).unwrap().extension(), "mp4");

    config.container = VideoContainer::Avi;
    let recorder = Recorder::new(writer_factory_for(&config).unwrap());
    assert_eq!(recorder.extension(), "avi");
}

#[cfg(not(all(feature = "video_encoding", target_os = "linux")))]
#[test]
fn test_writer_factory_requires_encoder() {
    let config = RecordingConfig {
        duration_seconds: 10,
        container: VideoContainer::Mp4,
        jpeg_quality: 85,
    };
    assert!(matches!(
        writer_factory_for(&config),
        Err(RecordingError::EncoderUnavailable { .. })
    ));
}

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
#[test]
fn test_encoding_pipelines_per_container() {
    use super::gst_writer::pipeline_description;

    let writer_params = WriterParams {
        width: 640,
        height: 480,
        fps: 15,
    };

    let mp4 = pipeline_description(VideoContainer::Mp4, writer_params, 85);
    assert!(mp4.starts_with("appsrc name=src"));
    assert!(mp4.contains("width=640,height=480,framerate=15/1"));
    assert!(mp4.contains("x264enc"));
    assert!(mp4.contains("key-int-max=30"));
    assert!(mp4.contains("mp4mux faststart=true"));
    assert!(mp4.ends_with("filesink name=sink"));
    assert!(!mp4.contains("jpegenc"));

    let avi = pipeline_description(VideoContainer::Avi, writer_params, 70);
    assert!(avi.contains("jpegenc quality=70 ! avimux"));
    assert!(!avi.contains("x264enc"));

    assert_eq!(GstWriterFactory::mjpeg_avi(0).container(), VideoContainer::Avi);
    assert_eq!(GstWriterFactory::mp4().extension(), "mp4");
}

#[test]
fn test_writer_params_from_capture() {
    let writer_params = WriterParams::from(CaptureParams::new(640, 480, 0));
    assert_eq!(writer_params.fps, 1);
    assert_eq!((writer_params.width, writer_params.height), (640, 480));
}
