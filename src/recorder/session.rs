use super::writer::{WriterFactory, WriterParams};
use crate::camera::FrameSource;
use crate::error::{CameraError, RecordingError};
use crate::storage::ClipPath;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identity of one recording run
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub started_at: chrono::NaiveDateTime,
    pub path: PathBuf,
    pub duration: Duration,
}

/// What a finished recording produced
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    pub session: RecordingSession,
    pub path: PathBuf,
    pub filename: String,
    pub frames_written: u64,
    /// Frames read but not written (size mismatch or encode failure)
    pub frames_dropped: u64,
    pub read_failures: u64,
    pub elapsed: Duration,
    /// Stopped early by cancellation
    pub interrupted: bool,
}

/// Copies frames from a source into a clip for a fixed wall-clock duration
pub struct Recorder {
    factory: Arc<dyn WriterFactory>,
}

impl Recorder {
    pub fn new(factory: Arc<dyn WriterFactory>) -> Self {
        Self { factory }
    }

    /// Extension of the clips this recorder produces
    pub fn extension(&self) -> &'static str {
        self.factory.extension()
    }

    /// Record `duration` worth of frames from `source` into `clip`.
    ///
    /// Failed reads are skipped after waiting one frame interval. The writer
    /// is finalized whether the run completes, keeps failing, or is cancelled.
    pub async fn record(
        &self,
        source: &mut dyn FrameSource,
        clip: &ClipPath,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<RecordingOutcome, RecordingError> {
        let params = WriterParams::from(source.params());
        let frame_interval = source.params().frame_interval();
        let session = RecordingSession {
            id: Uuid::new_v4(),
            started_at: clip.created_at,
            path: clip.path.clone(),
            duration,
        };

        let mut writer = self.factory.create(&clip.path, params)?;
        info!(
            "Recording session {} started: {} ({}x{} @ {}fps, {:?})",
            session.id,
            clip.path.display(),
            params.width,
            params.height,
            params.fps,
            duration
        );

        let start = Instant::now();
        let mut frames_dropped = 0u64;
        let mut read_failures = 0u64;
        let mut interrupted = false;

        while start.elapsed() < duration {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                read = source.read_frame() => read,
            };

            match read {
                Ok(frame) => {
                    if frame.dimensions() != (params.width, params.height) {
                        debug!(
                            "Dropping frame {}: {}x{} does not match {}x{}",
                            frame.id, frame.width, frame.height, params.width, params.height
                        );
                        frames_dropped += 1;
                        continue;
                    }
                    if let Err(e) = writer.write_frame(&frame) {
                        warn!("Session {}: {}", session.id, e);
                        frames_dropped += 1;
                    }
                }
                Err(e) => {
                    read_failures += 1;
                    log_read_failure(&session, &e, read_failures);

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            interrupted = true;
                            break;
                        }
                        _ = tokio::time::sleep(frame_interval) => {}
                    }
                }
            }
        }

        let elapsed = start.elapsed();
        let frames_written = writer.frames_written();
        let path = writer.finish()?;

        if interrupted {
            info!(
                "Recording session {} interrupted after {:?}: {} frames saved to {}",
                session.id,
                elapsed,
                frames_written,
                path.display()
            );
        } else {
            info!(
                "Recording session {} complete: {} frames, {} dropped, {} read failures",
                session.id, frames_written, frames_dropped, read_failures
            );
        }

        Ok(RecordingOutcome {
            session,
            path,
            filename: clip.filename.clone(),
            frames_written,
            frames_dropped,
            read_failures,
            elapsed,
            interrupted,
        })
    }
}

fn log_read_failure(session: &RecordingSession, error: &CameraError, count: u64) {
    // Warn on the first failure and every 10th after that
    if count == 1 || count % 10 == 0 {
        warn!(
            "Session {}: frame read failed ({} so far): {}",
            session.id, count, error
        );
    } else {
        debug!("Session {}: frame read failed: {}", session.id, error);
    }
}
