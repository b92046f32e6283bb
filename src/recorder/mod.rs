#[cfg(all(feature = "video_encoding", target_os = "linux"))]
mod gst_writer;
mod session;
mod writer;
#[cfg(test)]
pub(crate) mod tests;

#[cfg(all(feature = "video_encoding", target_os = "linux"))]
pub use gst_writer::{GstWriter, GstWriterFactory};
pub use session::{Recorder, RecordingOutcome, RecordingSession};
pub use writer::{writer_factory_for, VideoWriter, WriterFactory, WriterParams};
