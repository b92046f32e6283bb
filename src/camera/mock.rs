use super::source::{CaptureParams, FrameSource};
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, trace};

/// One scripted outcome of `read_frame`
#[derive(Debug, Clone)]
pub enum MockStep {
    Frame(FrameData),
    Timeout,
    ReadFailure(String),
}

/// What the mock produces once its script runs out
#[derive(Debug, Clone)]
pub enum AfterScript {
    /// Report `StreamEnded` on every further read
    End,
    /// Keep returning the last scripted frame
    RepeatLast,
    /// Render frames from a synthetic scene
    Synthetic(SyntheticScene),
}

/// Static background with a bright block that moves during periodic bursts
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Length of one cycle in frames
    pub period_frames: u64,
    /// Frames at the start of each cycle in which the block is visible
    pub active_frames: u64,
}

impl SyntheticScene {
    pub fn new(period_frames: u64, active_frames: u64) -> Self {
        Self {
            period_frames: period_frames.max(1),
            active_frames: active_frames.min(period_frames),
        }
    }

    pub fn render(&self, id: u64, params: CaptureParams) -> FrameData {
        let (width, height) = (params.width.max(1), params.height.max(1));
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        let phase = id % self.period_frames;
        let block_w = (width / 4).max(1);
        let block_h = (height / 3).max(1);
        let travel = width.saturating_sub(block_w).max(1);
        let block_x = ((phase * 7) % travel as u64) as u32;
        let block_y = height / 3;
        let block_visible = phase < self.active_frames;

        for y in 0..height {
            for x in 0..width {
                let inside = block_visible
                    && x >= block_x
                    && x < block_x + block_w
                    && y >= block_y
                    && y < block_y + block_h;
                let value = if inside {
                    230
                } else {
                    40 + ((x + y) % 64) as u8
                };
                data.extend_from_slice(&[value, value, value.saturating_add(10)]);
            }
        }

        FrameData::new(id, SystemTime::now(), data, width, height, FrameFormat::Rgb24)
    }
}

#[derive(Debug, Default)]
struct MockCounters {
    opens: AtomicUsize,
    releases: AtomicUsize,
    reads: AtomicUsize,
    failed_reads: AtomicUsize,
    open: AtomicBool,
}

/// Shared view of a mock source's activity, usable after the source is moved
#[derive(Debug, Clone)]
pub struct MockSourceHandle {
    counters: Arc<MockCounters>,
}

impl MockSourceHandle {
    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::Relaxed)
    }

    /// Releases that actually closed an open device
    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> usize {
        self.counters.reads.load(Ordering::Relaxed)
    }

    pub fn failed_reads(&self) -> usize {
        self.counters.failed_reads.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        self.counters.open.load(Ordering::Relaxed)
    }
}

/// Scripted frame source for tests and camera-less runs.
///
/// Each read waits one frame interval on the tokio clock, so paused-time
/// tests see realistic pacing without real delays.
pub struct MockFrameSource {
    params: CaptureParams,
    max_resolution: Option<(u32, u32)>,
    script: VecDeque<MockStep>,
    after: AfterScript,
    last_frame: Option<FrameData>,
    unavailable: bool,
    paced: bool,
    is_open: bool,
    next_id: u64,
    counters: Arc<MockCounters>,
}

impl MockFrameSource {
    pub fn new(params: CaptureParams) -> Self {
        Self {
            params,
            max_resolution: None,
            script: VecDeque::new(),
            after: AfterScript::End,
            last_frame: None,
            unavailable: false,
            paced: true,
            is_open: false,
            next_id: 0,
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Endless synthetic scene with a motion burst every `period` seconds
    pub fn simulated(params: CaptureParams, period_seconds: u64) -> Self {
        let fps = params.fps.max(1) as u64;
        let scene = SyntheticScene::new(period_seconds.max(1) * fps, fps);
        Self::new(params).then(AfterScript::Synthetic(scene))
    }

    /// A source whose `open` always fails
    pub fn unavailable(params: CaptureParams) -> Self {
        let mut source = Self::new(params);
        source.unavailable = true;
        source
    }

    pub fn with_steps<I: IntoIterator<Item = MockStep>>(mut self, steps: I) -> Self {
        self.script.extend(steps);
        self
    }

    pub fn with_frames<I: IntoIterator<Item = FrameData>>(self, frames: I) -> Self {
        self.with_steps(frames.into_iter().map(MockStep::Frame))
    }

    pub fn then(mut self, after: AfterScript) -> Self {
        self.after = after;
        self
    }

    /// Emulate a driver that cannot exceed the given resolution
    pub fn with_max_resolution(mut self, width: u32, height: u32) -> Self {
        self.max_resolution = Some((width, height));
        self
    }

    /// Return reads immediately instead of waiting one frame interval
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn handle(&self) -> MockSourceHandle {
        MockSourceHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    fn stamp(&mut self, frame: FrameData) -> FrameData {
        let id = self.next_id;
        self.next_id += 1;
        FrameData {
            id,
            timestamp: SystemTime::now(),
            ..frame
        }
    }

    fn fail(&self, error: CameraError) -> Result<FrameData, CameraError> {
        self.counters.failed_reads.fetch_add(1, Ordering::Relaxed);
        Err(error)
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn open(&mut self) -> Result<(), CameraError> {
        if self.unavailable {
            return Err(CameraError::DeviceUnavailable {
                device: 0,
                details: "mock device configured as unavailable".to_string(),
            });
        }

        self.is_open = true;
        self.counters.open.store(true, Ordering::Relaxed);
        self.counters.opens.fetch_add(1, Ordering::Relaxed);
        info!("Mock frame source opened ({} scripted steps)", self.script.len());
        Ok(())
    }

    async fn configure(&mut self, requested: CaptureParams) -> Result<CaptureParams, CameraError> {
        let mut effective = requested;
        if let Some((max_w, max_h)) = self.max_resolution {
            effective.width = effective.width.min(max_w);
            effective.height = effective.height.min(max_h);
        }
        self.params = effective;
        debug!("Mock frame source configured: {:?}", effective);
        Ok(effective)
    }

    async fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        if !self.is_open {
            return Err(CameraError::NotOpen);
        }

        if self.paced {
            tokio::time::sleep(self.params.frame_interval()).await;
        }
        self.counters.reads.fetch_add(1, Ordering::Relaxed);

        match self.script.pop_front() {
            Some(MockStep::Frame(frame)) => {
                let frame = self.stamp(frame);
                self.last_frame = Some(frame.clone());
                trace!("Mock frame {} delivered", frame.id);
                Ok(frame)
            }
            Some(MockStep::Timeout) => self.fail(CameraError::CaptureTimeout {
                timeout_ms: self.params.frame_interval().as_millis() as u64,
            }),
            Some(MockStep::ReadFailure(details)) => self.fail(CameraError::FrameRead { details }),
            None => match &self.after {
                AfterScript::End => self.fail(CameraError::StreamEnded),
                AfterScript::RepeatLast => match self.last_frame.clone() {
                    Some(frame) => Ok(self.stamp(frame)),
                    None => self.fail(CameraError::StreamEnded),
                },
                AfterScript::Synthetic(scene) => {
                    let frame = scene.render(self.next_id, self.params);
                    Ok(self.stamp(frame))
                }
            },
        }
    }

    async fn release(&mut self) {
        if self.is_open {
            self.is_open = false;
            self.counters.open.store(false, Ordering::Relaxed);
            self.counters.releases.fetch_add(1, Ordering::Relaxed);
            info!("Mock frame source released");
        } else {
            debug!("Mock frame source already released");
        }
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn params(&self) -> CaptureParams {
        self.params
    }

    fn describe(&self) -> String {
        format!(
            "mock source {}x{} @ {}fps",
            self.params.width, self.params.height, self.params.fps
        )
    }
}
