use super::*;
use crate::camera::{AfterScript, CaptureParams, MockFrameSource, MockSourceHandle, MockStep};
use crate::config::MotioncamConfig;
use crate::error::{MotioncamError, NotificationError};
use crate::events::{EventBus, EventFilter, EventReceiver, MotioncamEvent};
use crate::frame::{FrameData, FrameFormat};
use crate::notify::{DeliveryReceipt, NotificationSink};
use crate::recorder::tests::RawWriterFactory;
use crate::recorder::Recorder;
use crate::storage::{ManualClock, StorageManager};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const WIDTH: u32 = 20;
const HEIGHT: u32 = 10;
const FPS: u32 = 10;

/// Notifier that remembers what it was asked to send
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Takes `delay` to answer, like a webhook relay close to its timeout
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
    ) -> std::result::Result<DeliveryReceipt, NotificationError> {
        self.sent
            .lock()
            .push((recipient.to_string(), message.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(NotificationError::Delivery {
                details: "relay unreachable".to_string(),
            });
        }
        Ok(DeliveryReceipt::new(recipient, self.name()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct Harness {
    controller: Controller,
    source: MockSourceHandle,
    notifier: Arc<RecordingNotifier>,
    events: EventReceiver,
    base: PathBuf,
    _temp_dir: TempDir,
}

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn create_test_config(base: &Path) -> MotioncamConfig {
    let mut config = MotioncamConfig::default();
    config.camera.resolution = (WIDTH, HEIGHT);
    config.camera.fps = FPS;
    config.analyzer.delta_threshold = 25;
    config.analyzer.sensitivity_percent = 2.5;
    config.recording.duration_seconds = 1;
    config.controller.poll_interval_ms = 100;
    config.controller.cooldown_seconds = 1;
    config.notification.recipient = "frontdoor@example.com".to_string();
    config.storage.path = base.to_string_lossy().to_string();
    config
}

fn still_frame() -> FrameData {
    FrameData::solid_rgb(0, WIDTH, HEIGHT, [50, 50, 50])
}

/// Top row lit up: 20 of 200 pixels change
fn motion_frame() -> FrameData {
    let mut data = vec![50u8; (WIDTH * HEIGHT * 3) as usize];
    for byte in data.iter_mut().take((WIDTH * 3) as usize) {
        *byte = 250;
    }
    FrameData::new(0, SystemTime::now(), data, WIDTH, HEIGHT, FrameFormat::Rgb24)
}

fn motion_script() -> Vec<MockStep> {
    let mut steps: Vec<MockStep> = (0..5).map(|_| MockStep::Frame(still_frame())).collect();
    steps.extend((0..4).map(|_| MockStep::Frame(motion_frame())));
    steps
}

fn harness_with(source: MockFrameSource, notifier: RecordingNotifier) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("clips");
    let config = create_test_config(&base);

    let handle = source.handle();
    let notifier = Arc::new(notifier);
    let clock = Arc::new(ManualClock::new(start_time()));
    let storage = StorageManager::new(&base, "raw", clock);
    let recorder = Recorder::new(Arc::new(RawWriterFactory::default()));
    let event_bus = Arc::new(EventBus::new(256));
    let events = EventReceiver::new(event_bus.subscribe(), EventFilter::All, "test".to_string());

    let controller = Controller::new(
        config,
        Box::new(source),
        notifier.clone(),
        storage,
        recorder,
        event_bus,
    );

    Harness {
        controller,
        source: handle,
        notifier,
        events,
        base,
        _temp_dir: temp_dir,
    }
}

fn scripted_source(steps: Vec<MockStep>, after: AfterScript) -> MockFrameSource {
    MockFrameSource::new(CaptureParams::new(WIDTH, HEIGHT, FPS))
        .with_steps(steps)
        .then(after)
}

fn transitions(events: &[MotioncamEvent]) -> Vec<(ControllerState, ControllerState)> {
    events
        .iter()
        .filter_map(|event| match event {
            MotioncamEvent::StateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
}

#[tokio::test(start_paused = true)]
async fn test_motion_cycle_produces_notification_and_clip() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::End),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    let summary = h.controller.run(CancellationToken::new()).await;

    assert_eq!(summary.reason, ShutdownReason::StreamEnded);
    assert_eq!(summary.motion_events, 1);
    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(summary.clips_saved, 1);
    assert_eq!(summary.recording_failures, 0);

    let expected = h
        .base
        .join("2024-05-01")
        .join("motion_detected_12-00-00.raw");
    assert_eq!(summary.clips, vec![expected.clone()]);
    assert!(expected.exists());

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "frontdoor@example.com");
    let stamp = messages[0]
        .1
        .strip_prefix("Motion detected at ")
        .unwrap();
    assert_eq!(
        NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").unwrap(),
        start_time()
    );

    let events = h.events.drain();
    assert_eq!(
        transitions(&events),
        vec![
            (ControllerState::Idle, ControllerState::Alerting),
            (ControllerState::Alerting, ControllerState::Recording),
            (ControllerState::Recording, ControllerState::Cooldown),
            (ControllerState::Cooldown, ControllerState::Idle),
            (ControllerState::Idle, ControllerState::Shutdown),
        ]
    );
    assert!(events.iter().any(|e| matches!(
        e,
        MotioncamEvent::ClipSaved { interrupted: false, frames, .. } if *frames == 3
    )));

    assert_eq!(h.controller.state(), ControllerState::Shutdown);
    assert_eq!(h.source.releases(), 1);
    assert!(!h.source.is_open());
}

#[tokio::test(start_paused = true)]
async fn test_notification_failure_does_not_block_recording() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::End),
        RecordingNotifier::failing(),
    );

    h.controller.start().await.unwrap();
    let summary = h.controller.run(CancellationToken::new()).await;

    assert_eq!(summary.notification_failures, 1);
    assert_eq!(summary.notifications_sent, 0);
    assert_eq!(summary.clips_saved, 1);
    assert_eq!(h.notifier.messages().len(), 1);

    let events = h.events.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, MotioncamEvent::NotificationFailed { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, MotioncamEvent::ClipSaved { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_idle() {
    let mut h = harness_with(
        scripted_source(vec![MockStep::Frame(still_frame())], AfterScript::RepeatLast),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    let cancel = CancellationToken::new();
    cancel_after(&cancel, Duration::from_millis(350));
    let summary = h.controller.run(cancel).await;

    assert_eq!(summary.reason, ShutdownReason::Signal("cancelled".to_string()));
    assert_eq!(summary.motion_events, 0);
    assert!(summary.polls >= 1);
    assert!(h.notifier.messages().is_empty());
    assert_eq!(h.source.releases(), 1);
    assert!(h
        .events
        .drain()
        .iter()
        .any(|e| matches!(e, MotioncamEvent::ShutdownRequested { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_recording_keeps_partial_clip() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::RepeatLast),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    let cancel = CancellationToken::new();
    // Five idle polls take about one second; motion arrives on the sixth
    cancel_after(&cancel, Duration::from_millis(1500));
    let summary = h.controller.run(cancel).await;

    assert!(matches!(summary.reason, ShutdownReason::Signal(_)));
    assert_eq!(summary.clips_saved, 1);
    assert!(summary.clips[0].exists());

    let events = h.events.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        MotioncamEvent::ClipSaved {
            interrupted: true,
            ..
        }
    )));
    assert!(!transitions(&events)
        .contains(&(ControllerState::Recording, ControllerState::Cooldown)));
    assert_eq!(h.controller.state(), ControllerState::Shutdown);
    assert_eq!(h.source.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_alerting_skips_recording() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::RepeatLast),
        RecordingNotifier::slow(Duration::from_secs(2)),
    );

    h.controller.start().await.unwrap();
    let cancel = CancellationToken::new();
    // Motion arrives after about one second; the notifier is still busy at 1.5s
    cancel_after(&cancel, Duration::from_millis(1500));
    let started = tokio::time::Instant::now();
    let summary = h.controller.run(cancel).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(summary.reason, ShutdownReason::Signal("cancelled".to_string()));
    assert_eq!(summary.motion_events, 1);
    assert_eq!(summary.notifications_sent, 0);
    assert_eq!(summary.clips_saved, 0);
    assert!(summary.clips.is_empty());
    assert_eq!(h.notifier.messages().len(), 1);

    let events = h.events.drain();
    assert!(!events.iter().any(|e| matches!(
        e,
        MotioncamEvent::RecordingStarted { .. }
            | MotioncamEvent::ClipSaved { .. }
            | MotioncamEvent::NotificationSent { .. }
    )));
    assert_eq!(
        transitions(&events),
        vec![
            (ControllerState::Idle, ControllerState::Alerting),
            (ControllerState::Alerting, ControllerState::Shutdown),
        ]
    );
    let mut saved = std::fs::read_dir(h.base.join("2024-05-01")).unwrap();
    assert!(saved.next().is_none());
    assert_eq!(h.source.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_camera_fails_start() {
    let mut h = harness_with(
        MockFrameSource::unavailable(CaptureParams::new(WIDTH, HEIGHT, FPS)),
        RecordingNotifier::default(),
    );

    let result = h.controller.start().await;
    assert!(matches!(result, Err(MotioncamError::Camera(_))));
    assert_eq!(h.source.opens(), 0);
    assert_eq!(h.source.releases(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_at_start_releases_source() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::End),
        RecordingNotifier::default(),
    );
    std::fs::write(&h.base, b"not a directory").unwrap();

    let result = h.controller.start().await;
    assert!(matches!(result, Err(MotioncamError::Storage(_))));
    assert_eq!(h.source.opens(), 1);
    assert_eq!(h.source.releases(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_directory_failure_skips_recording() {
    let mut h = harness_with(
        scripted_source(motion_script(), AfterScript::End),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    std::fs::remove_dir_all(&h.base).unwrap();
    std::fs::write(&h.base, b"not a directory").unwrap();

    let summary = h.controller.run(CancellationToken::new()).await;

    assert_eq!(summary.motion_events, 1);
    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(summary.clips_saved, 0);
    assert_eq!(summary.recording_failures, 1);
    assert_eq!(summary.reason, ShutdownReason::StreamEnded);

    let events = h.events.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, MotioncamEvent::RecordingFailed { .. })));
    assert!(transitions(&events).contains(&(ControllerState::Cooldown, ControllerState::Idle)));
}

#[tokio::test(start_paused = true)]
async fn test_transient_read_errors_are_counted() {
    let mut h = harness_with(
        scripted_source(
            vec![
                MockStep::Frame(still_frame()),
                MockStep::Timeout,
                MockStep::ReadFailure("usb glitch".to_string()),
                MockStep::Frame(still_frame()),
            ],
            AfterScript::End,
        ),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    let summary = h.controller.run(CancellationToken::new()).await;

    assert_eq!(summary.read_errors, 2);
    assert_eq!(summary.motion_events, 0);
    assert_eq!(summary.reason, ShutdownReason::StreamEnded);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_releases_once() {
    let mut h = harness_with(
        scripted_source(vec![MockStep::Frame(still_frame())], AfterScript::End),
        RecordingNotifier::default(),
    );

    h.controller.start().await.unwrap();
    h.controller.run(CancellationToken::new()).await;
    h.controller.shutdown().await;
    h.controller.shutdown().await;

    assert_eq!(h.source.opens(), 1);
    assert_eq!(h.source.releases(), 1);
}

#[test]
fn test_shutdown_reason_display() {
    assert_eq!(
        ShutdownReason::Signal("SIGTERM".to_string()).to_string(),
        "signal (SIGTERM)"
    );
    assert_eq!(ShutdownReason::StreamEnded.to_string(), "stream ended");
    assert_eq!(ControllerState::Cooldown.to_string(), "Cooldown");
}
