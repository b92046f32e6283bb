use super::types::{ControllerState, RunSummary, ShutdownReason};
use super::Controller;
use crate::error::CameraError;
use crate::events::MotioncamEvent;
use crate::frame::FrameData;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Notification text timestamp, e.g. `2024-05-01 12:00:00`
const NOTIFICATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

enum CycleEnd {
    Continue,
    Stop(ShutdownReason),
}

impl Controller {
    /// Run the control loop until `cancel` fires or the source ends.
    ///
    /// The frame source is released before this returns, whatever the reason.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        info!("Motioncam control loop running");
        let poll_interval = Duration::from_millis(self.config.controller.poll_interval_ms);

        let reason = loop {
            if cancel.is_cancelled() {
                break self.signal_reason();
            }

            if let CycleEnd::Stop(reason) = self.poll_once(&cancel).await {
                break reason;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break self.signal_reason(),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        };

        info!("Control loop stopping: {}", reason);
        self.event_bus
            .publish(MotioncamEvent::ShutdownRequested {
                reason: reason.to_string(),
                timestamp: SystemTime::now(),
            })
            .await;
        self.shutdown().await;

        let summary = std::mem::take(&mut self.stats).into_summary(reason);
        info!(
            "Run finished: {} polls, {} motion events, {} clips saved, \
             {} notification failures, {} read errors",
            summary.polls,
            summary.motion_events,
            summary.clips_saved,
            summary.notification_failures,
            summary.read_errors
        );
        summary
    }

    /// One Idle poll, followed by a full alert cycle when it saw motion
    async fn poll_once(&mut self, cancel: &CancellationToken) -> CycleEnd {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            read = self.source.read_frame() => Some(read),
        };
        let Some(read) = read else {
            return CycleEnd::Stop(self.signal_reason());
        };
        self.stats.polls += 1;

        let frame = match read {
            Ok(frame) => frame,
            Err(CameraError::StreamEnded) => {
                warn!("Frame source ended while idle");
                return CycleEnd::Stop(ShutdownReason::StreamEnded);
            }
            Err(e) if e.is_transient() => {
                self.stats.read_errors += 1;
                debug!("Skipping failed poll: {}", e);
                return CycleEnd::Continue;
            }
            Err(e) => {
                error!("Frame source failed: {}", e);
                return CycleEnd::Stop(ShutdownReason::Error(e.to_string()));
            }
        };

        let reading = match self.detector.analyze(&frame) {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.analysis_errors += 1;
                warn!("Motion analysis failed for frame {}: {}", frame.id, e);
                return CycleEnd::Continue;
            }
        };

        match reading.score {
            Some(score) if reading.motion => self.handle_motion(&frame, score, cancel).await,
            _ => CycleEnd::Continue,
        }
    }

    /// Alerting → Recording → Cooldown → Idle
    async fn handle_motion(
        &mut self,
        frame: &FrameData,
        score: f64,
        cancel: &CancellationToken,
    ) -> CycleEnd {
        self.stats.motion_events += 1;
        self.event_bus
            .publish(MotioncamEvent::MotionDetected {
                score,
                frame_id: frame.id,
                timestamp: frame.timestamp,
            })
            .await;

        self.transition(ControllerState::Alerting).await;
        if !self.notify(cancel).await || cancel.is_cancelled() {
            return CycleEnd::Stop(self.signal_reason());
        }

        self.transition(ControllerState::Recording).await;
        let interrupted = self.record_clip(cancel).await;
        if interrupted || cancel.is_cancelled() {
            return CycleEnd::Stop(self.signal_reason());
        }

        self.transition(ControllerState::Cooldown).await;
        let cooldown = Duration::from_secs(self.config.controller.cooldown_seconds);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return CycleEnd::Stop(self.signal_reason()),
            _ = tokio::time::sleep(cooldown) => {}
        }

        // The retained frame predates the recording
        self.detector.reset();
        self.transition(ControllerState::Idle).await;
        CycleEnd::Continue
    }

    /// Send the motion alert; returns false when `cancel` fired first
    async fn notify(&mut self, cancel: &CancellationToken) -> bool {
        let message = format!(
            "Motion detected at {}",
            self.clock.now().format(NOTIFICATION_TIME_FORMAT)
        );
        let recipient = self.config.notification.recipient.clone();

        let notifier = Arc::clone(&self.notifier);
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            sent = notifier.send(&recipient, &message) => Some(sent),
        };
        let Some(sent) = sent else {
            info!("Notification abandoned, stop requested");
            return false;
        };

        match sent {
            Ok(receipt) => {
                self.stats.notifications_sent += 1;
                debug!(
                    "Notification {} delivered via {}",
                    receipt.id, receipt.backend
                );
                self.event_bus
                    .publish(MotioncamEvent::NotificationSent { recipient, message })
                    .await;
            }
            Err(e) => {
                self.stats.notification_failures += 1;
                warn!("Notification failed, recording anyway: {}", e);
                self.event_bus
                    .publish(MotioncamEvent::NotificationFailed {
                        error: e.to_string(),
                    })
                    .await;
            }
        }
        true
    }

    /// Record one clip; returns whether cancellation cut it short
    async fn record_clip(&mut self, cancel: &CancellationToken) -> bool {
        let clip = match self.storage.new_clip_path().await {
            Ok(clip) => clip,
            Err(e) => {
                error!("Cannot prepare clip location, skipping recording: {}", e);
                self.recording_failed(e.to_string()).await;
                return false;
            }
        };

        self.event_bus
            .publish(MotioncamEvent::RecordingStarted {
                path: clip.path.clone(),
            })
            .await;

        let duration = Duration::from_secs(self.config.recording.duration_seconds);
        match self
            .recorder
            .record(self.source.as_mut(), &clip, duration, cancel)
            .await
        {
            Ok(outcome) => {
                self.stats.clips_saved += 1;
                self.stats.clips.push(outcome.path.clone());
                self.event_bus
                    .publish(MotioncamEvent::ClipSaved {
                        path: outcome.path,
                        frames: outcome.frames_written,
                        interrupted: outcome.interrupted,
                    })
                    .await;
                outcome.interrupted
            }
            Err(e) => {
                error!("Recording failed: {}", e);
                self.recording_failed(e.to_string()).await;
                false
            }
        }
    }

    async fn recording_failed(&mut self, error: String) {
        self.stats.recording_failures += 1;
        self.event_bus
            .publish(MotioncamEvent::RecordingFailed { error })
            .await;
    }

    fn signal_reason(&self) -> ShutdownReason {
        let name = self
            .signal_name
            .lock()
            .clone()
            .unwrap_or_else(|| "cancelled".to_string());
        ShutdownReason::Signal(name)
    }
}
