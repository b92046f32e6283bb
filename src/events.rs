use crate::controller::ControllerState;
use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Events emitted by the recording pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotioncamEvent {
    /// The controller moved between states
    StateChanged {
        from: ControllerState,
        to: ControllerState,
        timestamp: SystemTime,
    },
    /// A frame exceeded the motion sensitivity
    MotionDetected {
        score: f64,
        frame_id: u64,
        timestamp: SystemTime,
    },
    /// A notification was accepted by the notifier
    NotificationSent { recipient: String, message: String },
    /// A notification could not be delivered
    NotificationFailed { error: String },
    /// A clip has been opened for writing
    RecordingStarted { path: PathBuf },
    /// A clip was finalized
    ClipSaved {
        path: PathBuf,
        frames: u64,
        interrupted: bool,
    },
    /// A recording session produced no clip
    RecordingFailed { error: String },
    /// The pipeline is stopping
    ShutdownRequested {
        reason: String,
        timestamp: SystemTime,
    },
}

impl MotioncamEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MotioncamEvent::StateChanged { from, to, .. } => {
                format!("State changed: {} -> {}", from, to)
            }
            MotioncamEvent::MotionDetected {
                score, frame_id, ..
            } => {
                format!("Motion detected in frame {} ({:.2}%)", frame_id, score)
            }
            MotioncamEvent::NotificationSent { recipient, .. } => {
                format!("Notification sent to {}", recipient)
            }
            MotioncamEvent::NotificationFailed { error } => {
                format!("Notification failed: {}", error)
            }
            MotioncamEvent::RecordingStarted { path } => {
                format!("Recording started: {}", path.display())
            }
            MotioncamEvent::ClipSaved { path, frames, .. } => {
                format!("Clip saved: {} ({} frames)", path.display(), frames)
            }
            MotioncamEvent::RecordingFailed { error } => {
                format!("Recording failed: {}", error)
            }
            MotioncamEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            MotioncamEvent::StateChanged { .. } => "state_changed",
            MotioncamEvent::MotionDetected { .. } => "motion_detected",
            MotioncamEvent::NotificationSent { .. } => "notification_sent",
            MotioncamEvent::NotificationFailed { .. } => "notification_failed",
            MotioncamEvent::RecordingStarted { .. } => "recording_started",
            MotioncamEvent::ClipSaved { .. } => "clip_saved",
            MotioncamEvent::RecordingFailed { .. } => "recording_failed",
            MotioncamEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for pipeline observers using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MotioncamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<MotioncamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event, returning how many subscribers received it
    pub async fn publish(&self, event: MotioncamEvent) -> usize {
        debug!("Publishing event: {}", event.description());

        // Nobody listening is not an error for the pipeline
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&MotioncamEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &MotioncamEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<MotioncamEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<MotioncamEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<MotioncamEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                    return Err(EventBusError::Lagged { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every event already queued that passes the filter
    pub fn drain(&mut self) -> Vec<MotioncamEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        events.push(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                }
                Err(_) => return events,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let delivered = event_bus
            .publish(MotioncamEvent::MotionDetected {
                score: 12.5,
                frame_id: 7,
                timestamp: SystemTime::now(),
            })
            .await;
        assert_eq!(delivered, 1);

        match receiver.recv().await.unwrap() {
            MotioncamEvent::MotionDetected {
                score, frame_id, ..
            } => {
                assert_eq!(score, 12.5);
                assert_eq!(frame_id, 7);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let event_bus = EventBus::default();
        let delivered = event_bus
            .publish(MotioncamEvent::RecordingFailed {
                error: "disk full".to_string(),
            })
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        let delivered = event_bus
            .publish(MotioncamEvent::StateChanged {
                from: ControllerState::Idle,
                to: ControllerState::Alerting,
                timestamp: SystemTime::now(),
            })
            .await;
        assert_eq!(delivered, 2);

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let filter = EventFilter::EventTypes(vec!["clip_saved"]);
        let mut filtered = EventReceiver::new(event_bus.subscribe(), filter, "test".to_string());

        event_bus
            .publish(MotioncamEvent::NotificationFailed {
                error: "timeout".to_string(),
            })
            .await;
        event_bus
            .publish(MotioncamEvent::ClipSaved {
                path: PathBuf::from("/tmp/clip.avi"),
                frames: 30,
                interrupted: false,
            })
            .await;

        let event = filtered.recv().await.unwrap();
        assert_eq!(event.event_type(), "clip_saved");
        assert!(filtered.drain().is_empty());
    }

    #[test]
    fn test_event_descriptions() {
        let event = MotioncamEvent::StateChanged {
            from: ControllerState::Recording,
            to: ControllerState::Cooldown,
            timestamp: SystemTime::now(),
        };
        assert_eq!(event.description(), "State changed: Recording -> Cooldown");
        assert_eq!(event.event_type(), "state_changed");

        let custom = EventFilter::Custom(|e| matches!(e, MotioncamEvent::StateChanged { .. }));
        assert!(custom.matches(&event));
        assert!(EventFilter::All.matches(&event));
    }
}
