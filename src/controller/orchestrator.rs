use super::types::{ControllerState, RunStats};
use crate::analyzer::MotionDetector;
use crate::camera::{open_camera, FrameSource};
use crate::config::MotioncamConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::notify::{notifier_from_config, NotificationSink};
use crate::recorder::{writer_factory_for, Recorder};
use crate::storage::{Clock, StorageManager};
use parking_lot::Mutex;
use std::sync::Arc;

/// Owns the frame source and drives the Idle → Alerting → Recording → Cooldown cycle
pub struct Controller {
    pub(super) config: MotioncamConfig,
    pub(super) source: Box<dyn FrameSource>,
    pub(super) detector: MotionDetector,
    pub(super) storage: StorageManager,
    pub(super) recorder: Recorder,
    pub(super) notifier: Arc<dyn NotificationSink>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) clock: Arc<dyn Clock>,

    // Lifecycle
    pub(super) state: ControllerState,
    pub(super) stats: RunStats,
    pub(super) released: bool,
    pub(super) signal_name: Arc<Mutex<Option<String>>>,
}

impl Controller {
    /// Assemble a controller from explicit collaborators
    pub fn new(
        config: MotioncamConfig,
        source: Box<dyn FrameSource>,
        notifier: Arc<dyn NotificationSink>,
        storage: StorageManager,
        recorder: Recorder,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let detector = MotionDetector::new(config.analyzer.clone());
        let clock = storage.clock();

        Self {
            config,
            source,
            detector,
            storage,
            recorder,
            notifier,
            event_bus,
            clock,
            state: ControllerState::Idle,
            stats: RunStats::default(),
            released: false,
            signal_name: Arc::new(Mutex::new(None)),
        }
    }

    /// Build every collaborator from configuration
    pub fn from_config(config: MotioncamConfig, simulate: bool) -> Result<Self> {
        let source = open_camera(&config.camera, simulate)?;
        let notifier = notifier_from_config(&config.notification)?;
        let factory = writer_factory_for(&config.recording)?;
        let storage = StorageManager::from_config(&config.storage, factory.extension())?;
        let recorder = Recorder::new(factory);
        let event_bus = Arc::new(EventBus::default());

        Ok(Self::new(config, source, notifier, storage, recorder, event_bus))
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }
}
