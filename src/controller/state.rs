use super::{Controller, ControllerState};
use crate::events::MotioncamEvent;
use std::time::SystemTime;
use tracing::{debug, info};

impl Controller {
    /// Current state of the control loop
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Move to `to` and announce it on the event bus
    pub(super) async fn transition(&mut self, to: ControllerState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;

        match to {
            ControllerState::Idle | ControllerState::Cooldown => {
                debug!("Controller state {} -> {}", from, to)
            }
            _ => info!("Controller state {} -> {}", from, to),
        }

        self.event_bus
            .publish(MotioncamEvent::StateChanged {
                from,
                to,
                timestamp: SystemTime::now(),
            })
            .await;
    }
}
