//! Decision signals and the fly-off transition that follows a decision.

use std::time::Duration;

use shared::domain::{OpportunityId, OpportunityStatus};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use crate::gesture::{CardTransform, CardVisual, Transition};

/// Horizontal travel of a flown-off card, relative to its width.
const FLY_OFF_DISTANCE_FACTOR: f64 = 1.4;
const FLY_OFF_LIFT_PX: f64 = -24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwipeDirection {
    /// Ignore.
    Left,
    /// Save.
    Right,
}

impl SwipeDirection {
    pub fn from_progress(progress: f64) -> Self {
        if progress > 0.0 {
            Self::Right
        } else {
            Self::Left
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }

    pub fn status(self) -> OpportunityStatus {
        match self {
            Self::Left => OpportunityStatus::Ignored,
            Self::Right => OpportunityStatus::Todo,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwipeEvent {
    /// A drag started on the card.
    Activated { card: OpportunityId },
    /// A drag ended under the threshold; the card springs back.
    Reset { card: OpportunityId },
    /// Fired once per card, synchronously with the decision.
    Decided {
        card: OpportunityId,
        direction: SwipeDirection,
    },
    /// Fired after the fly-off finished; the card is no longer interactive.
    Complete {
        card: OpportunityId,
        direction: SwipeDirection,
    },
}

pub type DecisionCallback = Box<dyn FnMut(SwipeDirection) + Send>;

pub struct DecisionDispatcher {
    events: broadcast::Sender<SwipeEvent>,
    fly_off: Duration,
    max_rotation_deg: f64,
}

impl DecisionDispatcher {
    pub fn new(fly_off: Duration, max_rotation_deg: f64) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            events,
            fly_off,
            max_rotation_deg,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwipeEvent> {
        self.events.subscribe()
    }

    pub fn fly_off_duration(&self) -> Duration {
        self.fly_off
    }

    pub(crate) fn emit(&self, event: SwipeEvent) {
        let _ = self.events.send(event);
    }

    /// Off-screen end state of a card decided in `direction`.
    pub fn fly_off_visual(&self, width: f64, direction: SwipeDirection) -> CardVisual {
        let (left_overlay, right_overlay) = match direction {
            SwipeDirection::Left => (1.0, 0.0),
            SwipeDirection::Right => (0.0, 1.0),
        };
        CardVisual {
            transform: CardTransform {
                translate_x: width * FLY_OFF_DISTANCE_FACTOR * direction.sign(),
                translate_y: FLY_OFF_LIFT_PX,
                rotation_deg: self.max_rotation_deg * direction.sign(),
            },
            opacity: 0.0,
            left_overlay,
            right_overlay,
            transition: Some(Transition::FlyOff(self.fly_off)),
            dragging: false,
        }
    }

    /// Fires `Decided` and the card callback now, and `Complete` once the
    /// fly-off duration has elapsed.
    ///
    /// Outside a tokio runtime there is nothing to wait on, so `Complete`
    /// is sent immediately and no handle is returned.
    pub fn dispatch(
        &self,
        card: OpportunityId,
        direction: SwipeDirection,
        callback: Option<&mut DecisionCallback>,
    ) -> Option<JoinHandle<()>> {
        debug!(opportunity_id = card.0, ?direction, "card decided");
        self.emit(SwipeEvent::Decided { card, direction });

        if let Some(callback) = callback {
            callback(direction);
        }

        let complete = SwipeEvent::Complete { card, direction };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let events = self.events.clone();
                let fly_off = self.fly_off;
                Some(handle.spawn(async move {
                    tokio::time::sleep(fly_off).await;
                    let _ = events.send(complete);
                }))
            }
            Err(_) => {
                warn!(
                    opportunity_id = card.0,
                    "no async runtime for fly-off timer; completing immediately"
                );
                self.emit(complete);
                None
            }
        }
    }
}
