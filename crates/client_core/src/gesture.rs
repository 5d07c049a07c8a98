//! Pointer tracking for swipeable cards.
//!
//! The tracker turns pointer input into a horizontal decision signal. Card
//! bookkeeping lives in a table keyed by opportunity id; the host renders
//! whatever [`CardVisual`] the tracker reports for each card.

use std::{collections::HashMap, time::Duration};

use shared::domain::OpportunityId;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::debug;

use crate::{
    config::SwipeSettings,
    dispatch::{DecisionCallback, DecisionDispatcher, SwipeDirection, SwipeEvent},
};

pub const PRIMARY_BUTTON: i16 = 0;

#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub threshold: f64,
    pub max_rotation_deg: f64,
    pub fly_off: Duration,
    pub reset: Duration,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::from(&SwipeSettings::default())
    }
}

impl From<&SwipeSettings> for GestureConfig {
    fn from(settings: &SwipeSettings) -> Self {
        Self {
            threshold: settings.threshold,
            max_rotation_deg: settings.max_rotation_deg,
            fly_off: settings.fly_off,
            reset: settings.reset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub rotation_deg: f64,
}

impl CardTransform {
    pub const IDENTITY: Self = Self {
        translate_x: 0.0,
        translate_y: 0.0,
        rotation_deg: 0.0,
    };

    pub fn css(&self) -> String {
        format!(
            "translate({}px, {}px) rotate({}deg)",
            self.translate_x, self.translate_y, self.rotation_deg
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Spring back to centre (ease-out).
    Reset(Duration),
    /// Exit animation after a decision.
    FlyOff(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardVisual {
    pub transform: CardTransform,
    pub opacity: f64,
    pub left_overlay: f64,
    pub right_overlay: f64,
    pub transition: Option<Transition>,
    pub dragging: bool,
}

impl CardVisual {
    pub const RESTING: Self = Self {
        transform: CardTransform::IDENTITY,
        opacity: 1.0,
        left_overlay: 0.0,
        right_overlay: 0.0,
        transition: None,
        dragging: false,
    };
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub pointer_id: i64,
    pub button: i16,
    pub x: f64,
    pub y: f64,
}

impl PointerInput {
    pub fn primary(pointer_id: i64, x: f64, y: f64) -> Self {
        Self {
            pointer_id,
            button: PRIMARY_BUTTON,
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pointer {pointer_id} on card {card}: {reason}")]
pub struct CaptureError {
    pub card: OpportunityId,
    pub pointer_id: i64,
    pub reason: String,
}

impl CaptureError {
    pub fn new(card: OpportunityId, pointer_id: i64, reason: impl Into<String>) -> Self {
        Self {
            card,
            pointer_id,
            reason: reason.into(),
        }
    }
}

/// Host hook for routing a pointer's events to a card while it is dragged.
/// Failures are logged and tracking carries on uncaptured.
pub trait PointerCapture: Send {
    fn capture(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError>;
    fn release(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError>;
}

/// Hosts without pointer capture; tracking still works from window events.
pub struct NoPointerCapture;

impl PointerCapture for NoPointerCapture {
    fn capture(&mut self, _card: OpportunityId, _pointer_id: i64) -> Result<(), CaptureError> {
        Ok(())
    }

    fn release(&mut self, _card: OpportunityId, _pointer_id: i64) -> Result<(), CaptureError> {
        Ok(())
    }
}

struct CardState {
    callback: Option<DecisionCallback>,
    dismissed: bool,
    start_x: f64,
    start_y: f64,
    width: f64,
    visual: CardVisual,
}

struct ActivePointer {
    card: OpportunityId,
    pointer_id: i64,
}

pub struct GestureTracker {
    config: GestureConfig,
    cards: HashMap<OpportunityId, CardState>,
    active: Option<ActivePointer>,
    capture: Box<dyn PointerCapture>,
    dispatcher: DecisionDispatcher,
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

impl GestureTracker {
    pub fn new(config: GestureConfig) -> Self {
        Self::with_capture(config, Box::new(NoPointerCapture))
    }

    pub fn with_capture(config: GestureConfig, capture: Box<dyn PointerCapture>) -> Self {
        let dispatcher = DecisionDispatcher::new(config.fly_off, config.max_rotation_deg);
        Self {
            config,
            cards: HashMap::new(),
            active: None,
            capture,
            dispatcher,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwipeEvent> {
        self.dispatcher.subscribe()
    }

    /// Registers (or re-registers) a card. Any previous state for the same
    /// card, including its dismissed flag, is discarded.
    pub fn register_card(
        &mut self,
        card: OpportunityId,
        width: f64,
        callback: Option<DecisionCallback>,
    ) {
        if self.active.as_ref().is_some_and(|a| a.card == card) {
            self.cleanup_active_pointer();
        }
        self.cards.insert(
            card,
            CardState {
                callback,
                dismissed: false,
                start_x: 0.0,
                start_y: 0.0,
                width: width.max(1.0),
                visual: CardVisual::RESTING,
            },
        );
    }

    pub fn unregister_card(&mut self, card: OpportunityId) {
        if self.active.as_ref().is_some_and(|a| a.card == card) {
            self.cleanup_active_pointer();
        }
        self.cards.remove(&card);
    }

    pub fn is_registered(&self, card: OpportunityId) -> bool {
        self.cards.contains_key(&card)
    }

    pub fn registered_cards(&self) -> Vec<OpportunityId> {
        self.cards.keys().copied().collect()
    }

    pub fn is_dismissed(&self, card: OpportunityId) -> bool {
        self.cards.get(&card).is_some_and(|state| state.dismissed)
    }

    pub fn visual(&self, card: OpportunityId) -> Option<CardVisual> {
        self.cards.get(&card).map(|state| state.visual)
    }

    pub fn active_card(&self) -> Option<OpportunityId> {
        self.active.as_ref().map(|active| active.card)
    }

    pub fn resize_card(&mut self, card: OpportunityId, width: f64) {
        if let Some(state) = self.cards.get_mut(&card) {
            state.width = width.max(1.0);
        }
    }

    /// Starts tracking; returns `false` when the input is ignored.
    pub fn pointer_down(&mut self, card: OpportunityId, input: PointerInput) -> bool {
        if input.button != PRIMARY_BUTTON {
            return false;
        }
        match self.cards.get(&card) {
            Some(state) if !state.dismissed => {}
            _ => return false,
        }

        // A drag on another card gives up that card's pointer first.
        if self.active.as_ref().is_some_and(|active| active.card != card) {
            self.cleanup_active_pointer();
        }

        let Some(state) = self.cards.get_mut(&card) else {
            return false;
        };
        state.start_x = input.x;
        state.start_y = input.y;
        state.visual.dragging = true;
        state.visual.transition = None;

        if let Err(err) = self.capture.capture(card, input.pointer_id) {
            debug!(opportunity_id = card.0, "pointer capture failed: {err}");
        }
        self.active = Some(ActivePointer {
            card,
            pointer_id: input.pointer_id,
        });

        self.dispatcher.emit(SwipeEvent::Activated { card });
        true
    }

    pub fn pointer_move(&mut self, input: PointerInput) {
        let Some(card) = self.active_card_for(input.pointer_id) else {
            return;
        };
        let config = &self.config;
        let Some(state) = self.cards.get_mut(&card) else {
            return;
        };

        let delta_x = input.x - state.start_x;
        let delta_y = input.y - state.start_y;
        let progress = delta_x / state.width;
        let rotation = clamp(
            progress * config.max_rotation_deg,
            -config.max_rotation_deg,
            config.max_rotation_deg,
        );
        let (left, right) = overlay_opacities(progress, config.threshold);

        state.visual.transform = CardTransform {
            translate_x: delta_x,
            translate_y: delta_y,
            rotation_deg: rotation,
        };
        state.visual.left_overlay = left;
        state.visual.right_overlay = right;
    }

    /// Ends the drag: decides when the threshold was reached, otherwise
    /// springs the card back.
    pub fn pointer_up(&mut self, input: PointerInput) -> Option<SwipeDirection> {
        let card = self.active_card_for(input.pointer_id)?;
        let progress = self
            .cards
            .get(&card)
            .map(|state| (input.x - state.start_x) / state.width);
        let Some(progress) = progress else {
            self.cleanup_active_pointer();
            return None;
        };

        let decided = if progress.abs() >= self.config.threshold {
            let direction = SwipeDirection::from_progress(progress);
            self.complete_swipe(card, direction).map(|_| direction)
        } else {
            self.reset_card(card);
            None
        };

        self.cleanup_active_pointer();
        decided
    }

    pub fn pointer_cancel(&mut self, input: PointerInput) -> Option<SwipeDirection> {
        self.pointer_up(input)
    }

    /// Decision from a button or key. Aborts any drag first; returns `false`
    /// when the card is unknown or already decided.
    pub fn force_decision(&mut self, card: OpportunityId, direction: SwipeDirection) -> bool {
        if !self.cards.contains_key(&card) {
            return false;
        }
        self.cleanup_active_pointer();
        self.complete_swipe(card, direction).is_some()
    }

    fn active_card_for(&self, pointer_id: i64) -> Option<OpportunityId> {
        self.active
            .as_ref()
            .filter(|active| active.pointer_id == pointer_id)
            .map(|active| active.card)
    }

    fn reset_card(&mut self, card: OpportunityId) {
        let reset = self.config.reset;
        if let Some(state) = self.cards.get_mut(&card) {
            state.visual = CardVisual {
                transition: Some(Transition::Reset(reset)),
                ..CardVisual::RESTING
            };
            self.dispatcher.emit(SwipeEvent::Reset { card });
        }
    }

    /// Returns the fly-off timer when this call made the decision. A card
    /// that is already dismissed yields `None`.
    fn complete_swipe(
        &mut self,
        card: OpportunityId,
        direction: SwipeDirection,
    ) -> Option<Option<JoinHandle<()>>> {
        let state = self.cards.get_mut(&card)?;
        if state.dismissed {
            return None;
        }
        state.dismissed = true;
        state.visual = self.dispatcher.fly_off_visual(state.width, direction);

        Some(
            self.dispatcher
                .dispatch(card, direction, state.callback.as_mut()),
        )
    }

    fn cleanup_active_pointer(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        if let Err(err) = self.capture.release(active.card, active.pointer_id) {
            debug!(opportunity_id = active.card.0, "pointer release failed: {err}");
        }
        if let Some(state) = self.cards.get_mut(&active.card) {
            state.visual.dragging = false;
        }
    }
}

/// Left/right overlay opacity for a horizontal progress value.
pub fn overlay_opacities(progress: f64, threshold: f64) -> (f64, f64) {
    let intensity = (progress.abs() / threshold).min(1.0);
    let left = if progress < 0.0 { intensity } else { 0.0 };
    let right = if progress > 0.0 { intensity } else { 0.0 };
    (left, right)
}

#[cfg(test)]
#[path = "tests/gesture_tests.rs"]
mod tests;
