use super::*;

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use tokio::sync::broadcast::error::TryRecvError;

const CARD: OpportunityId = OpportunityId(7);

fn config(fly_off_ms: u64) -> GestureConfig {
    GestureConfig {
        fly_off: Duration::from_millis(fly_off_ms),
        ..GestureConfig::default()
    }
}

fn drain(rx: &mut broadcast::Receiver<SwipeEvent>) -> Vec<SwipeEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return events,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

fn decided_count(events: &[SwipeEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, SwipeEvent::Decided { .. }))
        .count()
}

struct FailingCapture {
    attempts: Arc<Mutex<u32>>,
}

impl PointerCapture for FailingCapture {
    fn capture(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError> {
        *self.attempts.lock().expect("lock") += 1;
        Err(CaptureError::new(card, pointer_id, "capture not supported"))
    }

    fn release(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError> {
        Err(CaptureError::new(card, pointer_id, "nothing captured"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CaptureCall {
    Capture(OpportunityId, i64),
    Release(OpportunityId, i64),
}

/// Records every capture and release the tracker asks for.
struct RecordingCapture {
    calls: Arc<Mutex<Vec<CaptureCall>>>,
}

impl PointerCapture for RecordingCapture {
    fn capture(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError> {
        self.calls
            .lock()
            .expect("lock")
            .push(CaptureCall::Capture(card, pointer_id));
        Ok(())
    }

    fn release(&mut self, card: OpportunityId, pointer_id: i64) -> Result<(), CaptureError> {
        self.calls
            .lock()
            .expect("lock")
            .push(CaptureCall::Release(card, pointer_id));
        Ok(())
    }
}

#[test]
fn move_updates_transform_rotation_and_overlays() {
    let mut tracker = GestureTracker::new(config(300));
    tracker.register_card(CARD, 300.0, None);

    assert!(tracker.pointer_down(CARD, PointerInput::primary(1, 100.0, 50.0)));
    tracker.pointer_move(PointerInput::primary(1, 190.0, 60.0));

    let visual = tracker.visual(CARD).expect("registered");
    assert_eq!(visual.transform.translate_x, 90.0);
    assert_eq!(visual.transform.translate_y, 10.0);
    assert!((visual.transform.rotation_deg - 4.5).abs() < 1e-9);
    assert!((visual.right_overlay - 0.75).abs() < 1e-9);
    assert_eq!(visual.left_overlay, 0.0);
    assert!(visual.dragging);
}

#[test]
fn rotation_is_clamped_and_left_overlay_saturates() {
    let mut tracker = GestureTracker::new(config(300));
    tracker.register_card(CARD, 100.0, None);

    tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0));
    tracker.pointer_move(PointerInput::primary(1, -300.0, 0.0));

    let visual = tracker.visual(CARD).expect("registered");
    assert_eq!(visual.transform.rotation_deg, -15.0);
    assert_eq!(visual.left_overlay, 1.0);
    assert_eq!(visual.right_overlay, 0.0);
}

#[tokio::test]
async fn release_under_threshold_springs_back_without_deciding() {
    let mut tracker = GestureTracker::new(config(20));
    let mut rx = tracker.subscribe();
    tracker.register_card(CARD, 300.0, None);

    tracker.pointer_down(CARD, PointerInput::primary(1, 10.0, 10.0));
    tracker.pointer_move(PointerInput::primary(1, -100.0, 30.0));
    let decided = tracker.pointer_up(PointerInput::primary(1, -100.0, 30.0));

    assert_eq!(decided, None);
    let visual = tracker.visual(CARD).expect("registered");
    assert_eq!(visual.transform, CardTransform::IDENTITY);
    assert_eq!(visual.left_overlay, 0.0);
    assert_eq!(visual.right_overlay, 0.0);
    assert_eq!(visual.transition, Some(Transition::Reset(Duration::from_millis(180))));
    assert!(!visual.dragging);
    assert!(!tracker.is_dismissed(CARD));
    assert_eq!(tracker.active_card(), None);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(
        drain(&mut rx),
        vec![
            SwipeEvent::Activated { card: CARD },
            SwipeEvent::Reset { card: CARD },
        ]
    );
}

#[tokio::test]
async fn release_over_threshold_decides_once_then_completes_after_fly_off() {
    let mut tracker = GestureTracker::new(config(50));
    let mut rx = tracker.subscribe();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    tracker.register_card(
        CARD,
        300.0,
        Some(Box::new(move |direction| {
            recorded.lock().expect("lock").push(direction);
        })),
    );

    let started = Instant::now();
    tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0));
    tracker.pointer_move(PointerInput::primary(1, 150.0, -5.0));
    let decided = tracker.pointer_up(PointerInput::primary(1, 150.0, -5.0));
    assert_eq!(decided, Some(SwipeDirection::Right));

    assert_eq!(
        drain(&mut rx),
        vec![
            SwipeEvent::Activated { card: CARD },
            SwipeEvent::Decided {
                card: CARD,
                direction: SwipeDirection::Right
            },
        ]
    );
    assert_eq!(*calls.lock().expect("lock"), vec![SwipeDirection::Right]);

    let visual = tracker.visual(CARD).expect("registered");
    assert_eq!(visual.opacity, 0.0);
    assert_eq!(visual.right_overlay, 1.0);
    assert!((visual.transform.translate_x - 420.0).abs() < 1e-9);
    assert_eq!(visual.transform.translate_y, -24.0);
    assert_eq!(visual.transform.rotation_deg, 15.0);

    let complete = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("complete within timeout")
        .expect("event");
    assert_eq!(
        complete,
        SwipeEvent::Complete {
            card: CARD,
            direction: SwipeDirection::Right
        }
    );
    assert!(started.elapsed() >= Duration::from_millis(50));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn card_decides_at_most_once_across_drag_and_forced_input() {
    let mut tracker = GestureTracker::new(config(5));
    let mut rx = tracker.subscribe();
    tracker.register_card(CARD, 200.0, None);

    tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0));
    assert_eq!(
        tracker.pointer_up(PointerInput::primary(1, -120.0, 0.0)),
        Some(SwipeDirection::Left)
    );

    assert!(!tracker.force_decision(CARD, SwipeDirection::Right));
    assert!(!tracker.pointer_down(CARD, PointerInput::primary(2, 0.0, 0.0)));
    assert_eq!(tracker.pointer_up(PointerInput::primary(2, 200.0, 0.0)), None);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let events = drain(&mut rx);
    assert_eq!(decided_count(&events), 1);
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, SwipeEvent::Complete { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn forced_decision_aborts_an_active_drag() {
    let mut tracker = GestureTracker::new(config(5));
    let mut rx = tracker.subscribe();
    tracker.register_card(CARD, 300.0, None);

    tracker.pointer_down(CARD, PointerInput::primary(4, 0.0, 0.0));
    tracker.pointer_move(PointerInput::primary(4, 200.0, 0.0));
    assert!(tracker.force_decision(CARD, SwipeDirection::Left));
    assert_eq!(tracker.active_card(), None);

    // The drag would have decided right; it must not fire a second decision.
    assert_eq!(tracker.pointer_up(PointerInput::primary(4, 200.0, 0.0)), None);

    let events = drain(&mut rx);
    assert_eq!(
        events.last(),
        Some(&SwipeEvent::Decided {
            card: CARD,
            direction: SwipeDirection::Left
        })
    );
    assert_eq!(decided_count(&events), 1);
}

#[test]
fn secondary_button_and_foreign_pointers_are_ignored() {
    let mut tracker = GestureTracker::new(config(5));
    tracker.register_card(CARD, 300.0, None);

    let secondary = PointerInput {
        button: 2,
        ..PointerInput::primary(1, 0.0, 0.0)
    };
    assert!(!tracker.pointer_down(CARD, secondary));
    assert_eq!(tracker.active_card(), None);

    tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0));
    tracker.pointer_move(PointerInput::primary(9, 250.0, 0.0));
    assert_eq!(tracker.visual(CARD).expect("card").transform, CardTransform::IDENTITY);
    assert_eq!(tracker.pointer_up(PointerInput::primary(9, 250.0, 0.0)), None);
    assert_eq!(tracker.active_card(), Some(CARD));
}

#[tokio::test]
async fn capture_failure_degrades_to_uncaptured_tracking() {
    let attempts = Arc::new(Mutex::new(0));
    let mut tracker = GestureTracker::with_capture(
        config(5),
        Box::new(FailingCapture {
            attempts: Arc::clone(&attempts),
        }),
    );
    tracker.register_card(CARD, 100.0, None);

    assert!(tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0)));
    assert_eq!(
        tracker.pointer_up(PointerInput::primary(1, 60.0, 0.0)),
        Some(SwipeDirection::Right)
    );
    assert_eq!(*attempts.lock().expect("lock"), 1);
}

#[test]
fn without_runtime_complete_fires_immediately() {
    let mut tracker = GestureTracker::new(config(300));
    let mut rx = tracker.subscribe();
    tracker.register_card(CARD, 300.0, None);

    assert!(tracker.force_decision(CARD, SwipeDirection::Right));
    assert_eq!(
        drain(&mut rx),
        vec![
            SwipeEvent::Decided {
                card: CARD,
                direction: SwipeDirection::Right
            },
            SwipeEvent::Complete {
                card: CARD,
                direction: SwipeDirection::Right
            },
        ]
    );
}

#[test]
fn unregistered_cards_ignore_input() {
    let mut tracker = GestureTracker::new(config(5));
    tracker.register_card(CARD, 300.0, None);
    tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0));
    tracker.unregister_card(CARD);

    assert!(!tracker.is_registered(CARD));
    assert_eq!(tracker.active_card(), None);
    assert!(!tracker.force_decision(CARD, SwipeDirection::Left));
    assert!(!tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0)));
}

#[test]
fn overlay_opacity_scales_with_threshold() {
    assert_eq!(overlay_opacities(0.0, 0.4), (0.0, 0.0));
    assert_eq!(overlay_opacities(0.2, 0.4), (0.0, 0.5));
    assert_eq!(overlay_opacities(-0.8, 0.4), (1.0, 0.0));
}

#[test]
fn direction_maps_to_status() {
    use shared::domain::OpportunityStatus;

    assert_eq!(SwipeDirection::from_progress(0.5), SwipeDirection::Right);
    assert_eq!(SwipeDirection::from_progress(-0.5), SwipeDirection::Left);
    assert_eq!(SwipeDirection::Right.status(), OpportunityStatus::Todo);
    assert_eq!(SwipeDirection::Left.status(), OpportunityStatus::Ignored);
    assert_eq!(
        CardTransform::IDENTITY.css(),
        "translate(0px, 0px) rotate(0deg)"
    );
}

#[test]
fn pressing_another_card_releases_the_first_capture() {
    const OTHER: OpportunityId = OpportunityId(8);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut tracker = GestureTracker::with_capture(
        config(300),
        Box::new(RecordingCapture {
            calls: Arc::clone(&calls),
        }),
    );
    tracker.register_card(CARD, 300.0, None);
    tracker.register_card(OTHER, 300.0, None);

    assert!(tracker.pointer_down(CARD, PointerInput::primary(1, 0.0, 0.0)));
    assert!(tracker.pointer_down(OTHER, PointerInput::primary(2, 0.0, 0.0)));

    assert_eq!(
        *calls.lock().expect("lock"),
        vec![
            CaptureCall::Capture(CARD, 1),
            CaptureCall::Release(CARD, 1),
            CaptureCall::Capture(OTHER, 2),
        ]
    );
    assert!(!tracker.visual(CARD).expect("card").dragging);
    assert!(tracker.visual(OTHER).expect("card").dragging);
    assert_eq!(tracker.active_card(), Some(OTHER));

    tracker.pointer_up(PointerInput::primary(2, 0.0, 0.0));
    assert_eq!(
        calls.lock().expect("lock").last(),
        Some(&CaptureCall::Release(OTHER, 2))
    );
}

#[test]
fn capture_errors_name_the_card_and_pointer() {
    let err = CaptureError::new(CARD, 3, "not supported");
    assert_eq!(err.to_string(), "pointer 3 on card 7: not supported");
}
