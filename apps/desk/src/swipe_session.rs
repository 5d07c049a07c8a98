//! Line-driven swipe session: one card at a time, decisions go through the
//! gesture tracker exactly as pointer input would.

use std::sync::Arc;

use anyhow::Result;
use client_core::{
    dispatch::{SwipeDirection, SwipeEvent},
    gesture::{GestureConfig, GestureTracker, PointerInput},
    ApiClient, Settings, SwipeController,
};
use shared::{domain::OpportunityStatus, protocol::Opportunity};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
    task::JoinHandle,
};
use tracing::warn;

use crate::print_notices;

/// Nominal card width used to turn a drag distance into progress.
const CARD_WIDTH: f64 = 360.0;
const DRAG_POINTER: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SwipeCommand {
    Save,
    Ignore,
    Applied,
    Undo,
    Drag(f64),
    Quit,
}

impl SwipeCommand {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = match parts.next()? {
            "s" | "save" => Self::Save,
            "i" | "ignore" => Self::Ignore,
            "a" | "applied" => Self::Applied,
            "u" | "undo" => Self::Undo,
            "d" | "drag" => Self::Drag(parts.next()?.parse().ok()?),
            "q" | "quit" => Self::Quit,
            _ => return None,
        };
        parts.next().is_none().then_some(command)
    }
}

pub async fn run(api: Arc<ApiClient>, settings: &Settings) -> Result<()> {
    let mut notices = api.subscribe_events();
    let mut controller =
        SwipeController::new(api.clone(), settings.feed.clone(), api.event_sender());
    let mut tracker = GestureTracker::new(GestureConfig::from(&settings.swipe));
    let mut swipes = tracker.subscribe();

    controller.load().await?;
    println!("s save · i ignore · a applied · u undo · d <px> drag · q quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        controller.present(&mut tracker, CARD_WIDTH);
        print_stack(&controller);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = SwipeCommand::parse(&line) else {
            println!("unknown command: {}", line.trim());
            continue;
        };

        let mut pending: Vec<JoinHandle<()>> = Vec::new();
        match command {
            SwipeCommand::Quit => break,
            SwipeCommand::Save => force(&controller, &mut tracker, SwipeDirection::Right),
            SwipeCommand::Ignore => force(&controller, &mut tracker, SwipeDirection::Left),
            SwipeCommand::Applied => {
                pending.extend(controller.decide_top(OpportunityStatus::Applied));
            }
            SwipeCommand::Undo => pending.extend(controller.undo()),
            SwipeCommand::Drag(dx) => drag(&controller, &mut tracker, dx),
        }

        pending.extend(apply_decisions(&mut controller, &mut swipes));
        for task in pending {
            if let Err(err) = task.await {
                warn!("swipe: status sync task failed: {err}");
            }
        }
        if print_notices(&mut notices) {
            controller.reset();
            break;
        }
    }
    Ok(())
}

fn force(controller: &SwipeController, tracker: &mut GestureTracker, direction: SwipeDirection) {
    if let Some(top) = controller.top() {
        tracker.force_decision(top.id, direction);
    }
}

fn drag(controller: &SwipeController, tracker: &mut GestureTracker, dx: f64) {
    let Some(top) = controller.top().map(|item| item.id) else {
        return;
    };
    tracker.pointer_down(top, PointerInput::primary(DRAG_POINTER, 0.0, 0.0));
    tracker.pointer_move(PointerInput::primary(DRAG_POINTER, dx, 0.0));
    if tracker
        .pointer_up(PointerInput::primary(DRAG_POINTER, dx, 0.0))
        .is_none()
    {
        println!("(not far enough, card springs back)");
    }
}

fn apply_decisions(
    controller: &mut SwipeController,
    swipes: &mut broadcast::Receiver<SwipeEvent>,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();
    while let Ok(event) = swipes.try_recv() {
        tasks.extend(controller.handle_swipe_event(&event));
    }
    tasks
}

fn print_stack(controller: &SwipeController) {
    let visible = controller.deck().visible();
    let Some(top) = visible.first() else {
        println!("\nYou're all caught up. (u to undo, q to quit)");
        return;
    };
    println!();
    print_card(top);
    for behind in &visible[1..] {
        println!("   next: {} @ {}", behind.title, behind.company_label());
    }
    println!("{} left", controller.deck().len());
}

fn print_card(item: &Opportunity) {
    println!("┌ {}", item.title);
    println!("│ {}", item.company_label());
    println!("│ {} · {}", item.location_label(), item.salary_label());
    println!("│ {}", item.date_label());
    if let Some(score) = item.score_label() {
        println!("│ {score}");
    }
    if let Some(url) = &item.url {
        println!("└ {url}");
    }
}
