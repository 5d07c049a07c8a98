//! Saved opportunities with drag-to-reorder.
//!
//! Only one reorder is persisted at a time: while a save is in flight new
//! drags are refused and further persist calls are skipped. A failed save
//! reloads the list from the server so the display matches what is stored.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::{
    domain::{OpportunityId, OpportunityStatus},
    protocol::{ReorderEntry, StatusUpdate, UserOpportunity, UserOpportunityQuery},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use crate::{
    error::{ClientError, ReorderError},
    ClientEvent, Notice, OpportunityApi,
};

/// Gap between consecutive `display_order` values.
pub const DISPLAY_ORDER_STEP: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPlacement {
    Before,
    After,
}

impl DropPlacement {
    /// Upper half of the target row drops before it, lower half after.
    pub fn from_pointer(pointer_y: f64, row_top: f64, row_height: f64) -> Self {
        if pointer_y < row_top + row_height / 2.0 {
            Self::Before
        } else {
            Self::After
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Dropped onto itself.
    Unchanged,
    Saved(Vec<ReorderEntry>),
    /// Another save was still running.
    Skipped,
    /// The save failed and the list was reloaded.
    Reloaded,
}

/// `display_order = index * DISPLAY_ORDER_STEP` for the given order.
pub fn reorder_payload(ids: impl IntoIterator<Item = OpportunityId>) -> Vec<ReorderEntry> {
    ids.into_iter()
        .zip(0_i64..)
        .map(|(opportunity_id, index)| ReorderEntry {
            opportunity_id,
            display_order: index * DISPLAY_ORDER_STEP,
        })
        .collect()
}

#[derive(Default)]
struct SavedListState {
    items: Vec<UserOpportunity>,
    applied: HashSet<OpportunityId>,
    dragging: Option<OpportunityId>,
}

impl SavedListState {
    fn position_of(&self, id: OpportunityId) -> Option<usize> {
        self.items.iter().position(|item| item.opportunity_id == id)
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SavedList {
    api: Arc<dyn OpportunityApi>,
    limit: u32,
    state: Mutex<SavedListState>,
    busy: AtomicBool,
    events: broadcast::Sender<ClientEvent>,
}

impl SavedList {
    pub fn new(
        api: Arc<dyn OpportunityApi>,
        limit: u32,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            limit,
            state: Mutex::new(SavedListState::default()),
            busy: AtomicBool::new(false),
            events,
        }
    }

    /// Loads saved (`todo`) and applied records; signed-out users get an
    /// empty list.
    pub async fn load(&self) -> Result<usize, ClientError> {
        if !self.api.is_authenticated().await {
            let mut state = self.state.lock().await;
            state.items.clear();
            state.applied.clear();
            state.dragging = None;
            return Ok(0);
        }

        let saved = UserOpportunityQuery::with_status(OpportunityStatus::Todo, self.limit);
        let applied = UserOpportunityQuery::with_status(OpportunityStatus::Applied, self.limit);
        let (saved, applied) = match futures::try_join!(
            self.api.user_opportunities(&saved),
            self.api.user_opportunities(&applied),
        ) {
            Ok(lists) => lists,
            Err(err) => {
                error!("saved: failed to load list: {err}");
                self.notify(Notice::from_error("Failed to load saved jobs", &err));
                return Err(err);
            }
        };

        let mut state = self.state.lock().await;
        state.applied = applied.iter().map(|record| record.opportunity_id).collect();
        state.items = saved;
        state.dragging = None;
        info!(
            count = state.items.len(),
            applied = state.applied.len(),
            "saved: list loaded"
        );
        Ok(state.items.len())
    }

    pub async fn items(&self) -> Vec<UserOpportunity> {
        self.state.lock().await.items.clone()
    }

    pub async fn ids(&self) -> Vec<OpportunityId> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .map(|item| item.opportunity_id)
            .collect()
    }

    pub async fn applied_ids(&self) -> HashSet<OpportunityId> {
        self.state.lock().await.applied.clone()
    }

    pub async fn dragging(&self) -> Option<OpportunityId> {
        self.state.lock().await.dragging
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Refused while a reorder is being saved.
    pub async fn begin_drag(&self, id: OpportunityId) -> Result<(), ReorderError> {
        if self.is_busy() {
            return Err(ReorderError::Busy);
        }
        let mut state = self.state.lock().await;
        if state.position_of(id).is_none() {
            return Err(ReorderError::UnknownItem(id));
        }
        state.dragging = Some(id);
        Ok(())
    }

    /// Drag abandoned without a drop.
    pub async fn end_drag(&self) {
        self.state.lock().await.dragging = None;
    }

    /// Moves the dragged row next to `target`, then persists the new order.
    pub async fn drop_on(
        &self,
        target: OpportunityId,
        placement: DropPlacement,
    ) -> Result<ReorderOutcome, ReorderError> {
        {
            let mut state = self.state.lock().await;
            let dragged = state.dragging.take().ok_or(ReorderError::NoDrag)?;
            if dragged == target {
                return Ok(ReorderOutcome::Unchanged);
            }
            let from = state
                .position_of(dragged)
                .ok_or(ReorderError::UnknownItem(dragged))?;
            let item = state.items.remove(from);
            let Some(target_index) = state.position_of(target) else {
                state.items.insert(from, item);
                return Err(ReorderError::UnknownItem(target));
            };
            let insert_at = match placement {
                DropPlacement::Before => target_index,
                DropPlacement::After => target_index + 1,
            };
            state.items.insert(insert_at, item);
            debug!(
                opportunity_id = dragged.0,
                from,
                to = insert_at,
                "saved: row moved"
            );
        }
        Ok(self.persist().await)
    }

    /// Keyboard/CLI shorthand for a full drag and drop.
    pub async fn move_item(
        &self,
        id: OpportunityId,
        target: OpportunityId,
        placement: DropPlacement,
    ) -> Result<ReorderOutcome, ReorderError> {
        self.begin_drag(id).await?;
        self.drop_on(target, placement).await
    }

    /// Sends the current order. Skipped when a save is already running.
    pub async fn persist(&self) -> ReorderOutcome {
        if self.busy.swap(true, Ordering::AcqRel) {
            debug!("saved: reorder already in flight, skipping");
            return ReorderOutcome::Skipped;
        }
        let _guard = BusyGuard(&self.busy);

        let payload = {
            let state = self.state.lock().await;
            reorder_payload(state.items.iter().map(|item| item.opportunity_id))
        };
        match self.api.reorder_opportunities(&payload).await {
            Ok(()) => {
                info!(count = payload.len(), "saved: order saved");
                ReorderOutcome::Saved(payload)
            }
            Err(err) => {
                error!("saved: failed to save order: {err}");
                self.notify(Notice::from_error("Failed to save order", &err));
                if let Err(err) = self.load().await {
                    error!("saved: reload after failed reorder also failed: {err}");
                }
                ReorderOutcome::Reloaded
            }
        }
    }

    /// Marks a saved row as applied; it leaves the saved list on success.
    pub async fn mark_applied(&self, id: OpportunityId) -> Result<(), ClientError> {
        let update = StatusUpdate::new(OpportunityStatus::Applied);
        if let Err(err) = self.api.update_opportunity_status(id, &update).await {
            error!(opportunity_id = id.0, "saved: failed to mark applied: {err}");
            self.notify(Notice::from_error("Failed to mark as applied", &err));
            return Err(err);
        }

        let mut state = self.state.lock().await;
        state.items.retain(|item| item.opportunity_id != id);
        state.applied.insert(id);
        if state.dragging == Some(id) {
            state.dragging = None;
        }
        drop(state);
        info!(opportunity_id = id.0, "saved: marked applied");
        self.notify(Notice::info("Marked as applied"));
        Ok(())
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(ClientEvent::Notice(notice));
    }
}

#[cfg(test)]
#[path = "tests/saved_list_tests.rs"]
mod tests;
