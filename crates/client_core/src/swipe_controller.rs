//! Working list, decisions and undo for the swipe view.
//!
//! Local state changes first; the matching status update is sent in the
//! background and only ever surfaces as a notice when it fails.

use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{OpportunityId, OpportunityStatus},
    protocol::{FeedQuery, ForMeQuery, Opportunity, StatusUpdate, UserOpportunityQuery},
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    companies::{summarize_companies, CompanyFilter, CompanySummary},
    config::FeedSettings,
    deck::Deck,
    dispatch::SwipeEvent,
    error::ClientError,
    gesture::GestureTracker,
    ClientEvent, Notice, OpportunityApi,
};

pub struct SwipeController {
    api: Arc<dyn OpportunityApi>,
    deck: Deck,
    feed: FeedSettings,
    companies: Vec<CompanySummary>,
    company_filter: CompanyFilter,
    events: broadcast::Sender<ClientEvent>,
}

impl SwipeController {
    pub fn new(
        api: Arc<dyn OpportunityApi>,
        feed: FeedSettings,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            deck: Deck::default(),
            feed,
            companies: Vec::new(),
            company_filter: CompanyFilter::default(),
            events,
        }
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn top(&self) -> Option<&Opportunity> {
        self.deck.top()
    }

    /// Company counts over the last loaded feed, before the company filter.
    pub fn companies(&self) -> &[CompanySummary] {
        &self.companies
    }

    pub fn company_filter(&self) -> Option<&str> {
        self.company_filter.selected()
    }

    /// Selects `company`, or clears the selection when it is already
    /// selected. Takes effect on the next [`load`](Self::load).
    pub fn toggle_company(&mut self, company: &str) -> Option<&str> {
        self.company_filter.toggle(company)
    }

    pub fn clear_company_filter(&mut self) {
        self.company_filter.clear();
    }

    /// Fetches the feed, drops anything already ignored or applied to, and
    /// orders the rest by score. Replaces the working list and clears undo
    /// history. On failure the current list is kept.
    pub async fn load(&mut self) -> Result<usize, ClientError> {
        match self.fetch_working_list().await {
            Ok(mut items) => {
                self.companies = summarize_companies(&items);
                items.retain(|item| self.company_filter.matches(item));
                self.deck.replace(items);
                info!(
                    count = self.deck.len(),
                    company = self.company_filter.selected().unwrap_or("*"),
                    "swipe: working list loaded"
                );
                Ok(self.deck.len())
            }
            Err(err) => {
                error!("swipe: failed to load opportunities: {err}");
                self.notify(Notice::from_error("Failed to load opportunities", &err));
                Err(err)
            }
        }
    }

    async fn fetch_working_list(&self) -> Result<Vec<Opportunity>, ClientError> {
        let signed_in = self.api.is_authenticated().await;
        let mut items = if signed_in && self.feed.personalized {
            let query = ForMeQuery {
                min_score: Some(self.feed.min_score),
                limit: Some(self.feed.limit),
                ..ForMeQuery::default()
            };
            self.api.personalized_feed(&query).await?
        } else {
            self.fetch_public_feed(signed_in).await?
        };

        // Stable: equal scores keep feed order.
        items.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        Ok(items)
    }

    async fn fetch_public_feed(&self, signed_in: bool) -> Result<Vec<Opportunity>, ClientError> {
        let query = FeedQuery {
            min_score: Some(self.feed.min_score),
            limit: Some(self.feed.limit),
            ..FeedQuery::default()
        };
        let mut items = self.api.opportunity_feed(&query).await?;

        if signed_in {
            let limit = self.feed.hidden_status_limit;
            let ignored = UserOpportunityQuery::with_status(OpportunityStatus::Ignored, limit);
            let applied = UserOpportunityQuery::with_status(OpportunityStatus::Applied, limit);
            let (ignored, applied) = futures::try_join!(
                self.api.user_opportunities(&ignored),
                self.api.user_opportunities(&applied),
            )?;
            let hidden: HashSet<OpportunityId> = ignored
                .iter()
                .chain(applied.iter())
                .map(|record| record.opportunity_id)
                .collect();
            items.retain(|item| !hidden.contains(&item.id));
        }
        Ok(items)
    }

    /// Removes `id` from the working list, records it for undo and sends the
    /// new status. Returns the background sync task when one was started;
    /// outside a tokio runtime the change stays local.
    pub fn decide(
        &mut self,
        id: OpportunityId,
        status: OpportunityStatus,
    ) -> Option<JoinHandle<()>> {
        let record = self.deck.decide(id, status)?;
        debug!(
            opportunity_id = id.0,
            index = record.index,
            %status,
            "swipe: decision recorded"
        );
        self.spawn_status_sync(id, status, "Failed to save decision")
    }

    pub fn decide_top(&mut self, status: OpportunityStatus) -> Option<JoinHandle<()>> {
        let id = self.deck.top()?.id;
        self.decide(id, status)
    }

    /// Restores the latest decision and reverts its remote status.
    pub fn undo(&mut self) -> Option<JoinHandle<()>> {
        let Some(record) = self.deck.undo() else {
            self.notify(Notice::info("Nothing to undo"));
            return None;
        };
        let id = record.opportunity.id;
        debug!(opportunity_id = id.0, index = record.index, "swipe: decision undone");
        self.spawn_status_sync(id, self.feed.undo_status, "Failed to undo")
    }

    /// Applies a tracker decision to the working list. Other events are
    /// ignored.
    pub fn handle_swipe_event(&mut self, event: &SwipeEvent) -> Option<JoinHandle<()>> {
        match event {
            SwipeEvent::Decided { card, direction } => self.decide(*card, direction.status()),
            _ => None,
        }
    }

    /// Keeps only the top card registered with the tracker. A top card left
    /// dismissed by an undo is registered afresh.
    pub fn present(&self, tracker: &mut GestureTracker, card_width: f64) {
        let top = self.deck.top().map(|item| item.id);
        for card in tracker.registered_cards() {
            if Some(card) != top {
                tracker.unregister_card(card);
            }
        }
        if let Some(top) = top {
            if !tracker.is_registered(top) || tracker.is_dismissed(top) {
                tracker.register_card(top, card_width, None);
            }
        }
    }

    pub fn reset(&mut self) {
        self.deck.clear();
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(ClientEvent::Notice(notice));
    }

    fn spawn_status_sync(
        &self,
        id: OpportunityId,
        status: OpportunityStatus,
        context: &'static str,
    ) -> Option<JoinHandle<()>> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                opportunity_id = id.0,
                %status,
                "swipe: no async runtime, status kept local"
            );
            return None;
        };
        let api = Arc::clone(&self.api);
        let events = self.events.clone();
        Some(handle.spawn(async move {
            if !api.is_authenticated().await {
                debug!(opportunity_id = id.0, "swipe: signed out, status kept local");
                return;
            }
            match api
                .update_opportunity_status(id, &StatusUpdate::new(status))
                .await
            {
                Ok(()) => info!(opportunity_id = id.0, %status, "swipe: status saved"),
                Err(err) => {
                    error!(opportunity_id = id.0, %status, "swipe: status update failed: {err}");
                    let _ = events.send(ClientEvent::Notice(Notice::from_error(context, &err)));
                }
            }
        }))
    }
}

#[cfg(test)]
#[path = "tests/swipe_controller_tests.rs"]
mod tests;
