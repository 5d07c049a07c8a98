use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{OpportunityId, OpportunityStatus},
    error::ApiError,
    protocol::{
        FeedQuery, ForMeQuery, Opportunity, ReorderEntry, StatusUpdate, UserOpportunity, UserOpportunityQuery,
    },
};
use tokio::sync::{broadcast, oneshot, Mutex, Notify};

use crate::{error::ClientError, ClientEvent, Notice, OpportunityApi};

/// In-memory stand-in for the HTTP API.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub authenticated: AtomicBool,
    pub fail_feed: AtomicBool,
    pub fail_status: AtomicBool,
    pub fail_reorder: AtomicBool,
    pub feed: Mutex<Vec<Opportunity>>,
    pub records: Mutex<Vec<UserOpportunity>>,
    pub feed_queries: Mutex<Vec<(Option<f64>, Option<u32>)>>,
    pub for_me_queries: Mutex<Vec<(Option<f64>, Option<u32>)>>,
    pub status_calls: Mutex<Vec<(OpportunityId, OpportunityStatus)>>,
    pub reorder_calls: Mutex<Vec<Vec<ReorderEntry>>>,
    pub reorder_started: Notify,
    reorder_gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeApi {
    pub fn signed_in() -> Arc<Self> {
        let api = Self::default();
        api.authenticated.store(true, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn signed_out() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_feed(&self, feed: Vec<Opportunity>) {
        *self.feed.lock().await = feed;
    }

    pub async fn set_records(&self, records: Vec<UserOpportunity>) {
        *self.records.lock().await = records;
    }

    /// Holds the next reorder call until the returned sender fires.
    pub async fn gate_reorder(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.reorder_gate.lock().await = Some(rx);
        tx
    }

    pub async fn status_calls(&self) -> Vec<(OpportunityId, OpportunityStatus)> {
        self.status_calls.lock().await.clone()
    }

    pub async fn reorder_calls(&self) -> Vec<Vec<ReorderEntry>> {
        self.reorder_calls.lock().await.clone()
    }
}

fn server_error() -> ClientError {
    ApiError::new(500, "Internal Server Error").into()
}

#[async_trait]
impl OpportunityApi for FakeApi {
    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn opportunity_feed(&self, query: &FeedQuery) -> Result<Vec<Opportunity>, ClientError> {
        self.feed_queries
            .lock()
            .await
            .push((query.min_score, query.limit));
        if self.fail_feed.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(self.feed.lock().await.clone())
    }

    async fn personalized_feed(
        &self,
        query: &ForMeQuery,
    ) -> Result<Vec<Opportunity>, ClientError> {
        self.for_me_queries
            .lock()
            .await
            .push((query.min_score, query.limit));
        if self.fail_feed.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(self.feed.lock().await.clone())
    }

    async fn user_opportunities(
        &self,
        query: &UserOpportunityQuery,
    ) -> Result<Vec<UserOpportunity>, ClientError> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|record| query.status_filter.map_or(true, |s| record.status == s))
            .cloned()
            .collect())
    }

    async fn update_opportunity_status(
        &self,
        id: OpportunityId,
        update: &StatusUpdate,
    ) -> Result<(), ClientError> {
        self.status_calls.lock().await.push((id, update.status));
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }

    async fn reorder_opportunities(&self, entries: &[ReorderEntry]) -> Result<(), ClientError> {
        self.reorder_calls.lock().await.push(entries.to_vec());
        self.reorder_started.notify_one();
        let gate = self.reorder_gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_reorder.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }
}

pub(crate) fn opportunity(id: i64, title: &str, score: f64) -> Opportunity {
    Opportunity::new(OpportunityId(id), title).with_score(score)
}

pub(crate) fn record(id: i64, status: OpportunityStatus, display_order: i64) -> UserOpportunity {
    UserOpportunity {
        opportunity_id: OpportunityId(id),
        status,
        display_order: Some(display_order),
        opportunity: Some(Opportunity::new(OpportunityId(id), format!("Job {id}"))),
    }
}

pub(crate) fn notices(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            out.push(notice);
        }
    }
    out
}
