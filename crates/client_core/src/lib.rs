use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::OpportunityId,
    error::ApiError,
    protocol::{
        AdminStats, AuthResponse, CreateOpportunityRequest, FeedQuery, ForMeQuery,
        MagicLinkRequest, NewOpportunity, Opportunity, ProfileUpdate, PublicStats, ReorderEntry,
        StatusUpdate, User, UserConfig, UserOpportunity, UserOpportunityQuery, VerifyCodeRequest,
    },
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

pub mod companies;
pub mod config;
pub mod deck;
pub mod dispatch;
pub mod error;
pub mod gesture;
pub mod saved_list;
pub mod session;
pub mod swipe_controller;
pub mod validation;

pub use companies::{CompanyFilter, CompanySummary};
pub use config::{load_settings, load_settings_from, Settings};
pub use error::{ClientError, ErrorCategory, ReorderError};
pub use saved_list::{DropPlacement, ReorderOutcome, SavedList};
pub use session::{Session, SessionStore};
pub use swipe_controller::SwipeController;

use config::ApiSettings;
use validation::{
    validate_code, validate_email, validate_new_opportunity, validate_profile_update,
    validate_user_config,
};

const USER_SUBMITTED_SOURCE: &str = "user-submitted";
const USER_SUBMITTED_COMPANY: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Short user-facing message; hosts render these as toasts or log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub category: Option<ErrorCategory>,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            category: None,
            message: message.into(),
        }
    }

    pub fn from_error(context: &str, err: &ClientError) -> Self {
        Self {
            level: NoticeLevel::Error,
            category: Some(err.category()),
            message: format!("{context}: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    AuthChanged {
        authenticated: bool,
        user: Option<User>,
    },
    /// A request carrying a token was rejected with 401.
    SessionInvalidated,
    Notice(Notice),
}

/// Remote operations the swipe and saved-list controllers depend on.
#[async_trait]
pub trait OpportunityApi: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    async fn opportunity_feed(&self, query: &FeedQuery) -> Result<Vec<Opportunity>, ClientError>;

    /// Feed tailored to the signed-in user.
    async fn personalized_feed(&self, query: &ForMeQuery)
        -> Result<Vec<Opportunity>, ClientError>;

    async fn user_opportunities(
        &self,
        query: &UserOpportunityQuery,
    ) -> Result<Vec<UserOpportunity>, ClientError>;

    async fn update_opportunity_status(
        &self,
        id: OpportunityId,
        update: &StatusUpdate,
    ) -> Result<(), ClientError>;

    async fn reorder_opportunities(&self, entries: &[ReorderEntry]) -> Result<(), ClientError>;
}

struct BaseUrlState {
    active: String,
    resolved: bool,
}

pub struct ApiClient {
    http: Client,
    candidates: Vec<String>,
    healthcheck_timeout: Duration,
    base_url: Mutex<BaseUrlState>,
    session: RwLock<Session>,
    store: Option<SessionStore>,
    events: broadcast::Sender<ClientEvent>,
}

impl ApiClient {
    /// Builds a client and restores the persisted session, if a store is
    /// given.
    pub fn new(settings: &ApiSettings, store: Option<SessionStore>) -> Result<Arc<Self>, ClientError> {
        let first = settings
            .base_urls
            .first()
            .cloned()
            .ok_or_else(|| ClientError::validation("no API base URL configured"))?;
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ClientError::Transport {
                base_url: first.clone(),
                message: err.to_string(),
            })?;
        let session = store.as_ref().map(SessionStore::load).unwrap_or_default();
        let (events, _) = broadcast::channel(256);

        Ok(Arc::new(Self {
            http,
            candidates: settings.base_urls.clone(),
            healthcheck_timeout: settings.healthcheck_timeout,
            base_url: Mutex::new(BaseUrlState {
                active: first,
                // A single candidate needs no probing.
                resolved: settings.base_urls.len() == 1,
            }),
            session: RwLock::new(session),
            store,
            events,
        }))
    }

    /// Single host, no persistence.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Arc<Self>, ClientError> {
        let settings = ApiSettings {
            base_urls: vec![base_url.into()],
            ..ApiSettings::default()
        };
        Self::new(&settings, None)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<ClientEvent> {
        self.events.clone()
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.user.clone()
    }

    /// Base URL requests currently go to, resolving it first if needed.
    pub async fn active_base_url(&self) -> String {
        self.base_url().await
    }

    async fn base_url(&self) -> String {
        let mut guard = self.base_url.lock().await;
        if !guard.resolved {
            if let Some(url) = self.probe_candidates().await {
                guard.active = url;
            }
            guard.resolved = true;
            info!(base_url = %guard.active, "api: base url selected");
        }
        guard.active.clone()
    }

    async fn probe_candidates(&self) -> Option<String> {
        for candidate in &self.candidates {
            let result = self
                .http
                .get(format!("{candidate}/health"))
                .timeout(self.healthcheck_timeout)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    return Some(candidate.clone());
                }
                Ok(response) => {
                    debug!(base_url = %candidate, status = %response.status(), "api: health check failed");
                }
                Err(err) => {
                    debug!(base_url = %candidate, "api: health check failed: {err}");
                }
            }
        }
        warn!("api: no healthy base url, falling back to the first candidate");
        None
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<Response, ClientError> {
        let base_url = self.base_url().await;
        let token = self.session.read().await.token.clone();

        let mut request = self.http.request(method, format!("{base_url}{path}"));
        if let Some(token) = &token {
            request = request.bearer_auth(token);
        }
        let response = build(request)
            .send()
            .await
            .map_err(|err| ClientError::Transport {
                base_url: base_url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED && token.is_some() {
            warn!(path, "api: token rejected, clearing session");
            self.invalidate_session().await;
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), reason, &body).into());
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<T, ClientError> {
        let response = self.send(method, path, build).await?;
        let bytes = response.bytes().await.map_err(|err| ClientError::Decode(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
    }

    /// For endpoints whose body (often a 204) is not needed.
    async fn send_unit(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<(), ClientError> {
        self.send(method, path, build).await.map(|_| ())
    }

    async fn install_session(&self, auth: AuthResponse) -> User {
        let user = auth.user;
        let snapshot = {
            let mut session = self.session.write().await;
            session.token = Some(auth.access_token);
            session.user = Some(user.clone());
            session.clone()
        };
        self.persist(&snapshot);
        info!(user_id = user.id.0, "auth: logged in");
        let _ = self.events.send(ClientEvent::AuthChanged {
            authenticated: true,
            user: Some(user.clone()),
        });
        user
    }

    async fn invalidate_session(&self) {
        self.session.write().await.clear();
        self.persist(&Session::default());
        let _ = self.events.send(ClientEvent::SessionInvalidated);
        let _ = self.events.send(ClientEvent::AuthChanged {
            authenticated: false,
            user: None,
        });
    }

    fn persist(&self, session: &Session) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(session) {
            warn!(path = %store.path().display(), "failed to persist session: {err}");
        }
    }

    pub async fn request_magic_link(&self, email: &str) -> Result<(), ClientError> {
        let email = validate_email(email)?;
        let body = MagicLinkRequest { email };
        self.send_unit(Method::POST, "/auth/magic-link", |req| req.json(&body))
            .await?;
        info!("auth: magic link requested");
        Ok(())
    }

    pub async fn verify_magic_link(&self, token: &str) -> Result<User, ClientError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ClientError::validation("Missing login token"));
        }
        let auth: AuthResponse = self
            .send_json(Method::GET, "/auth/verify", |req| req.query(&[("token", token)]))
            .await?;
        Ok(self.install_session(auth).await)
    }

    pub async fn verify_code(&self, email: &str, code: &str) -> Result<User, ClientError> {
        let body = VerifyCodeRequest {
            email: validate_email(email)?,
            code: validate_code(code)?,
        };
        let auth: AuthResponse = self
            .send_json(Method::POST, "/auth/verify-code", |req| req.json(&body))
            .await?;
        Ok(self.install_session(auth).await)
    }

    /// Refreshes the stored user from the server.
    pub async fn me(&self) -> Result<User, ClientError> {
        let user: User = self.send_json(Method::GET, "/auth/me", |req| req).await?;
        self.store_user(&user).await;
        Ok(user)
    }

    pub async fn profile(&self) -> Result<User, ClientError> {
        let user: User = self.send_json(Method::GET, "/users/me", |req| req).await?;
        self.store_user(&user).await;
        Ok(user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let update = validate_profile_update(update)?;
        let user: User = self
            .send_json(Method::PUT, "/users/me", |req| req.json(&update))
            .await?;
        self.store_user(&user).await;
        info!(user_id = user.id.0, "profile updated");
        Ok(user)
    }

    async fn store_user(&self, user: &User) {
        let snapshot = {
            let mut session = self.session.write().await;
            session.user = Some(user.clone());
            session.clone()
        };
        self.persist(&snapshot);
    }

    pub async fn logout(&self) {
        let was_authenticated = {
            let mut session = self.session.write().await;
            let was = session.is_authenticated();
            session.clear();
            was
        };
        self.persist(&Session::default());
        if was_authenticated {
            info!("auth: logged out");
        }
        let _ = self.events.send(ClientEvent::AuthChanged {
            authenticated: false,
            user: None,
        });
    }

    pub async fn user_config(&self) -> Result<UserConfig, ClientError> {
        self.send_json(Method::GET, "/users/me/config", |req| req).await
    }

    pub async fn update_user_config(&self, config: &UserConfig) -> Result<UserConfig, ClientError> {
        validate_user_config(config)?;
        self.send_json(Method::PUT, "/users/me/config", |req| req.json(config))
            .await
    }

    pub async fn opportunity(&self, id: OpportunityId) -> Result<Opportunity, ClientError> {
        self.send_json(Method::GET, &format!("/opportunities/{id}"), |req| req)
            .await
    }

    pub async fn evaluate_opportunity(
        &self,
        id: OpportunityId,
    ) -> Result<serde_json::Value, ClientError> {
        self.send_json(Method::POST, &format!("/opportunities/{id}/evaluate"), |req| req)
            .await
    }

    /// Submits a job found elsewhere; it then goes through the normal
    /// scoring pipeline.
    pub async fn add_opportunity(&self, input: &NewOpportunity) -> Result<Opportunity, ClientError> {
        let input = validate_new_opportunity(input)?;
        let body = CreateOpportunityRequest {
            external_id: format!("user-{}", uuid::Uuid::new_v4()),
            source: USER_SUBMITTED_SOURCE.to_string(),
            source_company: USER_SUBMITTED_COMPANY.to_string(),
            title: input.title,
            company_name: input.company_name,
            url: input.url,
            location_raw: input.location,
            description: input.notes,
        };
        let created: Opportunity = self
            .send_json(Method::POST, "/opportunities", |req| req.json(&body))
            .await?;
        info!(opportunity_id = created.id.0, "opportunity submitted");
        Ok(created)
    }

    pub async fn public_stats(&self) -> Result<PublicStats, ClientError> {
        self.send_json(Method::GET, "/stats", |req| req).await
    }

    pub async fn admin_stats(&self) -> Result<AdminStats, ClientError> {
        self.send_json(Method::GET, "/stats/admin", |req| req).await
    }

    pub async fn health(&self) -> Result<serde_json::Value, ClientError> {
        self.send_json(Method::GET, "/health", |req| req).await
    }
}

#[async_trait]
impl OpportunityApi for ApiClient {
    async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    async fn opportunity_feed(&self, query: &FeedQuery) -> Result<Vec<Opportunity>, ClientError> {
        self.send_json(Method::GET, "/opportunities/feed", |req| req.query(query))
            .await
    }

    async fn personalized_feed(
        &self,
        query: &ForMeQuery,
    ) -> Result<Vec<Opportunity>, ClientError> {
        self.send_json(Method::GET, "/opportunities/for-me", |req| req.query(query))
            .await
    }

    async fn user_opportunities(
        &self,
        query: &UserOpportunityQuery,
    ) -> Result<Vec<UserOpportunity>, ClientError> {
        self.send_json(Method::GET, "/users/me/opportunities", |req| req.query(query))
            .await
    }

    async fn update_opportunity_status(
        &self,
        id: OpportunityId,
        update: &StatusUpdate,
    ) -> Result<(), ClientError> {
        self.send_unit(
            Method::PUT,
            &format!("/users/me/opportunities/{id}"),
            |req| req.json(update),
        )
        .await
    }

    async fn reorder_opportunities(&self, entries: &[ReorderEntry]) -> Result<(), ClientError> {
        self.send_unit(Method::PUT, "/users/me/opportunities/reorder", |req| {
            req.json(entries)
        })
        .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
