//! Client assembly.
//!
//! Builds the token store, session state, navigator, gateway, session controller and
//! search aggregator, and wires the gateway's expiry hook back into the session state.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::gateway::{ApiGateway, ExpiryHook};
use crate::identity::{
    FileTokenStore, Navigation, Navigator, SessionCell, SessionController, TokenStore, LOGIN_PATH,
};
use crate::search::{SearchAggregator, SearchOutcome, SearchScope};
use crate::services::{
    self, AnnouncementRecord, ComplaintStatus, NewComplaint, SimilarIssues, SubmitComplaintResponse,
};

/// Hook fired by the gateway on a 401: drop to Anonymous and send the user to login.
pub fn expiry_hook(cell: SessionCell, navigator: Arc<Navigator>) -> ExpiryHook {
    Arc::new(move || {
        cell.expire();
        navigator.force(LOGIN_PATH);
    })
}

pub struct CivicClient {
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    navigator: Arc<Navigator>,
    gateway: ApiGateway,
    session: SessionController,
    search: SearchAggregator<ApiGateway>,
}

impl CivicClient {
    /// Client backed by the session file named in `config`.
    pub fn connect(config: ClientConfig) -> ClientResult<Self> {
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.session_file.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let base = config.base_url()?;
        let cell = SessionCell::new();
        let navigator = Arc::new(Navigator::new());
        let gateway = ApiGateway::new(base, store.clone(), expiry_hook(cell.clone(), navigator.clone()))?;
        let session = SessionController::new(store.clone(), cell, gateway.clone());
        let search = SearchAggregator::new(gateway.clone(), config.search_limit, config.search_timeout);
        session.restore();
        Ok(Self { config, store, navigator, gateway, session, search })
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn store(&self) -> &Arc<dyn TokenStore> { &self.store }
    pub fn gateway(&self) -> &ApiGateway { &self.gateway }
    pub fn session(&self) -> &SessionController { &self.session }
    pub fn navigator(&self) -> &Navigator { &self.navigator }

    pub fn navigate(&self, path: &str) -> Navigation {
        self.navigator.navigate(self.session.cell(), path)
    }

    /// Search scoped by the current user's role; anonymous callers search unscoped.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let scope = match self.session.current_user() {
            Some(u) => SearchScope::for_user(&u),
            None => SearchScope::Unscoped,
        };
        self.search.search_detailed(query, &scope).await
    }

    pub async fn search_scoped(&self, query: &str, scope: &SearchScope) -> SearchOutcome {
        self.search.search_detailed(query, scope).await
    }

    pub async fn dashboard(&self) -> ClientResult<Value> { services::dashboard::data(&self.gateway).await }

    pub async fn summary(&self) -> ClientResult<Value> { services::dashboard::summary(&self.gateway).await }

    /// Announcements for `ward`, or for the current user's ward when `None`.
    pub async fn announcements(&self, ward: Option<&str>) -> ClientResult<Vec<AnnouncementRecord>> {
        let own = self.session.current_user().and_then(|u| u.scoped_ward().map(str::to_string));
        let ward = ward.map(str::to_string).or(own);
        services::announcements::list(&self.gateway, ward.as_deref(), self.config.announcement_limit).await
    }

    pub async fn submit_complaint(&self, complaint: &NewComplaint) -> ClientResult<SubmitComplaintResponse> {
        services::complaints::submit(&self.gateway, complaint).await
    }

    pub async fn similar_issues(&self, complaint_id: i64) -> ClientResult<SimilarIssues> {
        services::complaints::similar(&self.gateway, complaint_id).await
    }

    pub async fn update_status(&self, complaint_id: i64, status: ComplaintStatus) -> ClientResult<Value> {
        services::complaints::update_status(&self.gateway, complaint_id, status).await
    }

    pub async fn submit_report(&self, report: &Value) -> ClientResult<Value> {
        services::reports::submit(&self.gateway, report).await
    }
}
