use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::profile::UserProfile;
use super::token_store::TokenStore;
use crate::error::{ClientError, ClientResult};
use crate::gateway::ApiGateway;
use crate::services::{self, LoginRequest, RegisterRequest, RegisterResponse};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserProfile),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(u) => Some(u),
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, SessionState::Authenticated(_)) }
}

#[derive(Debug)]
struct SessionSlot {
    state: SessionState,
    // true until the stored session has been read at startup
    loading: bool,
}

/// Shared handle on the in-memory session state.
///
/// Cloned into the controller and into the expiry hook the gateway fires on a 401,
/// so both see the same state. Writes replace the whole state.
#[derive(Debug, Clone)]
pub struct SessionCell {
    inner: Arc<RwLock<SessionSlot>>,
}

impl Default for SessionCell {
    fn default() -> Self {
        Self { inner: Arc::new(RwLock::new(SessionSlot { state: SessionState::Anonymous, loading: true })) }
    }
}

impl SessionCell {
    pub fn new() -> Self { Self::default() }

    pub fn snapshot(&self) -> (SessionState, bool) {
        let g = self.inner.read();
        (g.state.clone(), g.loading)
    }

    pub fn state(&self) -> SessionState { self.inner.read().state.clone() }
    pub fn is_loading(&self) -> bool { self.inner.read().loading }
    pub fn current_user(&self) -> Option<UserProfile> { self.inner.read().state.user().cloned() }

    pub fn set(&self, state: SessionState) {
        self.inner.write().state = state;
    }

    pub fn finish_loading(&self) { self.inner.write().loading = false; }

    /// Drop to Anonymous. Returns whether a user was logged in.
    pub fn expire(&self) -> bool {
        let mut g = self.inner.write();
        let was = g.state.is_authenticated();
        g.state = SessionState::Anonymous;
        was
    }
}

/// Owns the Anonymous / Authenticated state machine.
pub struct SessionController {
    store: Arc<dyn TokenStore>,
    cell: SessionCell,
    gateway: ApiGateway,
}

impl SessionController {
    pub fn new(store: Arc<dyn TokenStore>, cell: SessionCell, gateway: ApiGateway) -> Self {
        Self { store, cell, gateway }
    }

    pub fn cell(&self) -> &SessionCell { &self.cell }

    /// Derive the initial state from the token store. No network round-trip: a stale
    /// token is discovered by the first request that comes back 401.
    pub fn restore(&self) -> SessionState {
        let state = match self.store.load() {
            Some(stored) => {
                info!(target: "session", "restored session for user_id={} role={}", stored.user.id, stored.user.role);
                SessionState::Authenticated(stored.user)
            }
            None => SessionState::Anonymous,
        };
        {
            let mut g = self.cell.inner.write();
            g.state = state.clone();
            g.loading = false;
        }
        state
    }

    pub async fn login(&self, creds: &LoginRequest) -> ClientResult<UserProfile> {
        let resp = services::auth::login(&self.gateway, creds).await?;
        if resp.access_token.trim().is_empty() {
            return Err(ClientError::auth_rejected("login response did not include an access token"));
        }
        self.store.save(&resp.access_token, &resp.user)?;
        self.cell.set(SessionState::Authenticated(resp.user.clone()));
        info!(target: "session", "logged in user_id={} role={}", resp.user.id, resp.user.role);
        Ok(resp.user)
    }

    /// Create an account. Does not log the new user in.
    pub async fn register(&self, req: &RegisterRequest) -> ClientResult<RegisterResponse> {
        services::auth::register(&self.gateway, req).await
    }

    /// Always ends Anonymous; a store failure is reported after the transition.
    pub fn logout(&self) -> ClientResult<()> {
        let cleared = self.store.clear();
        self.cell.set(SessionState::Anonymous);
        match cleared {
            Ok(()) => {
                info!(target: "session", "logged out");
                Ok(())
            }
            Err(e) => {
                warn!(target: "session", "logout could not clear token store: {}", e);
                Err(e.into())
            }
        }
    }

    /// Session ended by the server. Idempotent; store failures are only logged.
    pub fn expire(&self) {
        if let Err(e) = self.store.clear() {
            warn!(target: "session", "could not clear token store on expiry: {}", e);
        }
        if self.cell.expire() {
            info!(target: "session", "session expired");
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> { self.cell.current_user() }

    pub fn is_authenticated(&self) -> bool { self.cell.state().is_authenticated() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryTokenStore, Role};
    use reqwest::Url;

    fn officer() -> UserProfile {
        UserProfile { id: 7, name: "Ravi".into(), email: "ravi@city.gov".into(), role: Role::Officer, ward: Some("Ward 1".into()) }
    }

    fn controller(store: Arc<MemoryTokenStore>) -> SessionController {
        let cell = SessionCell::new();
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let gw = ApiGateway::new(base, store.clone(), Arc::new(|| {})).unwrap();
        SessionController::new(store, cell, gw)
    }

    #[test]
    fn restore_reflects_store_and_clears_loading() {
        let store = Arc::new(MemoryTokenStore::new());
        let c = controller(store.clone());
        assert!(c.cell().is_loading());
        assert_eq!(c.restore(), SessionState::Anonymous);
        assert!(!c.cell().is_loading());

        store.save("t", &officer()).unwrap();
        let c2 = controller(store);
        assert_eq!(c2.restore(), SessionState::Authenticated(officer()));
        assert_eq!(c2.current_user().map(|u| u.role), Some(Role::Officer));
    }

    #[test]
    fn logout_is_idempotent() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save("t", &officer()).unwrap();
        let c = controller(store.clone());
        c.restore();
        c.logout().unwrap();
        assert!(!c.is_authenticated());
        assert!(store.load().is_none());
        c.logout().unwrap();
        assert_eq!(c.cell().state(), SessionState::Anonymous);
    }

    #[test]
    fn expire_clears_store_and_state() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save("t", &officer()).unwrap();
        let c = controller(store.clone());
        c.restore();
        c.expire();
        assert!(store.load().is_none());
        assert!(!c.is_authenticated());
        assert!(!c.cell().expire());
        c.expire();
    }
}
