//! Single outbound pipeline to the backend.
//!
//! Every request reads the token store and carries the token as a bearer credential when
//! one exists. Every response is inspected: a 401 on an authenticated request clears the
//! store and fires the expiry hook before the error is handed back, so callers never need
//! their own 401 branch.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{extract_detail, ClientError, ClientResult};
use crate::identity::TokenStore;

/// Called once per detected session expiry, after the token store was cleared.
pub type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Regular call: 401 means the session is gone.
    Authenticated,
    /// Login/register: 401 and validation failures mean the submitted credentials were refused.
    Credential,
}

#[derive(Clone)]
pub struct ApiGateway {
    base: Url,
    client: reqwest::Client,
    store: Arc<dyn TokenStore>,
    on_expired: ExpiryHook,
}

impl ApiGateway {
    pub fn new(base: Url, store: Arc<dyn TokenStore>, on_expired: ExpiryHook) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder().default_headers(headers).build()?;
        Ok(Self::with_client(base, client, store, on_expired))
    }

    pub fn with_client(base: Url, client: reqwest::Client, store: Arc<dyn TokenStore>, on_expired: ExpiryHook) -> Self {
        Self { base, client, store, on_expired }
    }

    pub fn base(&self) -> &Url { &self.base }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send::<(), T>(Method::GET, path, &[], None, RequestMode::Authenticated).await
    }

    pub async fn get_json_with_query<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ClientResult<T> {
        self.send::<(), T>(Method::GET, path, query, None, RequestMode::Authenticated).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(Method::POST, path, &[], Some(body), RequestMode::Authenticated).await
    }

    pub async fn post_credentials<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send(Method::POST, path, &[], Some(body), RequestMode::Credential).await
    }

    pub async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        mode: RequestMode,
    ) -> ClientResult<T> {
        let url = self.endpoint(path)?;
        debug!(target: "gateway", "{} {}", method, url);
        let mut req = self.client.request(method, url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(token) = self.store.token() {
            req = req.bearer_auth(token);
        }
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED && mode == RequestMode::Authenticated {
            self.expire(path);
            return Err(ClientError::auth_expired());
        }
        if !status.is_success() {
            let val: Value = resp.json().await.unwrap_or(Value::Null);
            let msg = extract_detail(&val, status.canonical_reason().unwrap_or("request failed"));
            if mode == RequestMode::Credential && is_credential_rejection(status) {
                return Err(ClientError::auth_rejected(msg));
            }
            return Err(ClientError::http(status.as_u16(), msg));
        }

        let bytes = resp.bytes().await?;
        let parsed = if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            serde_json::from_slice(b"null")
        } else {
            serde_json::from_slice(&bytes)
        };
        parsed.map_err(|e| ClientError::Decode { code: "unexpected_body".into(), message: format!("{}: {}", path, e) })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Config { code: "invalid_endpoint".into(), message: format!("{}: {}", path, e) })
    }

    // Clear first, then notify, so the hook observes an empty store.
    fn expire(&self, path: &str) {
        if let Err(e) = self.store.clear() {
            warn!(target: "gateway", "failed to clear token store after 401: {}", e);
        }
        info!(target: "gateway", "401 from {}; session cleared", path);
        (self.on_expired)();
    }
}

fn is_credential_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::UNPROCESSABLE_ENTITY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::MemoryTokenStore;

    #[test]
    fn endpoint_keeps_base_prefix() {
        let store = Arc::new(MemoryTokenStore::new());
        let gw = ApiGateway::new(Url::parse("http://h:1/api/").unwrap(), store, Arc::new(|| {})).unwrap();
        assert_eq!(gw.endpoint("/login").unwrap().as_str(), "http://h:1/api/login");
        assert_eq!(gw.endpoint("getSimilarIssues/4").unwrap().as_str(), "http://h:1/api/getSimilarIssues/4");
    }

    #[test]
    fn credential_rejection_statuses() {
        assert!(is_credential_rejection(StatusCode::UNAUTHORIZED));
        assert!(is_credential_rejection(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_credential_rejection(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
