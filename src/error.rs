//! Unified client error model.
//! Every fallible operation in the crate returns `ClientError`; the variants mirror the
//! failure classes a caller has to tell apart (expired session, rejected credentials,
//! other HTTP failures, transport, decoding, local storage).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientError {
    AuthExpired { code: String, message: String },
    AuthRejected { code: String, message: String },
    SearchSourceUnavailable { code: String, message: String },
    Http { status: u16, code: String, message: String },
    Network { code: String, message: String },
    Decode { code: String, message: String },
    Storage { code: String, message: String },
    Config { code: String, message: String },
    Internal { code: String, message: String },
}

impl ClientError {
    pub fn code_str(&self) -> &str {
        match self {
            ClientError::AuthExpired { code, .. }
            | ClientError::AuthRejected { code, .. }
            | ClientError::SearchSourceUnavailable { code, .. }
            | ClientError::Http { code, .. }
            | ClientError::Network { code, .. }
            | ClientError::Decode { code, .. }
            | ClientError::Storage { code, .. }
            | ClientError::Config { code, .. }
            | ClientError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ClientError::AuthExpired { message, .. }
            | ClientError::AuthRejected { message, .. }
            | ClientError::SearchSourceUnavailable { message, .. }
            | ClientError::Http { message, .. }
            | ClientError::Network { message, .. }
            | ClientError::Decode { message, .. }
            | ClientError::Storage { message, .. }
            | ClientError::Config { message, .. }
            | ClientError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn auth_expired() -> Self {
        ClientError::AuthExpired { code: "session_expired".into(), message: "session expired, please log in again".into() }
    }
    pub fn auth_rejected<S: Into<String>>(msg: S) -> Self { ClientError::AuthRejected { code: "auth_rejected".into(), message: msg.into() } }
    pub fn source_unavailable<S: Into<String>>(code: S, msg: S) -> Self { ClientError::SearchSourceUnavailable { code: code.into(), message: msg.into() } }
    pub fn http<S: Into<String>>(status: u16, msg: S) -> Self { ClientError::Http { status, code: format!("http_{}", status), message: msg.into() } }
    pub fn network<S: Into<String>>(code: S, msg: S) -> Self { ClientError::Network { code: code.into(), message: msg.into() } }
    pub fn decode<S: Into<String>>(code: S, msg: S) -> Self { ClientError::Decode { code: code.into(), message: msg.into() } }
    pub fn storage<S: Into<String>>(code: S, msg: S) -> Self { ClientError::Storage { code: code.into(), message: msg.into() } }

    /// HTTP status this error corresponds to, for display and logging.
    /// Local failures (storage, config, decode) map to the status a server would use.
    pub fn http_status(&self) -> u16 {
        match self {
            ClientError::AuthExpired { .. } => 401,
            ClientError::AuthRejected { .. } => 401,
            ClientError::SearchSourceUnavailable { .. } => 503,
            ClientError::Http { status, .. } => *status,
            ClientError::Network { .. } => 503,
            ClientError::Decode { .. } => 502,
            ClientError::Storage { .. } => 500,
            ClientError::Config { .. } => 400,
            ClientError::Internal { .. } => 500,
        }
    }

    pub fn is_auth_expired(&self) -> bool { matches!(self, ClientError::AuthExpired { .. }) }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for ClientError {}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::Decode { code: "decode_error".into(), message: err.to_string() };
        }
        let code = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect_failed"
        } else {
            "network_error"
        };
        ClientError::Network { code: code.into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode { code: "json_error".into(), message: err.to_string() }
    }
}

impl From<anyhow::Error> for ClientError {
    fn from(err: anyhow::Error) -> Self {
        ClientError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

/// Pull a displayable message out of a backend error body.
///
/// The backend reports failures as `{"detail": ...}` where `detail` is either a string
/// or a list of validation entries carrying a `msg` field. Anything else falls back to
/// the JSON text of `detail`, then to `fallback`.
pub fn extract_detail(body: &Value, fallback: &str) -> String {
    match body.get("detail") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|e| match e.get("msg").and_then(|m| m.as_str()) {
                Some(m) => m.to_string(),
                None => e.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
        None => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_status_mapping() {
        assert_eq!(ClientError::auth_expired().http_status(), 401);
        assert_eq!(ClientError::auth_rejected("bad password").http_status(), 401);
        assert_eq!(ClientError::http(404, "missing").http_status(), 404);
        assert_eq!(ClientError::http(500, "boom").http_status(), 500);
        assert_eq!(ClientError::network("timeout", "slow").http_status(), 503);
        assert_eq!(ClientError::decode("json_error", "bad").http_status(), 502);
        assert_eq!(ClientError::storage("io_error", "disk").http_status(), 500);
        let cfg = ClientError::Config { code: "invalid_api_url".into(), message: "nope".into() };
        assert_eq!(cfg.http_status(), 400);
    }

    #[test]
    fn display_uses_code_and_message() {
        let e = ClientError::http(403, "Admin access required");
        assert_eq!(e.to_string(), "http_403: Admin access required");
        assert!(ClientError::auth_expired().is_auth_expired());
        assert!(!e.is_auth_expired());
    }

    #[test]
    fn detail_string_array_and_missing() {
        assert_eq!(extract_detail(&json!({"detail": "Email already registered"}), "x"), "Email already registered");
        let arr = json!({"detail": [{"msg": "field required"}, {"msg": "value is not a valid email"}]});
        assert_eq!(extract_detail(&arr, "x"), "field required, value is not a valid email");
        assert_eq!(extract_detail(&json!({"detail": {"k": 1}}), "x"), "{\"k\":1}");
        assert_eq!(extract_detail(&json!({"other": 1}), "Bad Request"), "Bad Request");
    }
}
