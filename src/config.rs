//! Client configuration loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use tracing::warn;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
pub const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ANNOUNCEMENT_LIMIT: u32 = 10;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub session_file: PathBuf,
    pub search_limit: u32,
    /// Per-source search timeout; `None` leaves calls bounded only by the transport.
    pub search_timeout: Option<Duration>,
    pub announcement_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            session_file: default_session_file(),
            search_limit: DEFAULT_SEARCH_LIMIT,
            search_timeout: Some(Duration::from_millis(DEFAULT_SEARCH_TIMEOUT_MS)),
            announcement_limit: DEFAULT_ANNOUNCEMENT_LIMIT,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary key lookup so tests do not have to touch process env.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let mut cfg = ClientConfig::default();
        if let Some(url) = get("CIVICDESK_API_URL").filter(|s| !s.trim().is_empty()) {
            cfg.api_url = url.trim().to_string();
        }
        if let Some(p) = get("CIVICDESK_SESSION_FILE").filter(|s| !s.trim().is_empty()) {
            cfg.session_file = PathBuf::from(p);
        }
        cfg.search_limit = parse_or(&get, "CIVICDESK_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT);
        cfg.announcement_limit = parse_or(&get, "CIVICDESK_ANNOUNCEMENT_LIMIT", DEFAULT_ANNOUNCEMENT_LIMIT);
        let timeout_ms = parse_or(&get, "CIVICDESK_SEARCH_TIMEOUT_MS", DEFAULT_SEARCH_TIMEOUT_MS);
        cfg.search_timeout = if timeout_ms == 0 { None } else { Some(Duration::from_millis(timeout_ms)) };
        cfg
    }

    /// Parsed base URL. Always ends with a slash so relative joins keep any path prefix.
    pub fn base_url(&self) -> ClientResult<Url> {
        let raw = if self.api_url.ends_with('/') { self.api_url.clone() } else { format!("{}/", self.api_url) };
        Url::parse(&raw).map_err(|e| ClientError::Config { code: "invalid_api_url".into(), message: format!("{}: {}", self.api_url, e) })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target: "config", "ignoring invalid {}='{}', using {}", key, raw, default);
                default
            }
        },
    }
}

fn default_session_file() -> PathBuf {
    let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")).ok();
    match home {
        Some(h) => PathBuf::from(h).join(".civicdesk").join("session.json"),
        None => PathBuf::from(".civicdesk").join("session.json"),
    }
}
