//! Merged semantic search over complaints and announcements.
//!
//! Both backends score their own results; this module only tags, normalizes and merges.
//! The two calls run concurrently and are joined before merging. Source failures never
//! escape: a failed announcement call contributes nothing, a failed complaint call is
//! retried once on its own, and if that fails too the search yields no results.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{ClientError, ClientResult};
use crate::gateway::ApiGateway;
use crate::identity::UserProfile;
use crate::services::{self, AnnouncementRecord, ComplaintRecord, SearchQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Complaint,
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultPayload {
    Complaint { status: String, category: String, description: String, citizen_name: Option<String> },
    Announcement { title: String, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    /// Server-computed, clamped into [0, 1].
    pub relevance_score: f32,
    pub ward: Option<String>,
    /// `None` when the server sent no date or one that could not be parsed.
    pub date: Option<DateTime<Utc>>,
    pub payload: ResultPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Ward(String),
    Unscoped,
}

impl SearchScope {
    /// Citizens and officers search their own ward; admins search everything.
    pub fn for_user(user: &UserProfile) -> Self {
        match user.scoped_ward() {
            Some(w) if !w.is_empty() => SearchScope::Ward(w.to_string()),
            _ => SearchScope::Unscoped,
        }
    }

    pub fn ward(&self) -> Option<&str> {
        match self {
            SearchScope::Ward(w) => Some(w.as_str()),
            SearchScope::Unscoped => None,
        }
    }
}

/// The two independently scored search sources.
pub trait SearchBackend: Send + Sync {
    fn search_complaints(&self, q: &SearchQuery) -> impl Future<Output = ClientResult<Vec<ComplaintRecord>>> + Send;
    fn search_announcements(&self, q: &SearchQuery) -> impl Future<Output = ClientResult<Vec<AnnouncementRecord>>> + Send;
}

impl SearchBackend for ApiGateway {
    async fn search_complaints(&self, q: &SearchQuery) -> ClientResult<Vec<ComplaintRecord>> {
        Ok(services::complaints::search(self, q).await?.results)
    }

    async fn search_announcements(&self, q: &SearchQuery) -> ClientResult<Vec<AnnouncementRecord>> {
        Ok(services::announcements::search(self, q).await?.results)
    }
}

/// Merged results plus what had to be given up along the way.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// Failures absorbed while searching, as `SearchSourceUnavailable`.
    pub degraded: Vec<ClientError>,
    pub used_fallback: bool,
}

pub struct SearchAggregator<B> {
    backend: B,
    limit: u32,
    timeout: Option<Duration>,
}

impl<B: SearchBackend> SearchAggregator<B> {
    pub fn new(backend: B, limit: u32, timeout: Option<Duration>) -> Self {
        Self { backend, limit, timeout }
    }

    pub fn backend(&self) -> &B { &self.backend }

    pub async fn search(&self, query: &str, scope: &SearchScope) -> Vec<SearchResult> {
        self.search_detailed(query, scope).await.results
    }

    pub async fn search_detailed(&self, query: &str, scope: &SearchScope) -> SearchOutcome {
        let text = query.trim();
        if text.is_empty() {
            return SearchOutcome::default();
        }
        let q = SearchQuery { query: text.to_string(), ward: scope.ward().map(str::to_string), limit: self.limit };
        debug!(target: "search", "searching '{}' ward={:?} limit={}", q.query, q.ward, q.limit);

        let (complaints, announcements) = tokio::join!(
            self.bounded(self.backend.search_complaints(&q)),
            self.bounded(self.backend.search_announcements(&q)),
        );

        let mut out = SearchOutcome::default();
        match complaints {
            Ok(c) => {
                let announcements = match announcements {
                    Ok(a) => a,
                    Err(e) => {
                        warn!(target: "search", "announcement search unavailable, continuing without it: {}", e);
                        out.degraded.push(unavailable("announcements", &e));
                        Vec::new()
                    }
                };
                out.results = merge(c.into_iter().map(from_complaint).collect(), announcements.into_iter().map(from_announcement).collect());
            }
            Err(e) => {
                out.degraded.push(unavailable("complaints", &e));
                // announcements are dropped on this path; the fallback is complaint-only
                if e.is_auth_expired() {
                    warn!(target: "search", "complaint search hit an expired session; not retrying");
                    return out;
                }
                warn!(target: "search", "complaint search failed; retrying complaint-only");
                out.used_fallback = true;
                match self.bounded(self.backend.search_complaints(&q)).await {
                    Ok(c) => out.results = merge(c.into_iter().map(from_complaint).collect(), Vec::new()),
                    Err(e2) => {
                        error!(target: "search", "complaint-only fallback failed, returning no results: {}", e2);
                        out.degraded.push(unavailable("complaints", &e2));
                    }
                }
            }
        }
        out
    }

    // Applies the per-source timeout; an elapsed timer counts as a failed source.
    async fn bounded<T, F>(&self, fut: F) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        match self.timeout {
            None => fut.await,
            Some(d) => match tokio::time::timeout(d, fut).await {
                Ok(r) => r,
                Err(_) => Err(ClientError::Network { code: "search_timeout".into(), message: format!("no answer within {}ms", d.as_millis()) }),
            },
        }
    }
}

fn unavailable(source: &str, e: &ClientError) -> ClientError {
    ClientError::source_unavailable(format!("{}_unavailable", source), format!("{} search: {}", source, e))
}

/// Concatenate complaints then announcements and sort by descending relevance.
/// The sort is stable, so equal scores keep that source order.
pub fn merge(mut complaints: Vec<SearchResult>, announcements: Vec<SearchResult>) -> Vec<SearchResult> {
    complaints.extend(announcements);
    complaints.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    complaints
}

pub fn from_complaint(c: ComplaintRecord) -> SearchResult {
    SearchResult {
        id: c.id,
        kind: ResultKind::Complaint,
        relevance_score: clamp_score(c.relevance_score),
        ward: c.ward,
        date: c.date.as_deref().and_then(parse_date),
        payload: ResultPayload::Complaint {
            status: c.status,
            category: c.category,
            description: c.description,
            citizen_name: c.citizen_name,
        },
    }
}

pub fn from_announcement(a: AnnouncementRecord) -> SearchResult {
    SearchResult {
        id: a.id,
        kind: ResultKind::Announcement,
        relevance_score: clamp_score(a.relevance_score),
        ward: a.ward,
        date: a.date.as_deref().and_then(parse_date),
        payload: ResultPayload::Announcement { title: a.title, body: a.message },
    }
}

fn clamp_score(score: Option<f32>) -> f32 {
    match score {
        // NaN and -0.0 both collapse to 0.0 so ties sort by source order
        Some(s) if s.is_nan() || s <= 0.0 => 0.0,
        Some(s) => s.clamp(0.0, 1.0),
        None => 0.0,
    }
}

/// Accepts RFC 3339 and the naive ISO timestamps the backend emits (assumed UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    debug!(target: "search", "unparseable result date '{}'", raw);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn complaint(id: i64, score: f32) -> ComplaintRecord {
        ComplaintRecord {
            id,
            ward: Some("Ward 3".into()),
            category: "Water Supply".into(),
            description: format!("leak #{}", id),
            status: "pending".into(),
            date: Some("2024-05-01T10:00:00".into()),
            citizen_name: None,
            relevance_score: Some(score),
        }
    }

    fn announcement(id: i64, score: f32) -> AnnouncementRecord {
        AnnouncementRecord {
            id,
            ward: Some("Ward 3".into()),
            title: "Pipe maintenance".into(),
            message: "Repairs on Main St".into(),
            date: Some("2024-05-02T08:30:00.250".into()),
            relevance_score: Some(score),
        }
    }

    #[derive(Clone, Copy)]
    enum Script {
        Ok,
        Fail,
        FailOnce,
        Expired,
    }

    struct FakeBackend {
        complaints: Vec<ComplaintRecord>,
        announcements: Vec<AnnouncementRecord>,
        complaint_script: Script,
        announcement_script: Script,
        complaint_calls: Arc<AtomicUsize>,
        seen_ward: parking_lot::Mutex<Option<Option<String>>>,
    }

    impl FakeBackend {
        fn new(complaints: Vec<ComplaintRecord>, announcements: Vec<AnnouncementRecord>) -> Self {
            Self {
                complaints,
                announcements,
                complaint_script: Script::Ok,
                announcement_script: Script::Ok,
                complaint_calls: Arc::new(AtomicUsize::new(0)),
                seen_ward: parking_lot::Mutex::new(None),
            }
        }
    }

    impl SearchBackend for FakeBackend {
        async fn search_complaints(&self, q: &SearchQuery) -> ClientResult<Vec<ComplaintRecord>> {
            *self.seen_ward.lock() = Some(q.ward.clone());
            let n = self.complaint_calls.fetch_add(1, Ordering::SeqCst);
            match self.complaint_script {
                Script::Ok => Ok(self.complaints.clone()),
                Script::Fail => Err(ClientError::http(500, "embedding service down")),
                Script::FailOnce if n == 0 => Err(ClientError::http(502, "bad gateway")),
                Script::FailOnce => Ok(self.complaints.clone()),
                Script::Expired => Err(ClientError::auth_expired()),
            }
        }

        async fn search_announcements(&self, _q: &SearchQuery) -> ClientResult<Vec<AnnouncementRecord>> {
            match self.announcement_script {
                Script::Ok => Ok(self.announcements.clone()),
                _ => Err(ClientError::network("connect_failed", "refused")),
            }
        }
    }

    #[tokio::test]
    async fn water_leak_scenario_interleaves_by_score() {
        let fake = FakeBackend::new(vec![complaint(1, 0.9), complaint(2, 0.4)], vec![announcement(10, 0.7)]);
        let agg = SearchAggregator::new(fake, 5, None);
        let out = agg.search("water leak", &SearchScope::Ward("Ward 3".into())).await;
        let got: Vec<(ResultKind, f32)> = out.iter().map(|r| (r.kind, r.relevance_score)).collect();
        assert_eq!(got, vec![(ResultKind::Complaint, 0.9), (ResultKind::Announcement, 0.7), (ResultKind::Complaint, 0.4)]);
        assert_eq!(*agg.backend().seen_ward.lock(), Some(Some("Ward 3".to_string())));
    }

    #[tokio::test]
    async fn announcement_failure_keeps_all_complaints() {
        let mut fake = FakeBackend::new(vec![complaint(1, 0.3), complaint(2, 0.8), complaint(3, 0.5)], vec![announcement(10, 0.9)]);
        fake.announcement_script = Script::Fail;
        let agg = SearchAggregator::new(fake, 5, None);
        let out = agg.search_detailed("street light", &SearchScope::Unscoped).await;
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.kind == ResultKind::Complaint));
        assert_eq!(out.degraded.len(), 1);
        assert_eq!(out.degraded[0].code_str(), "announcements_unavailable");
        assert!(!out.used_fallback);
    }

    #[tokio::test]
    async fn complaint_failure_retries_complaint_only() {
        let mut fake = FakeBackend::new(vec![complaint(1, 0.6)], vec![announcement(10, 0.9)]);
        fake.complaint_script = Script::FailOnce;
        let calls = fake.complaint_calls.clone();
        let agg = SearchAggregator::new(fake, 5, None);
        let out = agg.search_detailed("garbage", &SearchScope::Unscoped).await;
        assert!(out.used_fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].kind, ResultKind::Complaint);
    }

    #[tokio::test]
    async fn both_complaint_attempts_failing_yields_empty() {
        let mut fake = FakeBackend::new(vec![complaint(1, 0.6)], vec![announcement(10, 0.9)]);
        fake.complaint_script = Script::Fail;
        let agg = SearchAggregator::new(fake, 5, None);
        let out = agg.search_detailed("garbage", &SearchScope::Unscoped).await;
        assert!(out.results.is_empty());
        assert_eq!(out.degraded.len(), 2);
    }

    #[tokio::test]
    async fn expired_session_skips_complaint_retry() {
        let mut fake = FakeBackend::new(vec![complaint(1, 0.6)], vec![]);
        fake.complaint_script = Script::Expired;
        let calls = fake.complaint_calls.clone();
        let agg = SearchAggregator::new(fake, 5, None);
        let out = agg.search_detailed("garbage", &SearchScope::Unscoped).await;
        assert!(out.results.is_empty());
        assert!(!out.used_fallback);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.degraded.len(), 1);
        assert_eq!(out.degraded[0].code_str(), "complaints_unavailable");
    }

    #[tokio::test]
    async fn blank_query_skips_backends() {
        let fake = FakeBackend::new(vec![complaint(1, 0.6)], vec![]);
        let calls = fake.complaint_calls.clone();
        let agg = SearchAggregator::new(fake, 5, None);
        assert!(agg.search("   ", &SearchScope::Unscoped).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    struct SlowAnnouncements;

    impl SearchBackend for SlowAnnouncements {
        async fn search_complaints(&self, _q: &SearchQuery) -> ClientResult<Vec<ComplaintRecord>> {
            Ok(vec![complaint(1, 0.5)])
        }
        async fn search_announcements(&self, _q: &SearchQuery) -> ClientResult<Vec<AnnouncementRecord>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![announcement(2, 0.9)])
        }
    }

    #[tokio::test]
    async fn hung_source_is_cut_off_by_timeout() {
        let agg = SearchAggregator::new(SlowAnnouncements, 5, Some(Duration::from_millis(200)));
        let out = agg.search_detailed("noise", &SearchScope::Unscoped).await;
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.degraded.len(), 1);
        assert!(out.degraded[0].message().contains("no answer within 200ms"));
    }

    #[test]
    fn merge_is_stable_and_clamps() {
        let c = vec![from_complaint(complaint(1, 0.5)), from_complaint(complaint(2, 1.7))];
        let a = vec![from_announcement(announcement(3, 0.5)), from_announcement(announcement(4, f32::NAN))];
        let merged = merge(c, a);
        let ids: Vec<i64> = merged.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
        assert_eq!(merged[0].relevance_score, 1.0);
        assert_eq!(merged[3].relevance_score, 0.0);
        for w in merged.windows(2) {
            assert!(w[0].relevance_score >= w[1].relevance_score);
        }
    }

    #[test]
    fn negative_zero_ties_keep_complaints_first() {
        let c = vec![from_complaint(complaint(1, -0.0))];
        let a = vec![from_announcement(announcement(2, 0.0))];
        let merged = merge(c, a);
        assert_eq!(merged.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(merged[0].relevance_score.is_sign_positive());
        assert_eq!(from_complaint(complaint(3, -0.4)).relevance_score, 0.0);
    }

    #[test]
    fn dates_in_backend_formats() {
        assert!(parse_date("2024-05-01T10:00:00").is_some());
        assert!(parse_date("2024-05-01T10:00:00.123456").is_some());
        assert!(parse_date("2024-05-01T10:00:00+05:30").is_some());
        assert!(parse_date("2024-05-01").is_some());
        assert!(parse_date("yesterday").is_none());
    }

    #[test]
    fn scope_follows_role() {
        use crate::identity::Role;
        let mut u = UserProfile { id: 1, name: "A".into(), email: "a@x".into(), role: Role::Officer, ward: Some("Ward 2".into()) };
        assert_eq!(SearchScope::for_user(&u), SearchScope::Ward("Ward 2".into()));
        u.role = Role::Admin;
        assert_eq!(SearchScope::for_user(&u), SearchScope::Unscoped);
    }
}
