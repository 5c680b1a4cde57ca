//! Typed wrappers over the backend endpoints.
//!
//! All calls go through [`ApiGateway`]; nothing here talks to the network directly.
//! Request and response structs describe only the fields this client reads or sends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientResult;
use crate::gateway::ApiGateway;
use crate::identity::{Role, UserProfile};

pub mod endpoints {
    pub const REGISTER: &str = "registerUser";
    pub const LOGIN: &str = "login";
    pub const SUBMIT_COMPLAINT: &str = "submitComplaint";
    pub const SEARCH_COMPLAINTS: &str = "searchComplaints";
    pub const SIMILAR_ISSUES: &str = "getSimilarIssues";
    pub const UPDATE_STATUS: &str = "updateComplaintStatus";
    pub const DASHBOARD: &str = "getDashboardData";
    pub const SUMMARY: &str = "getSummary";
    pub const ANNOUNCEMENTS: &str = "announcements";
    pub const SEARCH_ANNOUNCEMENTS: &str = "searchAnnouncements";
    pub const SUBMIT_REPORT: &str = "submitReport";
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub ward: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Pending => "pending",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "pending" => Ok(ComplaintStatus::Pending),
            "in_progress" => Ok(ComplaintStatus::InProgress),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "rejected" => Ok(ComplaintStatus::Rejected),
            other => Err(format!("unknown complaint status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComplaint {
    pub ward: String,
    pub category: String,
    pub description: String,
}

/// Complaint as returned by search, submit and similarity endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplaintRecord {
    pub id: i64,
    #[serde(default)]
    pub ward: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub citizen_name: Option<String>,
    #[serde(default, alias = "similarity_score")]
    pub relevance_score: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AnnouncementRecord {
    pub id: i64,
    #[serde(default)]
    pub ward: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "body")]
    pub message: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitComplaintResponse {
    #[serde(default)]
    pub message: String,
    pub complaint_id: i64,
    #[serde(default)]
    pub similar_complaints: Vec<ComplaintRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarIssues {
    #[serde(default)]
    pub complaint_id: Option<i64>,
    #[serde(default, alias = "similar_complaints", alias = "results")]
    pub similar_issues: Vec<ComplaintRecord>,
}

/// Body shared by both semantic search endpoints. `ward: null` means unscoped.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub ward: Option<String>,
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_found: Option<usize>,
}

pub mod auth {
    use super::*;

    pub async fn register(gw: &ApiGateway, req: &RegisterRequest) -> ClientResult<RegisterResponse> {
        gw.post_credentials(endpoints::REGISTER, req).await
    }

    pub async fn login(gw: &ApiGateway, req: &LoginRequest) -> ClientResult<LoginResponse> {
        gw.post_credentials(endpoints::LOGIN, req).await
    }
}

pub mod complaints {
    use super::*;

    pub async fn submit(gw: &ApiGateway, complaint: &NewComplaint) -> ClientResult<SubmitComplaintResponse> {
        gw.post_json(endpoints::SUBMIT_COMPLAINT, complaint).await
    }

    pub async fn search(gw: &ApiGateway, q: &SearchQuery) -> ClientResult<SearchEnvelope<ComplaintRecord>> {
        gw.post_json(endpoints::SEARCH_COMPLAINTS, q).await
    }

    pub async fn similar(gw: &ApiGateway, complaint_id: i64) -> ClientResult<SimilarIssues> {
        gw.get_json(&format!("{}/{}", endpoints::SIMILAR_ISSUES, complaint_id)).await
    }

    pub async fn update_status(gw: &ApiGateway, complaint_id: i64, status: ComplaintStatus) -> ClientResult<Value> {
        let body = serde_json::json!({ "complaint_id": complaint_id, "status": status });
        gw.post_json(endpoints::UPDATE_STATUS, &body).await
    }
}

pub mod dashboard {
    use super::*;

    /// Role-specific aggregate; shape is owned by the server.
    pub async fn data(gw: &ApiGateway) -> ClientResult<Value> { gw.get_json(endpoints::DASHBOARD).await }

    pub async fn summary(gw: &ApiGateway) -> ClientResult<Value> { gw.get_json(endpoints::SUMMARY).await }
}

pub mod announcements {
    use super::*;

    pub async fn list(gw: &ApiGateway, ward: Option<&str>, limit: u32) -> ClientResult<Vec<AnnouncementRecord>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(w) = ward.filter(|w| !w.is_empty()) {
            query.push(("ward", w.to_string()));
        }
        query.push(("limit", limit.to_string()));
        gw.get_json_with_query(endpoints::ANNOUNCEMENTS, &query).await
    }

    pub async fn search(gw: &ApiGateway, q: &SearchQuery) -> ClientResult<SearchEnvelope<AnnouncementRecord>> {
        gw.post_json(endpoints::SEARCH_ANNOUNCEMENTS, q).await
    }
}

pub mod reports {
    use super::*;

    pub async fn submit(gw: &ApiGateway, report: &Value) -> ClientResult<Value> {
        gw.post_json(endpoints::SUBMIT_REPORT, report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_lenient() {
        assert_eq!("In Progress".parse::<ComplaintStatus>().unwrap(), ComplaintStatus::InProgress);
        assert_eq!("in-progress".parse::<ComplaintStatus>().unwrap(), ComplaintStatus::InProgress);
        assert_eq!(serde_json::to_string(&ComplaintStatus::InProgress).unwrap(), "\"in_progress\"");
        assert!("closed".parse::<ComplaintStatus>().is_err());
    }

    #[test]
    fn search_query_sends_null_ward_when_unscoped() {
        let q = SearchQuery { query: "pothole".into(), ward: None, limit: 5 };
        assert_eq!(serde_json::to_value(&q).unwrap(), serde_json::json!({"query": "pothole", "ward": null, "limit": 5}));
    }

    #[test]
    fn records_accept_server_field_variants() {
        let c: ComplaintRecord = serde_json::from_str(
            r#"{"id":3,"description":"no water","category":"Water Supply","status":"pending","date":"2024-05-01T10:00:00","similarity_score":0.82}"#,
        ).unwrap();
        assert_eq!(c.relevance_score, Some(0.82));
        assert_eq!(c.ward, None);

        let a: AnnouncementRecord = serde_json::from_str(
            r#"{"id":1,"ward":"all","title":"Water cut","body":"Tuesday 10-2","date":"2024-05-02T08:00:00"}"#,
        ).unwrap();
        assert_eq!(a.message, "Tuesday 10-2");

        let s: SimilarIssues = serde_json::from_str(r#"{"complaint_id":3,"similar_issues":[]}"#).unwrap();
        assert!(s.similar_issues.is_empty());
        let env: SearchEnvelope<ComplaintRecord> = serde_json::from_str(r#"{"query":"x"}"#).unwrap();
        assert!(env.results.is_empty());
    }

    #[test]
    fn complaint_responses_render_as_json() {
        let resp: SubmitComplaintResponse = serde_json::from_str(
            r#"{"message":"ok","complaint_id":21,"similar_complaints":[{"id":1,"category":"Water","description":"leak","status":"pending","similarity_score":0.88}]}"#,
        ).unwrap();
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["complaint_id"], 21);
        assert_eq!(v["similar_complaints"][0]["relevance_score"].as_f64().map(|f| (f * 100.0).round()), Some(88.0));

        let s: SimilarIssues = serde_json::from_str(r#"{"complaint_id":3,"results":[{"id":4}]}"#).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["similar_issues"][0]["id"], 4);
    }
}
