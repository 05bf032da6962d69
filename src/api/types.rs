//! API request, response and query types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default row count for history and job listings.
pub const DEFAULT_LIMIT: usize = 100;
/// Upper bound on rows returned by one listing.
pub const MAX_LIMIT: usize = 1000;

/// `GET /soc` body: the latest posted state, verbatim.
#[derive(Debug, Serialize)]
pub struct SocResponse {
    pub state: Value,
}

/// `POST /insert` success body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error response body for 4xx/5xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Optional filters for the history and job listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Restrict to one grid name.
    pub grid: Option<String>,
    /// Maximum rows, newest first (default 100, capped at 1000).
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }
}

/// `POST /jobs` body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewJob {
    pub gridname: String,
    /// CPU utilisation (percent).
    pub load: f64,
    /// `YYYY-MM-DD HH:MM:SS`; omitted for running jobs.
    pub completed_at: Option<String>,
}

/// `POST /jobs` success body.
#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(ListQuery::default().limit(), DEFAULT_LIMIT);
        let q = ListQuery {
            grid: None,
            limit: Some(5000),
        };
        assert_eq!(q.limit(), MAX_LIMIT);
    }

    #[test]
    fn new_job_rejects_unknown_fields() {
        let ok: Result<NewJob, _> =
            serde_json::from_str(r#"{"gridname":"ES10","load":7.5}"#);
        assert!(ok.is_ok());
        let bad: Result<NewJob, _> =
            serde_json::from_str(r#"{"gridname":"ES10","load":7.5,"cpu":1}"#);
        assert!(bad.is_err());
    }
}
