//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};

use super::AppState;
use super::types::{
    ErrorResponse, HealthResponse, JobCreated, ListQuery, MessageResponse, NewJob, SocResponse,
};
use crate::db::Database;
use crate::error::DbError;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn database(state: &AppState) -> Result<&Arc<Database>, ApiError> {
    state
        .db
        .as_ref()
        .ok_or_else(|| error(StatusCode::SERVICE_UNAVAILABLE, "database not attached"))
}

fn db_error(e: DbError) -> ApiError {
    warn!(error = %e, "database request failed");
    error(StatusCode::INTERNAL_SERVER_ERROR, "database error")
}

/// Returns the latest posted state.
///
/// `GET /soc` → 200 + `{"state": ...}`, or 404 + `{"error": "No data available"}`
pub async fn get_soc(State(state): State<Arc<AppState>>) -> Response {
    match state.latest.read().await.clone() {
        Some(latest) => Json(SocResponse { state: latest }).into_response(),
        None => error(StatusCode::NOT_FOUND, "No data available").into_response(),
    }
}

/// Replaces the latest state with the `data` member of the body.
///
/// `POST /insert` with `{"data": ...}` → 201 + `{"message": "Inserted!"}`
/// Anything else (no JSON, not an object, no `data` key) → 400 + `{"error": "Invalid request"}`
///
/// A `null` payload clears the state.
pub async fn post_insert(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let data = match body {
        Ok(Json(Value::Object(mut map))) if !map.is_empty() => map.remove("data"),
        Ok(_) => None,
        Err(rejection) => {
            debug!(%rejection, "rejected insert body");
            None
        }
    };

    let Some(data) = data else {
        return error(StatusCode::BAD_REQUEST, "Invalid request").into_response();
    };

    *state.latest.write().await = if data.is_null() { None } else { Some(data) };
    (
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Inserted!".to_string(),
        }),
    )
        .into_response()
}

/// Returns state-of-charge samples, newest first.
///
/// `GET /soc/history?grid=ES10&limit=50` → 200 + `Vec<SocRecord>`; 503 without a database
pub async fn get_soc_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = database(&state).and_then(|db| {
        db.soc_history(query.grid.as_deref(), query.limit())
            .map_err(db_error)
    });
    match result {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Returns job rows, newest first.
///
/// `GET /jobs?grid=ES10&limit=50` → 200 + `Vec<JobRecord>`; 503 without a database
pub async fn get_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let result = database(&state)
        .and_then(|db| db.list_jobs(query.grid.as_deref(), query.limit()).map_err(db_error));
    match result {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Records a job sample that the dispatch loop will pick up as node load.
///
/// `POST /jobs` with `{"gridname", "load", "completed_at"?}` → 201 + `{"id": N}`
/// Invalid body → 400; no database → 503
pub async fn post_job(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewJob>, JsonRejection>,
) -> Response {
    let result = insert_job(&state, body);
    match result {
        Ok(id) => (StatusCode::CREATED, Json(JobCreated { id })).into_response(),
        Err(e) => e.into_response(),
    }
}

fn insert_job(state: &AppState, body: Result<Json<NewJob>, JsonRejection>) -> Result<i64, ApiError> {
    let db = database(state)?;
    let Json(job) = body.map_err(|r| error(StatusCode::BAD_REQUEST, r.body_text()))?;

    if job.gridname.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "gridname must not be empty"));
    }
    if !job.load.is_finite() || job.load < 0.0 {
        return Err(error(StatusCode::BAD_REQUEST, "load must be a non-negative number"));
    }
    if let Some(ts) = &job.completed_at {
        NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").map_err(|_| {
            error(
                StatusCode::BAD_REQUEST,
                "completed_at must be formatted as YYYY-MM-DD HH:MM:SS",
            )
        })?;
    }

    db.insert_job(&job.gridname, job.load, job.completed_at.as_deref())
        .map_err(db_error)
}

/// `GET /health` → 200 + `{"status": "ok"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;

    async fn call(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_db() -> Arc<AppState> {
        let db = Database::open_in_memory().unwrap();
        db.seed_demo().unwrap();
        Arc::new(AppState::new(Some(Arc::new(db))))
    }

    #[tokio::test]
    async fn soc_without_data_returns_404() {
        let (status, json) = call(router(Arc::new(AppState::new(None))), get("/soc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "No data available");
    }

    #[tokio::test]
    async fn insert_then_soc_returns_state() {
        let state = Arc::new(AppState::new(None));

        let (status, json) = call(
            router(state.clone()),
            post_json("/insert", r#"{"data": {"ES10": 0.5}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["message"], "Inserted!");

        let (status, json) = call(router(state), get("/soc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"]["ES10"], 0.5);
    }

    #[tokio::test]
    async fn insert_without_data_key_returns_400() {
        let state = Arc::new(AppState::new(None));
        for body in [r#"{"state": 1}"#, "{}", "[]", "42", "not json"] {
            let (status, json) = call(router(state.clone()), post_json("/insert", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(json["error"], "Invalid request");
        }
    }

    #[tokio::test]
    async fn insert_without_content_type_returns_400() {
        let req = Request::builder()
            .method("POST")
            .uri("/insert")
            .body(Body::from(r#"{"data": 1}"#))
            .unwrap();
        let (status, _) = call(router(Arc::new(AppState::new(None))), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn null_data_clears_state() {
        let state = Arc::new(AppState::new(None));
        call(router(state.clone()), post_json("/insert", r#"{"data": 1}"#)).await;
        let (status, _) = call(router(state.clone()), post_json("/insert", r#"{"data": null}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(router(state), get("/soc")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_without_database_returns_503() {
        let (status, json) =
            call(router(Arc::new(AppState::new(None))), get("/soc/history")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn history_filters_by_grid() {
        let state = with_db();
        if let Some(db) = &state.db {
            db.record_soc("ES10", 0.5).unwrap();
            db.record_soc("PT02", 0.4).unwrap();
        }
        let (status, json) = call(router(state), get("/soc/history?grid=PT02&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["gridname"], "PT02");
        assert_eq!(rows[0]["soc"], 0.4);
    }

    #[tokio::test]
    async fn jobs_round_trip() {
        let state = with_db();
        let (status, json) = call(
            router(state.clone()),
            post_json(
                "/jobs",
                r#"{"gridname":"ES10","load":42.0,"completed_at":"2025-04-03 11:00:00"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"], 4);

        let (status, json) = call(router(state), get("/jobs?grid=ES10")).await;
        assert_eq!(status, StatusCode::OK);
        let rows = json.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["load"], 42.0);
    }

    #[tokio::test]
    async fn invalid_job_returns_400() {
        let state = with_db();
        for body in [
            r#"{"gridname":"","load":1.0}"#,
            r#"{"gridname":"ES10","load":-1.0}"#,
            r#"{"gridname":"ES10","load":1.0,"completed_at":"yesterday"}"#,
            r#"{"gridname":"ES10"}"#,
        ] {
            let (status, _) = call(router(state.clone()), post_json("/jobs", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        }
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, json) = call(router(Arc::new(AppState::new(None))), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }
}
