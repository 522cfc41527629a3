//! Browser dashboard for Trends analysis.
//!
//! A single page talks to a small JSON API. An analysis runs as a background
//! task; the page polls `/api/state` until both phases have settled.

pub mod handlers;
pub mod page;

use crate::keywords::DEFAULT_DASHBOARD_KEYWORDS;
use crate::trends::{RelatedQueriesSet, RetryPolicy, TimeSeriesTable, TrendsSource};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Progress of one analysis phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Idle,
    Running,
    Complete,
    Error,
    Skipped,
}

/// Status and user-facing label of a phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub status: PhaseStatus,
    pub label: String,
}

impl Phase {
    fn idle() -> Self {
        Self::new(PhaseStatus::Idle, "")
    }

    fn new(status: PhaseStatus, label: impl Into<String>) -> Self {
        Self {
            status,
            label: label.into(),
        }
    }
}

/// Mutable dashboard session
#[derive(Debug, Clone)]
pub struct Session {
    pub keywords_input: String,
    pub running: bool,
    pub data_fetched: bool,
    pub last_keywords: Vec<String>,
    pub iot_phase: Phase,
    pub rq_phase: Phase,
    pub iot: Option<TimeSeriesTable>,
    pub rq: Option<RelatedQueriesSet>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            keywords_input: DEFAULT_DASHBOARD_KEYWORDS.to_string(),
            running: false,
            data_fetched: false,
            last_keywords: Vec::new(),
            iot_phase: Phase::idle(),
            rq_phase: Phase::idle(),
            iot: None,
            rq: None,
        }
    }
}

impl Session {
    /// Drop results and phase progress, keeping the keyword input.
    fn clear_results(&mut self) {
        self.data_fetched = false;
        self.last_keywords.clear();
        self.iot_phase = Phase::idle();
        self.rq_phase = Phase::idle();
        self.iot = None;
        self.rq = None;
    }
}

/// Shared dashboard state
pub struct DashboardState {
    pub session: RwLock<Session>,
    pub source: Arc<dyn TrendsSource>,
    pub policy: RetryPolicy,
}

impl DashboardState {
    pub fn new(source: Arc<dyn TrendsSource>, policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self {
            session: RwLock::new(Session::default()),
            source,
            policy,
        })
    }
}

/// Dashboard API errors
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl From<crate::error::MonitorError> for DashboardError {
    fn from(e: crate::error::MonitorError) -> Self {
        match e {
            crate::error::MonitorError::Validation(msg) => DashboardError::BadRequest(msg),
            crate::error::MonitorError::Spreadsheet(msg) => DashboardError::BadRequest(msg),
            crate::error::MonitorError::Csv(e) => DashboardError::BadRequest(e.to_string()),
            other => DashboardError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for DashboardError {
    fn from(rejection: JsonRejection) -> Self {
        DashboardError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match self {
            DashboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DashboardError::Conflict(_) => StatusCode::CONFLICT,
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the dashboard router.
pub fn router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/state", get(handlers::get_state))
        .route("/api/chart.svg", get(handlers::chart))
        .route("/api/report.xlsx", get(handlers::report))
        .route("/api/keywords/upload", post(handlers::upload_keywords))
        .route("/api/analyze", post(handlers::analyze))
        .route("/api/reset", post(handlers::reset))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(host: &str, port: u16, state: Arc<DashboardState>) -> crate::error::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| crate::error::MonitorError::Config(format!("Invalid host:port: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Dashboard listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::batch::tests::{day, no_delay, ScriptedSource};
    use crate::trends::{RelatedQueries, RelatedQuery};
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(source: ScriptedSource, policy: RetryPolicy) -> (Router, Arc<DashboardState>) {
        let state = DashboardState::new(Arc::new(source), policy);
        (router(Arc::clone(&state)), state)
    }

    fn scripted() -> ScriptedSource {
        let source = ScriptedSource::default();
        source.script_iot(
            "boho dress",
            vec![Ok(TimeSeriesTable::from_points("boho dress", vec![(day(1), 40), (day(8), 60)]))],
        );
        source.script_rq(
            "boho dress",
            vec![Ok(RelatedQueries {
                top: Some(vec![RelatedQuery { query: "boho maxi dress".into(), value: 100 }]),
                rising: None,
            })],
        );
        source
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body collects")
            .to_vec();
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn wait_until_idle(state: &DashboardState) {
        for _ in 0..200 {
            if !state.session.read().await.running {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("analysis did not finish");
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (app, _) = app_with(ScriptedSource::default(), no_delay(1));

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");

        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).expect("utf8");
        assert!(html.contains("Google Trends Market Analyzer"));
        assert!(html.contains("Last 12 months"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_keywords() {
        let (app, _) = app_with(ScriptedSource::default(), no_delay(1));
        let request = post_json("/api/analyze", serde_json::json!({ "keywords": " , " }));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(&body).contains("Please enter at least one keyword."));
    }

    #[tokio::test]
    async fn test_analyze_rejects_reversed_dates() {
        let (app, _) = app_with(ScriptedSource::default(), no_delay(1));
        let request = post_json(
            "/api/analyze",
            serde_json::json!({
                "keywords": "boho dress",
                "start_date": "2025-06-01",
                "end_date": "2025-01-01"
            }),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(&body).contains("Start date cannot be after end date."));
    }

    #[tokio::test]
    async fn test_analyze_blank_custom_dates_is_json_error() {
        let (app, state) = app_with(ScriptedSource::default(), no_delay(1));
        let request = post_json(
            "/api/analyze",
            serde_json::json!({ "keywords": "boho dress", "start_date": "", "end_date": "" }),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_slice(&body).expect("json error body");
        assert_eq!(error["error"], "Please choose a start date for the custom range.");
        assert!(!state.session.read().await.running);

        let request = post_json(
            "/api/analyze",
            serde_json::json!({
                "keywords": "boho dress",
                "start_date": "2025-01-01",
                "end_date": "01/06/2025"
            }),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8_lossy(&body).contains("Invalid end date '01/06/2025'"));
    }

    #[tokio::test]
    async fn test_analyze_malformed_body_is_json_error() {
        let (app, _) = app_with(ScriptedSource::default(), no_delay(1));
        let request =
            post_json("/api/analyze", serde_json::json!({ "keywords": "a", "mode": "weekly" }));
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_slice(&body).expect("json error body");
        assert!(error["error"].is_string());
    }

    #[tokio::test]
    async fn test_analysis_runs_in_background() {
        let (app, state) = app_with(scripted(), no_delay(1));

        let (status, _) = send(&app, get("/api/chart.svg")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = post_json(
            "/api/analyze",
            serde_json::json!({
                "keywords": "boho dress",
                "mode": "both",
                "preset": "last3_months"
            }),
        );
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        wait_until_idle(&state).await;

        let (status, body) = send(&app, get("/api/state")).await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(snapshot["data_fetched"], true);
        assert_eq!(snapshot["iot_phase"]["status"], "complete");
        assert_eq!(snapshot["rq_phase"]["status"], "complete");
        assert_eq!(snapshot["iot"]["columns"][0], "boho dress");
        assert_eq!(snapshot["rq"][0]["top"][0]["query"], "boho maxi dress");

        let (status, body) = send(&app, get("/api/chart.svg")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8_lossy(&body).starts_with("<svg"));

        let (status, body) = send(&app, get("/api/report.xlsx")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn test_failed_and_skipped_phases() {
        let (app, state) = app_with(ScriptedSource::default(), no_delay(1));
        let request =
            post_json("/api/analyze", serde_json::json!({ "keywords": "nothing", "mode": "iot" }));
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        wait_until_idle(&state).await;

        let session = state.session.read().await;
        assert_eq!(session.iot_phase.status, PhaseStatus::Error);
        assert_eq!(session.rq_phase.status, PhaseStatus::Skipped);
        assert!(session.data_fetched);
    }

    #[tokio::test]
    async fn test_second_run_rejected_while_active() {
        let slow = RetryPolicy {
            max_attempts: 1,
            min_delay: Duration::from_millis(300),
            max_delay: Duration::from_millis(300),
        };
        let (app, state) = app_with(scripted(), slow);
        let body = serde_json::json!({ "keywords": "boho dress", "mode": "iot" });

        let (first, _) = send(&app, post_json("/api/analyze", body.clone())).await;
        let (second, _) = send(&app, post_json("/api/analyze", body)).await;
        assert_eq!(first, StatusCode::ACCEPTED);
        assert_eq!(second, StatusCode::CONFLICT);

        let (reset, _) = send(&app, post_json("/api/reset", serde_json::json!({}))).await;
        assert_eq!(reset, StatusCode::CONFLICT);
        wait_until_idle(&state).await;
    }

    #[tokio::test]
    async fn test_reset_clears_results() {
        let (app, state) = app_with(scripted(), no_delay(1));
        let body = serde_json::json!({ "keywords": "boho dress", "mode": "iot" });
        let request = post_json("/api/analyze", body);
        send(&app, request).await;
        wait_until_idle(&state).await;

        let (status, _) = send(&app, post_json("/api/reset", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let session = state.session.read().await;
        assert!(!session.data_fetched);
        assert!(session.iot.is_none());
        assert_eq!(session.keywords_input, "boho dress");
    }

    #[tokio::test]
    async fn test_upload_replaces_keyword_input() {
        let (app, state) = app_with(ScriptedSource::default(), no_delay(1));
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"kw.csv\"\r\nContent-Type: text/csv\r\n\r\nkeyword\nwool coat\nlinen pants\n\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/keywords/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .expect("request");

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
        assert_eq!(state.session.read().await.keywords_input, "wool coat, linen pants");
    }

    #[tokio::test]
    async fn test_upload_rejects_unknown_extension() {
        let (app, _) = app_with(ScriptedSource::default(), no_delay(1));
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"kw.txt\"\r\n\r\nkeyword\n\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .uri("/api/keywords/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .expect("request");

        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
