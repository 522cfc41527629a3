//! Dashboard request handlers.

use super::page::render_index;
use super::{DashboardError, DashboardState, Phase, PhaseStatus, Session};
use crate::chart::render_interest_chart;
use crate::export::{build_xlsx_report, file_timestamp};
use crate::keywords::{join_keywords, keywords_from_file, parse_keyword_list};
use crate::trends::analysis::{run_interest_over_time, run_related_queries};
use crate::trends::{
    chunk_keywords, AnalysisMode, RelatedQuery, Timeframe, TimeframePreset, MAX_KEYWORDS_PER_BATCH,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

type ApiResult<T> = std::result::Result<T, DashboardError>;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn index(State(state): State<Arc<DashboardState>>) -> Html<String> {
    let session = state.session.read().await;
    Html(render_index(&session.keywords_input, Local::now().date_naive()))
}

pub async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct IotRow {
    pub date: String,
    pub values: Vec<Option<u32>>,
}

#[derive(Debug, Serialize)]
pub struct IotView {
    pub columns: Vec<String>,
    pub rows: Vec<IotRow>,
}

#[derive(Debug, Serialize)]
pub struct RqView {
    pub keyword: String,
    pub top: Option<Vec<RelatedQuery>>,
    pub rising: Option<Vec<RelatedQuery>>,
}

/// JSON snapshot polled by the page
#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub keywords_input: String,
    pub running: bool,
    pub data_fetched: bool,
    pub last_keywords: Vec<String>,
    pub iot_phase: Phase,
    pub rq_phase: Phase,
    pub iot: Option<IotView>,
    pub rq: Option<Vec<RqView>>,
}

impl From<&Session> for StateSnapshot {
    fn from(session: &Session) -> Self {
        let iot = session.iot.as_ref().map(|table| IotView {
            columns: table.columns().to_vec(),
            rows: table
                .rows()
                .map(|(time, values)| IotRow {
                    date: table.format_index(time),
                    values: values.to_vec(),
                })
                .collect(),
        });
        let rq = session.rq.as_ref().map(|set| {
            set.iter()
                .map(|(keyword, queries)| RqView {
                    keyword: keyword.to_string(),
                    top: queries.top.clone(),
                    rising: queries.rising.clone(),
                })
                .collect()
        });

        Self {
            keywords_input: session.keywords_input.clone(),
            running: session.running,
            data_fetched: session.data_fetched,
            last_keywords: session.last_keywords.clone(),
            iot_phase: session.iot_phase.clone(),
            rq_phase: session.rq_phase.clone(),
            iot,
            rq,
        }
    }
}

pub async fn get_state(State(state): State<Arc<DashboardState>>) -> Json<StateSnapshot> {
    let session = state.session.read().await;
    Json(StateSnapshot::from(&*session))
}

pub async fn chart(State(state): State<Arc<DashboardState>>) -> ApiResult<Response> {
    let session = state.session.read().await;
    let table = session
        .iot
        .as_ref()
        .ok_or_else(|| DashboardError::NotFound("No interest over time data".to_string()))?;
    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], render_interest_chart(table)).into_response())
}

pub async fn report(State(state): State<Arc<DashboardState>>) -> ApiResult<Response> {
    let session = state.session.read().await;
    if !session.data_fetched {
        return Err(DashboardError::NotFound("Run an analysis first".to_string()));
    }

    let bytes = build_xlsx_report(session.iot.as_ref(), session.rq.as_ref())?;
    let disposition = format!("attachment; filename=\"full_report_{}.xlsx\"", file_timestamp());
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub keywords_input: String,
    pub count: usize,
}

/// Replace the keyword input with the first column of an uploaded file.
pub async fn upload_keywords(
    State(state): State<Arc<DashboardState>>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DashboardError::BadRequest(format!("Invalid upload: {}", e)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DashboardError::BadRequest(format!("Invalid upload: {}", e)))?;

        let keywords = keywords_from_file(&file_name, &bytes)?;
        let keywords_input = join_keywords(&keywords);
        state.session.write().await.keywords_input = keywords_input.clone();

        info!(file = %file_name, count = keywords.len(), "Keyword file uploaded");
        return Ok(Json(UploadResponse {
            keywords_input,
            count: keywords.len(),
        }));
    }

    Err(DashboardError::BadRequest("No file in upload".to_string()))
}

fn default_mode() -> AnalysisMode {
    AnalysisMode::Both
}

/// Analysis request. Without a preset, a start and end date (`YYYY-MM-DD`)
/// select a custom range; with neither, the default timeframe applies.
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub keywords: String,
    #[serde(default = "default_mode")]
    pub mode: AnalysisMode,
    #[serde(default)]
    pub preset: Option<TimeframePreset>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A custom-range date field. Present but blank is an error, not "unset".
fn parse_range_date(value: Option<&str>, which: &str) -> ApiResult<Option<NaiveDate>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DashboardError::BadRequest(format!(
            "Please choose a {} date for the custom range.",
            which
        )));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            DashboardError::BadRequest(format!("Invalid {} date '{}'. Use YYYY-MM-DD.", which, raw))
        })
}

impl AnalyzeRequest {
    fn timeframe(&self) -> ApiResult<Timeframe> {
        if let Some(preset) = self.preset {
            return Ok(preset.timeframe());
        }
        let start = parse_range_date(self.start_date.as_deref(), "start")?;
        let end = parse_range_date(self.end_date.as_deref(), "end")?;
        match (start, end) {
            (Some(start), Some(end)) => Ok(Timeframe::between(start, end)?),
            (None, None) => Ok(Timeframe::default()),
            _ => Err(DashboardError::BadRequest(
                "A custom range needs both a start and an end date.".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeAccepted {
    pub keywords: Vec<String>,
    pub mode: AnalysisMode,
    pub timeframe: String,
}

/// Validate and start an analysis in the background.
pub async fn analyze(
    State(state): State<Arc<DashboardState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AnalyzeAccepted>)> {
    let Json(request) = payload?;
    let keywords = parse_keyword_list(&request.keywords);
    if keywords.is_empty() {
        return Err(DashboardError::BadRequest(
            "Please enter at least one keyword.".to_string(),
        ));
    }
    let timeframe = request.timeframe()?;

    {
        let mut session = state.session.write().await;
        if session.running {
            return Err(DashboardError::Conflict(
                "An analysis is already running.".to_string(),
            ));
        }
        session.clear_results();
        session.running = true;
        session.keywords_input = request.keywords.clone();
        session.last_keywords = keywords.clone();
    }

    info!(
        keywords = ?keywords,
        mode = %request.mode,
        timeframe = %timeframe,
        "Starting dashboard analysis"
    );
    let accepted = AnalyzeAccepted {
        keywords: keywords.clone(),
        mode: request.mode,
        timeframe: timeframe.to_string(),
    };

    tokio::spawn(run_job(Arc::clone(&state), keywords, request.mode, timeframe));
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Run both phases, publishing progress into the session.
async fn run_job(
    state: Arc<DashboardState>,
    keywords: Vec<String>,
    mode: AnalysisMode,
    timeframe: Timeframe,
) {
    let source = state.source.as_ref();

    if mode.includes_iot() {
        let batches = chunk_keywords(&keywords, MAX_KEYWORDS_PER_BATCH).len();
        let label = if batches == 1 {
            format!("Processing {} keyword(s)....", keywords.len())
        } else {
            format!("Processing {} keywords in {} batches....", keywords.len(), batches)
        };
        state.session.write().await.iot_phase = Phase::new(PhaseStatus::Running, label);

        let iot = run_interest_over_time(source, &keywords, &timeframe, &state.policy).await;
        let mut session = state.session.write().await;
        session.iot_phase = match iot {
            Some(_) => Phase::new(PhaseStatus::Complete, "IOT data retrieval succeeded!"),
            None => {
                warn!("Interest over time retrieval produced no data");
                Phase::new(PhaseStatus::Error, "IOT data retrieval failed.")
            }
        };
        session.iot = iot;
    } else {
        state.session.write().await.iot_phase =
            Phase::new(PhaseStatus::Skipped, "IOT data skipped.");
    }

    if mode.includes_rq() {
        state.session.write().await.rq_phase = Phase::new(
            PhaseStatus::Running,
            format!("Processing {} keyword(s)....", keywords.len()),
        );

        let rq = run_related_queries(source, &keywords, &timeframe, &state.policy).await;
        let mut session = state.session.write().await;
        session.rq_phase = match rq {
            Some(_) => Phase::new(PhaseStatus::Complete, "RQ data retrieval succeeded!"),
            None => {
                warn!("Related queries retrieval produced no data");
                Phase::new(PhaseStatus::Error, "RQ data retrieval failed.")
            }
        };
        session.rq = rq;
    } else {
        state.session.write().await.rq_phase =
            Phase::new(PhaseStatus::Skipped, "RQ data skipped.");
    }

    let mut session = state.session.write().await;
    session.data_fetched = true;
    session.running = false;
    info!("Dashboard analysis complete");
}

/// Clear results. Refused while an analysis is running.
pub async fn reset(State(state): State<Arc<DashboardState>>) -> ApiResult<StatusCode> {
    let mut session = state.session.write().await;
    if session.running {
        return Err(DashboardError::Conflict(
            "Cannot reset while an analysis is running.".to_string(),
        ));
    }
    session.clear_results();
    info!("Dashboard session reset");
    Ok(StatusCode::OK)
}
