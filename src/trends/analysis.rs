//! Analysis driver shared by the CLI, the interactive menu and the dashboard.

use super::batch::{
    chunk_keywords, fetch_interest_over_time, fetch_related_queries, RetryPolicy,
    MAX_KEYWORDS_PER_BATCH,
};
use super::frame::{RelatedQueriesSet, TimeSeriesTable};
use super::timeframe::Timeframe;
use super::TrendsSource;
use crate::error::MonitorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Which data sets to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Interest over time only
    Iot,
    /// Related queries only
    Rq,
    /// Both data sets
    Both,
}

impl AnalysisMode {
    pub fn includes_iot(self) -> bool {
        matches!(self, AnalysisMode::Iot | AnalysisMode::Both)
    }

    pub fn includes_rq(self) -> bool {
        matches!(self, AnalysisMode::Rq | AnalysisMode::Both)
    }

    /// Label shown in the dashboard
    pub fn label(self) -> &'static str {
        match self {
            AnalysisMode::Both => "Both",
            AnalysisMode::Iot => "Interest Over Time Only",
            AnalysisMode::Rq => "Related Queries Only",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = MonitorError;

    /// Accepts CLI names (`iot`, `rq`, `both`) and menu numbers (`1`, `2`, `3`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "iot" | "1" => Ok(AnalysisMode::Iot),
            "rq" | "2" => Ok(AnalysisMode::Rq),
            "both" | "3" => Ok(AnalysisMode::Both),
            other => Err(MonitorError::Validation(format!(
                "Invalid analysis mode '{}'. Use iot, rq or both",
                other
            ))),
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisMode::Iot => "iot",
            AnalysisMode::Rq => "rq",
            AnalysisMode::Both => "both",
        };
        f.write_str(name)
    }
}

/// Collected data. A side is `None` when it was skipped or nothing came back.
#[derive(Debug, Clone, Default)]
pub struct AnalysisOutcome {
    pub iot: Option<TimeSeriesTable>,
    pub rq: Option<RelatedQueriesSet>,
}

impl AnalysisOutcome {
    pub fn is_empty(&self) -> bool {
        self.iot.is_none() && self.rq.is_none()
    }
}

/// Interest over time, processed in batches of [`MAX_KEYWORDS_PER_BATCH`].
pub async fn run_interest_over_time<S: TrendsSource + ?Sized>(
    source: &S,
    keywords: &[String],
    timeframe: &Timeframe,
    policy: &RetryPolicy,
) -> Option<TimeSeriesTable> {
    let chunks = chunk_keywords(keywords, MAX_KEYWORDS_PER_BATCH);
    info!(
        keywords = keywords.len(),
        batches = chunks.len(),
        "Starting Interest Over Time batch processing"
    );

    let mut merged = TimeSeriesTable::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        info!(batch = idx + 1, total_batches = chunks.len(), keywords = ?chunk, "Processing batch");
        if let Some(table) = fetch_interest_over_time(source, chunk, timeframe, policy).await {
            merged.outer_join(table);
        }
    }

    (!merged.is_empty()).then_some(merged)
}

/// Related queries for the full keyword list (already one request per keyword).
pub async fn run_related_queries<S: TrendsSource + ?Sized>(
    source: &S,
    keywords: &[String],
    timeframe: &Timeframe,
    policy: &RetryPolicy,
) -> Option<RelatedQueriesSet> {
    info!(keywords = keywords.len(), "Starting Related Queries batch processing");
    fetch_related_queries(source, keywords, timeframe, policy).await
}

/// Collect the data sets `mode` asks for.
pub async fn run_analysis<S: TrendsSource + ?Sized>(
    source: &S,
    keywords: &[String],
    mode: AnalysisMode,
    timeframe: &Timeframe,
    policy: &RetryPolicy,
) -> AnalysisOutcome {
    let iot = if mode.includes_iot() {
        run_interest_over_time(source, keywords, timeframe, policy).await
    } else {
        None
    };

    let rq = if mode.includes_rq() {
        run_related_queries(source, keywords, timeframe, policy).await
    } else {
        None
    };

    AnalysisOutcome { iot, rq }
}
