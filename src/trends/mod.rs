//! Google Trends retrieval.
//!
//! - [`client`] - HTTP client for the Trends widget API
//! - [`batch`] - chunked, serial, retrying retrieval and result merging
//! - [`analysis`] - the IOT / RQ / both driver shared by every front end
//! - [`frame`] - time series and related-queries tables
//! - [`timeframe`] - timeframe parsing and dashboard presets

pub mod analysis;
pub mod batch;
pub mod client;
pub mod frame;
pub mod timeframe;

pub use analysis::{run_analysis, AnalysisMode, AnalysisOutcome};
pub use batch::{chunk_keywords, RetryPolicy, MAX_KEYWORDS_PER_BATCH};
pub use client::{TrendsClient, TrendsClientOptions};
pub use frame::{
    ConsolidatedQuery, RelatedQueries, RelatedQuery, RelatedQueriesSet, TimeSeriesTable,
};
pub use timeframe::{Timeframe, TimeframePreset};

use crate::error::Result;
use async_trait::async_trait;

/// A source of per-keyword Trends data.
///
/// Each call covers exactly one keyword; batching and retries live in [`batch`].
#[async_trait]
pub trait TrendsSource: Send + Sync {
    /// Interest over time for one keyword. An empty table means "no data".
    async fn interest_over_time(
        &self,
        keyword: &str,
        timeframe: &Timeframe,
    ) -> Result<TimeSeriesTable>;

    /// Top and rising related queries for one keyword.
    async fn related_queries(
        &self,
        keyword: &str,
        timeframe: &Timeframe,
    ) -> Result<RelatedQueries>;
}
