//! # rustmonitor
//!
//! arXiv monitor and Google Trends market analyzer.
//!
//! ## Modules
//!
//! - [`trends`] - Google Trends client, batched retrieval and result tables
//! - [`keywords`] - keyword lists from text, CSV and XLSX
//! - [`export`] - CSV / XLSX output and the console related-queries report
//! - [`chart`] - SVG interest-over-time chart
//! - [`dashboard`] - browser dashboard (axum)
//! - [`arxiv`] - arXiv Atom API search
//! - [`summarizer`] - Gemini abstract summaries
//! - [`pdf`] - PDF download
//! - [`report`] - plain-text arXiv report
//! - [`cookies`] - Trends cookie persistence
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustmonitor::trends::{run_analysis, AnalysisMode, RetryPolicy, Timeframe, TrendsClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TrendsClient::new(Default::default())?;
//!     let keywords = vec!["boho dress".to_string(), "linen pants".to_string()];
//!     let outcome = run_analysis(
//!         &client,
//!         &keywords,
//!         AnalysisMode::Both,
//!         &Timeframe::default(),
//!         &RetryPolicy::default(),
//!     )
//!     .await;
//!     println!("Collected data: {}", !outcome.is_empty());
//!     Ok(())
//! }
//! ```

pub mod arxiv;
pub mod chart;
pub mod cookies;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod keywords;
pub mod pdf;
pub mod prompts;
pub mod report;
pub mod summarizer;
pub mod trends;

pub use error::{MonitorError, Result};
