//! Custom error types for rustmonitor.
//!
//! This module defines all error types used throughout the library.
//! All functions return `Result<T, MonitorError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for rustmonitor operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by external API (HTTP 429)
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status or API error code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Atom feed deserialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// XLSX workbook generation error
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Spreadsheet upload could not be read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `MonitorError`
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| MonitorError::Parse(msg.to_string()))
    }
}
