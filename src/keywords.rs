//! Keyword list input.
//!
//! Keywords come either from a comma-separated string or from the first column
//! of an uploaded `.csv` / `.xlsx` file whose first row is a header.

use crate::error::{MonitorError, Result};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx, XlsxError};
use std::io::Cursor;
use tracing::{debug, info};

/// Keywords pre-filled in the dashboard input
pub const DEFAULT_DASHBOARD_KEYWORDS: &str = "flare jeans, graphic tees, leather boots";

/// Split on commas, trim, drop blanks and repeated keywords (first one wins).
pub fn parse_keyword_list(input: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for keyword in input.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }
    keywords
}

/// Join keywords the way the dashboard input shows them.
pub fn join_keywords(keywords: &[String]) -> String {
    keywords.join(", ")
}

/// Read keywords from an uploaded file, dispatching on its extension.
pub fn keywords_from_file(file_name: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let lower = file_name.to_lowercase();
    let keywords = if lower.ends_with(".csv") {
        keywords_from_csv(bytes)?
    } else if lower.ends_with(".xlsx") {
        keywords_from_xlsx(bytes)?
    } else {
        return Err(MonitorError::Validation(format!(
            "Unsupported keyword file '{}': expected .csv or .xlsx",
            file_name
        )));
    };

    info!(file = file_name, count = keywords.len(), "Loaded keywords from file");
    Ok(keywords)
}

/// First column of a CSV file, header row skipped.
pub fn keywords_from_csv(bytes: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut keywords = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(cell) = record.get(0).map(str::trim).filter(|c| !c.is_empty()) {
            keywords.push(cell.to_string());
        }
    }

    debug!(count = keywords.len(), "Parsed CSV keyword column");
    Ok(keywords)
}

/// First column of the first worksheet, header row skipped.
pub fn keywords_from_xlsx(bytes: &[u8]) -> Result<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: XlsxError| {
            MonitorError::Spreadsheet(format!("Failed to open workbook: {}", e))
        })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| MonitorError::Spreadsheet("Workbook has no worksheets".to_string()))?
        .map_err(|e| MonitorError::Spreadsheet(format!("Failed to read worksheet: {}", e)))?;

    let keywords: Vec<String> = range
        .rows()
        .skip(1)
        .filter_map(|row| row.first())
        .filter(|cell| !matches!(cell, Data::Empty))
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect();

    debug!(count = keywords.len(), "Parsed XLSX keyword column");
    Ok(keywords)
}
