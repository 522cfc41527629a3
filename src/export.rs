//! Trends result export: CSV files, the XLSX report and the console report.

use crate::error::Result;
use crate::trends::{ConsolidatedQuery, RelatedQueriesSet, RelatedQuery, TimeSeriesTable};
use chrono::Local;
use rust_xlsxwriter::Workbook;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sheet holding the interest-over-time table
pub const IOT_SHEET: &str = "Interest Over Time";
/// Sheet holding consolidated top related queries
pub const TOP_SHEET: &str = "Top_Related_Queries";
/// Sheet holding consolidated rising related queries
pub const RISING_SHEET: &str = "Rising_Related_Queries";
/// Placeholder sheet for a report without any data
pub const EMPTY_SHEET: &str = "No Data";

/// Local timestamp used in every output file name
pub fn file_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Write interest over time with a leading `date` index column.
pub fn write_iot_csv(path: &Path, table: &TimeSeriesTable) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(path)?;

    let mut header = vec!["date".to_string()];
    header.extend(table.columns().iter().cloned());
    wtr.write_record(&header)?;

    for (time, values) in table.rows() {
        let mut record = vec![table.format_index(time)];
        record.extend(
            values
                .iter()
                .map(|v| v.map(|n| n.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    info!(path = %path.display(), rows = table.len(), "Saved interest over time CSV");
    Ok(())
}

/// Write consolidated related-queries rows (`query,value,Original Keyword`).
pub fn write_related_csv(path: &Path, rows: &[ConsolidatedQuery]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    info!(path = %path.display(), rows = rows.len(), "Saved related queries CSV");
    Ok(())
}

/// Paths written by [`save_csv_outputs`]
#[derive(Debug, Default)]
pub struct SavedFiles {
    pub iot: Option<PathBuf>,
    pub top: Option<PathBuf>,
    pub rising: Option<PathBuf>,
}

/// Write `iot_data_*`, `rq_top_ALL_*` and `rq_rising_ALL_*` for whatever data exists.
pub fn save_csv_outputs(
    output_dir: &Path,
    timestamp: &str,
    iot: Option<&TimeSeriesTable>,
    rq: Option<&RelatedQueriesSet>,
) -> Result<SavedFiles> {
    std::fs::create_dir_all(output_dir)?;
    let mut saved = SavedFiles::default();

    if let Some(table) = iot {
        let path = output_dir.join(format!("iot_data_{}.csv", timestamp));
        write_iot_csv(&path, table)?;
        saved.iot = Some(path);
    }

    if let Some(set) = rq {
        let top = set.consolidated_top();
        if !top.is_empty() {
            let path = output_dir.join(format!("rq_top_ALL_{}.csv", timestamp));
            write_related_csv(&path, &top)?;
            saved.top = Some(path);
        }

        let rising = set.consolidated_rising();
        if !rising.is_empty() {
            let path = output_dir.join(format!("rq_rising_ALL_{}.csv", timestamp));
            write_related_csv(&path, &rising)?;
            saved.rising = Some(path);
        }
    }

    Ok(saved)
}

/// Build the XLSX report in memory.
///
/// Each sheet is only added when it has data; a report with no data at all
/// gets a single placeholder sheet.
pub fn build_xlsx_report(
    iot: Option<&TimeSeriesTable>,
    rq: Option<&RelatedQueriesSet>,
) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let mut sheets = 0;

    if let Some(table) = iot {
        let sheet = workbook.add_worksheet();
        sheet.set_name(IOT_SHEET)?;
        sheet.write_string(0, 0, "date")?;
        for (col, name) in table.columns().iter().enumerate() {
            sheet.write_string(0, col as u16 + 1, name)?;
        }
        for (row, (time, values)) in table.rows().enumerate() {
            let row = row as u32 + 1;
            sheet.write_string(row, 0, table.format_index(time))?;
            for (col, value) in values.iter().enumerate() {
                if let Some(v) = value {
                    sheet.write_number(row, col as u16 + 1, f64::from(*v))?;
                }
            }
        }
        sheets += 1;
    }

    if let Some(set) = rq {
        for (name, rows) in [
            (TOP_SHEET, set.consolidated_top()),
            (RISING_SHEET, set.consolidated_rising()),
        ] {
            if rows.is_empty() {
                continue;
            }
            let sheet = workbook.add_worksheet();
            sheet.set_name(name)?;
            sheet.write_string(0, 0, "query")?;
            sheet.write_string(0, 1, "value")?;
            sheet.write_string(0, 2, "Original Keyword")?;
            for (idx, item) in rows.iter().enumerate() {
                let row = idx as u32 + 1;
                sheet.write_string(row, 0, &item.query)?;
                sheet.write_number(row, 1, item.value as f64)?;
                sheet.write_string(row, 2, &item.original_keyword)?;
            }
            sheets += 1;
        }
    }

    if sheets == 0 {
        let sheet = workbook.add_worksheet();
        sheet.set_name(EMPTY_SHEET)?;
        sheet.write_string(0, 0, "No data was retrieved.")?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Render a query table with a positional index, right-aligned values.
pub fn render_query_table(rows: &[RelatedQuery]) -> String {
    let index_width = rows.len().saturating_sub(1).to_string().len();
    let query_width = rows
        .iter()
        .map(|r| r.query.chars().count())
        .max()
        .unwrap_or(0)
        .max("query".len());
    let value_width = rows
        .iter()
        .map(|r| r.value.to_string().len())
        .max()
        .unwrap_or(0)
        .max("value".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:iw$}  {:<qw$}  {:>vw$}",
        "",
        "query",
        "value",
        iw = index_width,
        qw = query_width,
        vw = value_width
    );
    for (idx, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<iw$}  {:<qw$}  {:>vw$}",
            idx,
            row.query,
            row.value,
            iw = index_width,
            qw = query_width,
            vw = value_width
        );
    }
    out
}

/// Console report of related queries, one section per keyword.
pub fn render_related_report(set: &RelatedQueriesSet) -> String {
    let mut out = String::from("--- Related Queries Report ---\n\n");
    for (keyword, queries) in set.iter() {
        let _ = writeln!(out, "--- For keyword: '{}' ---\n", keyword);
        match &queries.top {
            Some(rows) => {
                out.push_str("--- Top Related Queries ---\n");
                let _ = writeln!(out, "{}", render_query_table(rows));
            }
            None => out.push_str("No top queries data found.\n\n"),
        }
        match &queries.rising {
            Some(rows) => {
                out.push_str("--- Rising Related Queries ---\n");
                let _ = writeln!(out, "{}", render_query_table(rows));
            }
            None => out.push_str("No rising queries data found.\n\n"),
        }
    }
    out
}
