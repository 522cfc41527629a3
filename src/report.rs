//! Plain-text arXiv monitor report.
//!
//! Reports are opened in append mode, so repeated runs with the same file name
//! stack sessions one after the other. Every write returns the text it wrote so
//! callers can echo it to the console.

use crate::arxiv::{Paper, SortBy};
use crate::error::Result;
use chrono::{DateTime, Local};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Default report directory
pub const DEFAULT_REPORT_DIR: &str = "downloads/arxiv_dl";

/// `arxiv_report_{safe_query}_{timestamp}.txt`; the query keeps alphanumerics,
/// spaces, `_` and `-`.
pub fn default_report_filename(query: &str, timestamp: &str) -> String {
    let safe_query: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    format!("arxiv_report_{}_{}.txt", safe_query.trim_end(), timestamp)
}

/// Report writer over any byte sink
pub struct ArxivReport<W: Write> {
    out: W,
}

impl ArxivReport<std::fs::File> {
    /// Open `path` for appending, creating parent directories as needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!(path = %path.display(), "Opened report for appending");
        Ok(Self::new(file))
    }
}

impl<W: Write> ArxivReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn emit(&mut self, text: String) -> Result<String> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(text)
    }

    pub fn session_header(
        &mut self,
        query: &str,
        num_papers: usize,
        sort_by: SortBy,
        now: DateTime<Local>,
    ) -> Result<String> {
        self.emit(format!(
            "--- arXiv Report: {} ---\n\nSearch Query: '{}' | # of Papers: {} | Sort: {}\n{}\n\n",
            now.format("%Y-%m-%d %H:%M"),
            query,
            num_papers,
            sort_by,
            "=".repeat(50)
        ))
    }

    /// Paper block; `index` is zero-based.
    pub fn paper(&mut self, index: usize, total: usize, paper: &Paper) -> Result<String> {
        self.emit(format!(
            "--- [ Paper {}/{} ] ---\nTitle: {}\nPublished: {}\nLink: {}\nGenerating summary...\n",
            index + 1,
            total,
            paper.title,
            paper.published_display(),
            paper.pdf_url
        ))
    }

    pub fn summary(&mut self, summary: &str) -> Result<String> {
        self.emit(format!("Gemini Summary: {}\n\n", summary))
    }

    pub fn download_noted(&mut self) -> Result<String> {
        self.emit("[User chose to download this PDF.]\n\n".to_string())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
