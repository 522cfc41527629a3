//! PDF download for arXiv papers.

use crate::error::{MonitorError, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Default download directory
pub const DEFAULT_PDF_DIR: &str = "downloads/arxiv_dl";

/// File name for a paper: characters invalid on common filesystems are
/// removed, spaces become underscores.
pub fn pdf_filename(title: &str) -> String {
    let safe: String = title
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    format!("{}.pdf", safe.replace(' ', "_"))
}

/// Stream `pdf_url` into `dir`, named after `title`. Returns the written path.
pub async fn download_pdf(pdf_url: &str, title: &str, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(pdf_filename(title));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;

    info!(url = pdf_url, path = %path.display(), "Downloading PDF");
    let response = client.get(pdf_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MonitorError::Api {
            code: status.as_u16() as i32,
            message: format!("Failed to download PDF: {}", status),
        });
    }

    let mut file = tokio::fs::File::create(&path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!(bytes = written, "PDF written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_filename() {
        assert_eq!(pdf_filename("Attention Is All You Need"), "Attention_Is_All_You_Need.pdf");
        assert_eq!(
            pdf_filename("What/Why: A \"Study\" <of> Tokens?*|"),
            "WhatWhy_A_Study_of_Tokens.pdf"
        );
    }
}
