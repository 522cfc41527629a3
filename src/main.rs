//! rustmonitor - arXiv monitor and Google Trends market analyzer
//!
//! ## Usage
//!
//! ### arXiv monitor
//! ```bash
//! rustmonitor arxiv -q "large language models" -n 5 -s submitted
//! ```
//!
//! ### Google Trends
//! ```bash
//! rustmonitor trends -k "boho dress" "linen pants" -m both --report --plot
//! rustmonitor interactive
//! ```
//!
//! ### Dashboard
//! ```bash
//! rustmonitor serve --port 8501
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use rustmonitor::arxiv::{ArxivClient, ArxivOptions, SortBy};
use rustmonitor::cookies::CookieManager;
use rustmonitor::dashboard::{self, DashboardState};
use rustmonitor::export::{self, file_timestamp};
use rustmonitor::keywords::parse_keyword_list;
use rustmonitor::pdf::{download_pdf, DEFAULT_PDF_DIR};
use rustmonitor::report::{default_report_filename, ArxivReport, DEFAULT_REPORT_DIR};
use rustmonitor::summarizer::{Summarizer, SummarizerConfig, DEFAULT_MODEL, GENERIC_ERROR_SUMMARY};
use rustmonitor::trends::{
    chunk_keywords, AnalysisMode, AnalysisOutcome, RetryPolicy, Timeframe, TrendsClient,
    TrendsClientOptions, MAX_KEYWORDS_PER_BATCH,
};
use rustmonitor::trends::analysis::{run_interest_over_time, run_related_queries};
use rustmonitor::chart;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// arXiv monitor and Google Trends market analyzer
#[derive(Parser)]
#[command(name = "rustmonitor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search arXiv, summarize each abstract and write a report
    Arxiv {
        /// Search query for arXiv papers
        #[arg(short, long)]
        query: String,

        /// Number of papers to retrieve
        #[arg(short = 'n', long = "num-papers", default_value = "3")]
        num_papers: usize,

        /// Sorting criterion: relevance, updated or submitted
        #[arg(short, long = "sort-by", default_value = "submitted")]
        sort_by: String,

        /// Report file name (default: arxiv_report_<query>_<timestamp>.txt)
        #[arg(short, long)]
        output: Option<String>,

        /// Directory for the report and downloaded PDFs
        #[arg(long, default_value = DEFAULT_REPORT_DIR)]
        output_dir: PathBuf,

        /// Gemini model used for summaries
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// PDF download behavior
        #[arg(long, value_enum, default_value_t = DownloadMode::Ask)]
        download: DownloadMode,
    },

    /// Run a Google Trends analysis for a list of keywords
    Trends {
        /// Keywords to analyze (comma-separated values are split)
        #[arg(short, long, num_args = 1.., required = true)]
        keywords: Vec<String>,

        /// Analysis mode: iot, rq or both
        #[arg(short, long, default_value = "both", value_parser = parse_mode)]
        mode: AnalysisMode,

        /// Timeframe: all, today 5-y, today 3-m, now 7-d, now 4-H, YYYY-MM-DD YYYY-MM-DD, ...
        #[arg(short, long, default_value = "today 12-m", value_parser = parse_timeframe)]
        timeframe: Timeframe,

        /// Print the related-queries console report
        #[arg(long)]
        report: bool,

        /// Save an SVG chart of interest over time
        #[arg(long)]
        plot: bool,

        /// Save the full XLSX report
        #[arg(long)]
        xlsx: bool,

        /// Output directory
        #[arg(long, default_value = "downloads/gtrends_reports")]
        output_dir: PathBuf,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Menu-driven Google Trends analysis
    Interactive {
        /// Output directory
        #[arg(long, default_value = "downloads/gtrends_reports")]
        output_dir: PathBuf,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Summarize an abstract read from a file or stdin
    Summarize {
        /// File holding the abstract (default: stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Gemini model
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
    },

    /// Download a PDF, named after the paper title
    Download {
        /// PDF URL
        url: String,

        /// Paper title
        title: String,

        /// Target directory
        #[arg(long, default_value = DEFAULT_PDF_DIR)]
        output_dir: PathBuf,
    },

    /// Run the browser dashboard
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8501")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Proxy URL for Trends requests
        #[arg(long)]
        proxy: Option<String>,
    },

    /// Manage stored Google Trends cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
    /// Import cookies from a browser-exported JSON file
    Import {
        /// JSON cookie export
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DownloadMode {
    /// Ask for every paper
    Ask,
    /// Download every paper
    All,
    /// Never download
    None,
}

fn parse_mode(s: &str) -> std::result::Result<AnalysisMode, String> {
    s.parse().map_err(|e: rustmonitor::MonitorError| e.to_string())
}

fn parse_timeframe(s: &str) -> std::result::Result<Timeframe, String> {
    Timeframe::parse(s).map_err(|e| e.to_string())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Arxiv {
            query,
            num_papers,
            sort_by,
            output,
            output_dir,
            model,
            download,
        } => {
            run_arxiv_monitor(query, num_papers, sort_by, output, output_dir, model, download).await
        }
        Commands::Trends {
            keywords,
            mode,
            timeframe,
            report,
            plot,
            xlsx,
            output_dir,
            proxy,
        } => {
            let keywords = parse_keyword_list(&keywords.join(","));
            let outputs = TrendsOutputs {
                output_dir,
                plot: if plot { PlotChoice::Yes } else { PlotChoice::No },
                xlsx,
                report,
            };
            run_trends(keywords, mode, timeframe, proxy, outputs).await
        }
        Commands::Interactive { output_dir, proxy } => run_interactive(output_dir, proxy).await,
        Commands::Summarize { file, model } => run_summarize(file, model).await,
        Commands::Download {
            url,
            title,
            output_dir,
        } => {
            let path = download_pdf(&url, &title, &output_dir)
                .await
                .context("Failed to download PDF")?;
            println!("Successfully saved to {}", path.display());
            Ok(())
        }
        Commands::Serve { port, host, proxy } => run_dashboard(host, port, proxy).await,
        Commands::Cookies { action } => handle_cookies(action),
    }
}

/// Read one trimmed line from stdin after printing `message`.
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(message: &str) -> Result<bool> {
    Ok(prompt(message)?.eq_ignore_ascii_case("y"))
}

// ============================================================================
// arXiv Monitor
// ============================================================================

async fn run_arxiv_monitor(
    query: String,
    num_papers: usize,
    sort_by: String,
    output: Option<String>,
    output_dir: PathBuf,
    model: String,
    download: DownloadMode,
) -> Result<()> {
    println!("\n--- arXiv Monitor Agent ---\n");

    let sort = SortBy::parse_lenient(&sort_by);
    let filename = output.unwrap_or_else(|| default_report_filename(&query, &file_timestamp()));
    let report_path = output_dir.join(filename);

    println!("\nSearching for {} papers on '{}', sorted by '{}'...\n", num_papers, query, sort);
    println!("Results will be saved to {}\n", report_path.display());

    let client = ArxivClient::new(ArxivOptions::default())?;
    let papers = client
        .search(&query, num_papers, sort)
        .await
        .context("arXiv search failed")?;

    if papers.is_empty() {
        println!("No papers found.");
        return Ok(());
    }

    println!("Found {} papers. Starting summarization...\n", papers.len());

    let summarizer = match SummarizerConfig::from_env() {
        Ok(config) => Some(Summarizer::new(config.with_model(model))?),
        Err(e) => {
            warn!(error = %e, "Summaries disabled");
            None
        }
    };

    let mut report = ArxivReport::append_to(&report_path)
        .with_context(|| format!("Failed to open report {}", report_path.display()))?;
    report.session_header(&query, num_papers, sort, Local::now())?;

    for (idx, paper) in papers.iter().enumerate() {
        println!("{}", report.paper(idx, papers.len(), paper)?);

        let summary = match &summarizer {
            Some(s) => s.summarize_or_fallback(&paper.summary).await,
            None => GENERIC_ERROR_SUMMARY.to_string(),
        };
        println!("{}", report.summary(&summary)?);

        let wanted = match download {
            DownloadMode::All => true,
            DownloadMode::None => false,
            DownloadMode::Ask => {
                let answer = confirm("Download this paper as PDF? (y/n): ")?;
                println!("\n");
                answer
            }
        };

        if wanted {
            println!("Downloading {}...\n", rustmonitor::pdf::pdf_filename(&paper.title));
            match download_pdf(&paper.pdf_url, &paper.title, &output_dir).await {
                Ok(path) => println!("Successfully saved to {}\n", path.display()),
                Err(e) => println!("Error downloading PDF: {}", e),
            }
            report.download_noted()?;
        }
    }

    println!("--- [ Process Complete ] ---\nReport saved to '{}'\n\n", report_path.display());
    Ok(())
}

async fn run_summarize(file: Option<PathBuf>, model: String) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if text.trim().is_empty() {
        anyhow::bail!("No abstract text provided");
    }

    let config = SummarizerConfig::from_env()?.with_model(model);
    let summarizer = Summarizer::new(config)?;

    println!("\n--- Generating Summary ---");
    let summary = summarizer.summarize_or_fallback(&text).await;
    println!("\nGemini Summary:\n{}", summary);
    Ok(())
}

// ============================================================================
// Google Trends
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlotChoice {
    Yes,
    No,
    Ask,
}

struct TrendsOutputs {
    output_dir: PathBuf,
    plot: PlotChoice,
    xlsx: bool,
    report: bool,
}

/// Trends client seeded with stored cookies.
fn build_trends_client(proxy: Option<String>) -> Result<TrendsClient> {
    let cookies = CookieManager::default().load();
    let options = TrendsClientOptions {
        proxy,
        cookies,
        ..Default::default()
    };
    Ok(TrendsClient::new(options)?)
}

/// Keep the session cookies for the next run.
fn persist_cookies(client: &TrendsClient) {
    let cookies = client.session_cookies();
    if cookies.is_empty() {
        return;
    }
    if let Err(e) = CookieManager::default().merge(&cookies) {
        warn!(error = %e, "Failed to persist Trends cookies");
    }
}

async fn run_trends(
    keywords: Vec<String>,
    mode: AnalysisMode,
    timeframe: Timeframe,
    proxy: Option<String>,
    outputs: TrendsOutputs,
) -> Result<()> {
    if keywords.is_empty() {
        anyhow::bail!("Please provide at least one keyword");
    }

    let client = build_trends_client(proxy)?;
    let timestamp = file_timestamp();

    let policy = RetryPolicy::default();
    let (iot_banner, rq_banner) = phase_banners(mode, &keywords);

    info!(keywords = ?keywords, mode = %mode, timeframe = %timeframe, "Starting Trends analysis");
    let mut outcome = AnalysisOutcome::default();
    if let Some(banner) = iot_banner {
        println!("{}", banner);
        outcome.iot = run_interest_over_time(&client, &keywords, &timeframe, &policy).await;
    }
    if let Some(banner) = rq_banner {
        println!("{}", banner);
        outcome.rq = run_related_queries(&client, &keywords, &timeframe, &policy).await;
    }
    persist_cookies(&client);

    write_trends_outputs(&keywords, mode, &outcome, &outputs, &timestamp)?;
    println!("--- Analysis Complete ---\n");
    Ok(())
}

/// Console banners for the IOT and RQ phases, present for the phases `mode` runs.
fn phase_banners(mode: AnalysisMode, keywords: &[String]) -> (Option<String>, Option<String>) {
    let iot = mode.includes_iot().then(|| {
        let batches = chunk_keywords(keywords, MAX_KEYWORDS_PER_BATCH).len();
        format!(
            "--- Starting Interest Over Time Batch Processing ---\n\n\
             Found {} keywords, processing in {} batches.\n",
            keywords.len(),
            batches
        )
    });
    let rq = mode
        .includes_rq()
        .then(|| "--- Starting Related Queries Batch Processing ---\n".to_string());
    (iot, rq)
}

fn write_trends_outputs(
    keywords: &[String],
    mode: AnalysisMode,
    outcome: &AnalysisOutcome,
    outputs: &TrendsOutputs,
    timestamp: &str,
) -> Result<()> {
    let saved = export::save_csv_outputs(
        &outputs.output_dir,
        timestamp,
        outcome.iot.as_ref(),
        outcome.rq.as_ref(),
    )
    .context("Failed to save CSV output")?;

    if let Some(path) = &saved.iot {
        println!("Saved Interest Over Time data to '{}'\n", path.display());
    }
    if saved.top.is_some() || saved.rising.is_some() {
        println!("Consolidating and saving Related Queries data to CSV...\n");
    }
    if let Some(path) = &saved.top {
        println!("- Saved all 'Top' queries to '{}'\n", path.display());
    }
    if let Some(path) = &saved.rising {
        println!("- Saved all 'Rising' queries to '{}'\n", path.display());
    }

    if let Some(table) = &outcome.iot {
        let wanted = match outputs.plot {
            PlotChoice::Yes => true,
            PlotChoice::No => false,
            PlotChoice::Ask => confirm("Generate a plot of the IOT data? (y/n): ")?,
        };
        if wanted {
            let path = outputs.output_dir.join(chart::chart_filename(keywords, timestamp));
            std::fs::write(&path, chart::render_interest_chart(table))
                .with_context(|| format!("Failed to write chart {}", path.display()))?;
            println!("Chart saved successfully to '{}'\n", path.display());
        }
    }

    if outputs.xlsx {
        save_xlsx(&outputs.output_dir, timestamp, outcome)?;
    }

    if outputs.report {
        match &outcome.rq {
            Some(set) => print!("{}", export::render_related_report(set)),
            None if mode.includes_rq() => {
                println!("Could not generate report. No Related Queries data was found.\n")
            }
            None => {}
        }
    }

    Ok(())
}

fn save_xlsx(output_dir: &Path, timestamp: &str, outcome: &AnalysisOutcome) -> Result<()> {
    let bytes = export::build_xlsx_report(outcome.iot.as_ref(), outcome.rq.as_ref())
        .context("Failed to build XLSX report")?;
    let path = output_dir.join(format!("full_report_{}.xlsx", timestamp));
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved full report to '{}'\n", path.display());
    Ok(())
}

const TIMEFRAME_HELP: &str = "Specify desired time frame for search. Acceptable formats are:
* 'all' will show everything (all trend data)
* Specific date range can be entered in the format 'YYYY-MM-DD YYYY-MM-DD' (e.g. '2025-01-01 2025-09-08')
* Specific datetime range can be entered in the format 'YYYY-MM-DDTHH YYYY-MM-DDTHH' (e.g. '2025-01-01T00 2025-09-08T12')
* Current time minus time pattern (recent_time past_time):
   * By month (only works for 1, 3, or 12 months) (e.g. past 3 months is 'today 3-m')
   * Daily (only works for 1 or 7 days) (e.g. past week is 'now 7-d')
   * Hourly (only works for 1 or 4 hours) (e.g. past 4 hours is 'now 4-H')
";

async fn run_interactive(output_dir: PathBuf, proxy: Option<String>) -> Result<()> {
    println!("\n--- Google Trends Market Analyzer ---\n");

    let mode = loop {
        println!("Please select an analysis mode:");
        println!("1. Interest Over Time (IOT)");
        println!("2. Related Queries (RQ)");
        println!("3. Both IOT and RQ\n");
        let choice = prompt("Enter your choice (1, 2, or 3): ")?;
        match choice.as_str() {
            "1" | "2" | "3" => {
                println!();
                break choice.parse::<AnalysisMode>()?;
            }
            _ => println!("\nInvalid choice. Please enter 1, 2, or 3.\n"),
        }
    };

    let keywords = parse_keyword_list(&prompt("Enter keywords to analyze, separated by commas: ")?);
    if keywords.is_empty() {
        println!("\nInvalid input. Exiting.\n");
        return Ok(());
    }

    println!("\n\n{}", TIMEFRAME_HELP);
    let timeframe = loop {
        let input = prompt("Enter timeframe (Default is today 12-m): ")?;
        match Timeframe::parse(&input) {
            Ok(tf) => break tf,
            Err(e) => println!("{}\n", e),
        }
    };
    println!();

    let outputs = TrendsOutputs {
        output_dir,
        plot: PlotChoice::Ask,
        xlsx: false,
        report: true,
    };
    run_trends(keywords, mode, timeframe, proxy, outputs).await
}

// ============================================================================
// Dashboard
// ============================================================================

async fn run_dashboard(host: String, port: u16, proxy: Option<String>) -> Result<()> {
    info!(host = %host, port = port, "Starting dashboard");
    println!("Starting dashboard at http://{}:{}", host, port);

    let client = build_trends_client(proxy)?;
    let state = DashboardState::new(Arc::new(client), RetryPolicy::default());

    dashboard::serve(&host, port, state)
        .await
        .context("Server error")?;
    Ok(())
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(action: CookieAction) -> Result<()> {
    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", manager.path());
        }
        CookieAction::Import { file } => {
            let count = manager
                .import(&file)
                .with_context(|| format!("Failed to import cookies from {}", file.display()))?;
            println!("Cookie store now holds {} cookies ({:?})", count, manager.path());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_trends_defaults() {
        let cli = Cli::try_parse_from(["rustmonitor", "trends", "-k", "boho dress", "linen pants"])
            .expect("parses");
        match cli.command {
            Commands::Trends {
                keywords,
                mode,
                timeframe,
                output_dir,
                ..
            } => {
                assert_eq!(keywords, vec!["boho dress", "linen pants"]);
                assert_eq!(mode, AnalysisMode::Both);
                assert_eq!(timeframe.as_str(), "today 12-m");
                assert_eq!(output_dir, PathBuf::from("downloads/gtrends_reports"));
            }
            _ => panic!("expected trends command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_timeframe() {
        let bad_timeframe = ["rustmonitor", "trends", "-k", "a", "-t", "yesterday"];
        assert!(Cli::try_parse_from(bad_timeframe).is_err());
        assert!(Cli::try_parse_from(["rustmonitor", "trends", "-k", "a", "-m", "4"]).is_err());
    }

    #[test]
    fn test_cli_parses_arxiv() {
        let cli = Cli::try_parse_from([
            "rustmonitor",
            "arxiv",
            "-q",
            "transformers",
            "-n",
            "5",
            "-s",
            "updated",
            "--download",
            "none",
        ])
        .expect("parses");
        match cli.command {
            Commands::Arxiv {
                query,
                num_papers,
                sort_by,
                download,
                output_dir,
                ..
            } => {
                assert_eq!(query, "transformers");
                assert_eq!(num_papers, 5);
                assert_eq!(sort_by, "updated");
                assert_eq!(download, DownloadMode::None);
                assert_eq!(output_dir, PathBuf::from(DEFAULT_REPORT_DIR));
            }
            _ => panic!("expected arxiv command"),
        }
    }

    #[test]
    fn test_phase_banners_follow_mode() {
        let kws: Vec<String> = (1..=7).map(|i| format!("kw{}", i)).collect();

        let (iot, rq) = phase_banners(AnalysisMode::Both, &kws);
        let iot = iot.expect("iot banner");
        assert!(iot.starts_with("--- Starting Interest Over Time Batch Processing ---"));
        assert!(iot.contains("Found 7 keywords, processing in 2 batches."));
        assert_eq!(rq.as_deref(), Some("--- Starting Related Queries Batch Processing ---\n"));

        let (iot, rq) = phase_banners(AnalysisMode::Rq, &kws);
        assert!(iot.is_none());
        assert!(rq.is_some());

        let (iot, rq) = phase_banners(AnalysisMode::Iot, &kws);
        assert!(iot.is_some());
        assert!(rq.is_none());
    }

    #[test]
    fn test_cli_serve_defaults() {
        let cli = Cli::try_parse_from(["rustmonitor", "serve"]).expect("parses");
        match cli.command {
            Commands::Serve { port, host, .. } => {
                assert_eq!(port, 8501);
                assert_eq!(host, "127.0.0.1");
            }
            _ => panic!("expected serve command"),
        }
    }
}
