//! Command-line surface of the `ats-autofill` binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{BrowserBuilder, BrowserConfig};
use crate::error::Result;
use crate::extract::FormExtractor;
use crate::fill::{FieldStatus, FillResult, FormFiller};
use crate::schema::{FormDescriptor, WaitStrategy, DEFAULT_LOAD_TIMEOUT_MS};

/// Exit code for a run that worked but found no form.
pub const EXIT_EMPTY: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "ats-autofill", version, about = "Extract and fill job application forms")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Run Chrome without a window.
    #[arg(long, global = true, env = "ATS_AUTOFILL_HEADLESS")]
    pub headless: bool,

    /// Disable fingerprint evasion and human pacing.
    #[arg(long, global = true)]
    pub no_stealth: bool,

    #[arg(long, global = true, env = "ATS_AUTOFILL_CHROME")]
    pub chrome_path: Option<String>,

    /// load, domcontentloaded or networkidle.
    #[arg(long, global = true, default_value = "networkidle", env = "ATS_AUTOFILL_WAIT")]
    pub wait_strategy: WaitStrategy,

    #[arg(long, global = true, default_value_t = DEFAULT_LOAD_TIMEOUT_MS, env = "ATS_AUTOFILL_TIMEOUT_MS")]
    pub timeout_ms: u64,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract the application form at URL into a descriptor file.
    Extract {
        url: String,
        #[arg(long, default_value = ".", env = "ATS_AUTOFILL_OUT_DIR")]
        out_dir: PathBuf,
    },
    /// Extract several URLs concurrently, one descriptor file each.
    ExtractMany {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value = ".", env = "ATS_AUTOFILL_OUT_DIR")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
    },
    /// Fill a populated descriptor and keep the browser open for review.
    Fill {
        file: PathBuf,
        /// Close after N seconds instead of waiting for Enter.
        #[arg(long)]
        review_secs: Option<u64>,
        /// Append the URL here when the fill succeeded.
        #[arg(long, env = "ATS_AUTOFILL_TRACK_FILE")]
        track_file: Option<PathBuf>,
    },
}

impl Cli {
    pub fn browser_config(&self) -> BrowserConfig {
        let mut builder = BrowserBuilder::new()
            .headless(self.headless)
            .stealth(!self.no_stealth)
            .wait_strategy(self.wait_strategy)
            .load_timeout(Duration::from_millis(self.timeout_ms));
        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_path(path.clone());
        }
        if self.no_stealth {
            builder = builder.typing_delay_ms(0, 0);
        }
        builder.build_config()
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the parsed command and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let config = cli.browser_config();
    match cli.command {
        Commands::Extract { url, out_dir } => cmd_extract(config, &url, &out_dir).await,
        Commands::ExtractMany {
            urls,
            out_dir,
            concurrency,
        } => cmd_extract_many(config, &urls, &out_dir, concurrency).await,
        Commands::Fill {
            file,
            review_secs,
            track_file,
        } => cmd_fill(config, &file, review_secs, track_file.as_deref()).await,
    }
}

async fn cmd_extract(config: BrowserConfig, url: &str, out_dir: &Path) -> Result<i32> {
    let descriptor = FormExtractor::new(config).extract(url).await?;
    let path = descriptor.save_in(out_dir)?;
    print_summary(&descriptor, &path);
    Ok(if descriptor.is_empty() { EXIT_EMPTY } else { 0 })
}

async fn cmd_extract_many(config: BrowserConfig, urls: &[String], out_dir: &Path, concurrency: usize) -> Result<i32> {
    let results = FormExtractor::new(config).extract_all(urls, concurrency).await;
    let mut code = 0;
    for (url, outcome) in results {
        match outcome {
            Ok(descriptor) => {
                let path = descriptor.save_in(out_dir)?;
                print_summary(&descriptor, &path);
                if descriptor.is_empty() && code == 0 {
                    code = EXIT_EMPTY;
                }
            }
            Err(e) => {
                error!(url = %url, error = %e, "extraction failed");
                code = 1;
            }
        }
    }
    Ok(code)
}

fn print_summary(descriptor: &FormDescriptor, path: &Path) {
    println!(
        "{}: {} fields ({} required) -> {}",
        descriptor.source_url,
        descriptor.total_fields,
        descriptor.required_fields,
        path.display()
    );
}

async fn cmd_fill(config: BrowserConfig, file: &Path, review_secs: Option<u64>, track_file: Option<&Path>) -> Result<i32> {
    let descriptor = FormDescriptor::load(file)?;
    let filled = FormFiller::new(config).fill(&descriptor).await?;
    print_report(&descriptor, filled.result());

    match review_secs {
        Some(secs) => {
            info!(secs, "keeping the browser open for review");
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
        None => {
            println!("Review the form in the browser, then press Enter to close it.");
            let mut line = String::new();
            let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
            stdin.read_line(&mut line).await?;
        }
    }

    let result = filled.close().await;
    if result.success {
        if let Some(path) = track_file {
            match track(path, &result.source_url) {
                Ok(()) => info!(file = %path.display(), "recorded filled URL"),
                Err(e) => warn!(file = %path.display(), error = %e, "could not record filled URL"),
            }
        }
        Ok(0)
    } else {
        Ok(1)
    }
}

fn print_report(descriptor: &FormDescriptor, result: &FillResult) {
    for field in &descriptor.fields {
        let Some(report) = result.status(&field.id) else {
            continue;
        };
        let status = match report.status {
            FieldStatus::Applied => "applied",
            FieldStatus::Skipped => "skipped",
            FieldStatus::Failed => "FAILED",
        };
        let marker = if field.required { "*" } else { " " };
        let reason = report.reason.map(|r| r.as_str()).unwrap_or("");
        let detail = report.detail.as_deref().unwrap_or("");
        println!("{marker} {:<8} {:<40} {reason} {detail}", status, field.question);
    }
    println!(
        "{}: {}",
        result.source_url,
        if result.success { "all required fields applied" } else { "required fields missing" }
    );
}

/// Append one URL to the applied-jobs tracking file.
pub fn track(path: &Path, url: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{url}")
}
