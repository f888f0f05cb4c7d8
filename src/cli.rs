//! CLI parsing and orchestration. Merges flags with the config file, runs the pipeline, maps
//! errors to exit codes.

use crate::config::{self, Config, ConfigError, RunConfig};
use crate::extract::HtmlExtractor;
use crate::fetch::PoliteClient;
use crate::pipeline::{self, PipelineError, RunReport};
use clap::Parser;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Report(String),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Config(_) => 1,
            CliRunError::Pipeline(PipelineError::Config(_)) => 1,
            CliRunError::Pipeline(PipelineError::NoArticlesProcessed { .. }) => 2,
            CliRunError::Pipeline(PipelineError::OutputDir { .. })
            | CliRunError::Pipeline(PipelineError::Epub(_))
            | CliRunError::Report(_) => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "artpub")]
#[command(about = "Bundle web articles, with their images, into a single EPUB")]
#[command(
    after_help = "Config file keys (output_dir, user_agent, timeout_secs, request_delay_millis, page_retry_count, asset_retry_count, language, disallowed_tags) are read from ./artpub.toml or ~/.config/artpub/config.toml. CLI flags override config."
)]
pub struct Args {
    /// Article URLs, processed in order. Each must start with http:// or https://.
    #[arg(short, long, num_args = 1.., required = true)]
    pub urls: Vec<String>,

    /// Output directory, created if missing.
    /// Default: config output_dir, then the current directory.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Verbosity: -v for progress detail, -vv for per-request debugging.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Cookies for article page requests, e.g. "cookie1=value1; cookie2=value2".
    #[arg(short, long)]
    pub cookies: Option<String>,

    /// Output file name. Default: inferred from the first article's title.
    #[arg(short, long)]
    pub epub: Option<String>,

    /// Book title. Default: the first article's title.
    #[arg(short, long)]
    pub title: Option<String>,

    /// Book author, listed before the authors found in the articles.
    #[arg(short, long)]
    pub author: Option<String>,

    /// Suppress progress output (errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Per-attempt request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Attempts per image (overrides config; default 3).
    #[arg(long)]
    pub asset_retries: Option<u32>,

    /// Write a JSON summary of the run (documents, skipped URLs, warnings) to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Install the tracing subscriber. `RUST_LOG` overrides the verbosity flags.
pub fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match (args.quiet, args.verbose) {
        (true, _) => "artpub=error",
        (false, 0) => "artpub=warn",
        (false, 1) => "artpub=info",
        (false, _) => "artpub=debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Merge CLI flags over the config file over built-in defaults.
fn build_run_config(args: &Args, file: Option<&Config>) -> RunConfig {
    let output_dir = args
        .out_dir
        .clone()
        .or_else(|| file.and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    let mut rc = RunConfig::new(args.urls.clone(), output_dir);
    rc.cookies = args.cookies.clone();
    rc.filename = args.epub.clone();
    rc.title = args.title.clone();
    rc.author = args.author.clone();

    if let Some(lang) = file.and_then(|c| c.language.clone()) {
        rc.default_language = lang;
    }
    if let Some(tags) = file.and_then(|c| c.disallowed_tags.clone()) {
        rc.disallowed_tags = tags;
    }
    let timeout_secs = args
        .timeout
        .or_else(|| file.and_then(|c| c.timeout_secs))
        .unwrap_or(config::DEFAULT_TIMEOUT_SECS);
    rc.page_retry.per_attempt_timeout = Duration::from_secs(timeout_secs);
    rc.asset_retry.per_attempt_timeout = Duration::from_secs(timeout_secs);
    if let Some(n) = file.and_then(|c| c.page_retry_count) {
        rc.page_retry.max_retries = n.max(1);
    }
    if let Some(n) = args
        .asset_retries
        .or_else(|| file.and_then(|c| c.asset_retry_count))
    {
        rc.asset_retry.max_retries = n.max(1);
    }
    rc
}

fn build_client(args: &Args, file: Option<&Config>) -> Result<PoliteClient, CliRunError> {
    let mut builder = PoliteClient::builder();
    if let Some(ua) = args
        .user_agent
        .clone()
        .or_else(|| file.and_then(|c| c.user_agent.clone()))
    {
        builder = builder.user_agent(ua);
    }
    if let Some(millis) = file.and_then(|c| c.request_delay_millis) {
        builder = builder.delay_millis(millis);
    }
    if let Some(secs) = args.timeout.or_else(|| file.and_then(|c| c.timeout_secs)) {
        builder = builder.timeout_secs(secs);
    }
    builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))
}

fn new_progress_bar(total: u64) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new(total);
    let template = "{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})";
    if let Ok(style) = indicatif::ProgressStyle::with_template(template) {
        bar.set_style(
            style
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
    }
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn write_report(report: &RunReport, path: &Path) -> Result<(), CliRunError> {
    let f = std::fs::File::create(path).map_err(|e| {
        CliRunError::Report(format!("Cannot write report {}: {}", path.display(), e))
    })?;
    serde_json::to_writer_pretty(f, report)
        .map_err(|e| CliRunError::Report(format!("Failed to write report: {}", e)))
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let file_config = config::load_config()?;
    let run_config = build_run_config(args, file_config.as_ref());
    // Surface configuration errors before opening any connection.
    run_config.validate()?;
    let mut client = build_client(args, file_config.as_ref())?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: usize, total: usize, url: &str| {
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| new_progress_bar(total as u64));
        pb.set_position(n.saturating_sub(1) as u64);
        pb.set_message(format!("Fetching {}", url));
    };
    let progress: Option<pipeline::Progress<'_>> = if args.quiet {
        None
    } else {
        Some(&progress_cb)
    };

    let result = pipeline::run(&run_config, &mut client, &HtmlExtractor, progress);

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }
    let report = result?;

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }
    if !args.quiet {
        eprintln!(
            "Wrote {} ({} article(s), {} image(s), {} skipped, {} warning(s))",
            report.output_path.display(),
            report.documents.len(),
            report.assets,
            report.skipped.len(),
            report.warnings.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["artpub"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_original_flag_set() {
        let a = args(&[
            "-u",
            "https://a/1",
            "https://a/2",
            "-o",
            "out",
            "-vv",
            "-c",
            "k=v",
            "-e",
            "book.epub",
            "-t",
            "T",
            "-a",
            "Me",
        ]);
        assert_eq!(a.urls, ["https://a/1", "https://a/2"]);
        assert_eq!(a.out_dir, Some(PathBuf::from("out")));
        assert_eq!(a.verbose, 2);
        assert_eq!(a.cookies.as_deref(), Some("k=v"));
        assert_eq!(a.epub.as_deref(), Some("book.epub"));
        assert_eq!(a.title.as_deref(), Some("T"));
        assert_eq!(a.author.as_deref(), Some("Me"));
    }

    #[test]
    fn urls_are_required() {
        assert!(Args::try_parse_from(["artpub", "-o", "out"]).is_err());
    }

    #[test]
    fn cli_overrides_config_file() {
        let file: Config = toml::from_str(
            r#"
            output_dir = "from-config"
            timeout_secs = 5
            asset_retry_count = 7
            page_retry_count = 4
            language = "nl"
            disallowed_tags = ["script"]
        "#,
        )
        .unwrap();
        let a = args(&["-u", "https://a/1", "--timeout", "9"]);
        let rc = build_run_config(&a, Some(&file));
        assert_eq!(rc.output_dir, PathBuf::from("from-config"));
        assert_eq!(rc.page_retry.per_attempt_timeout, Duration::from_secs(9));
        assert_eq!(rc.asset_retry.max_retries, 7);
        assert_eq!(rc.page_retry.max_retries, 4);
        assert_eq!(rc.default_language, "nl");
        assert_eq!(rc.disallowed_tags, ["script"]);

        let a = args(&["-u", "https://a/1", "-o", "cli", "--asset-retries", "0"]);
        let rc = build_run_config(&a, Some(&file));
        assert_eq!(rc.output_dir, PathBuf::from("cli"));
        assert_eq!(rc.asset_retry.max_retries, 1);
    }

    #[test]
    fn defaults_without_config() {
        let rc = build_run_config(&args(&["-u", "https://a/1"]), None);
        assert_eq!(rc.output_dir, PathBuf::from("."));
        assert_eq!(rc.default_language, "en");
        assert_eq!(rc.asset_retry.max_retries, config::DEFAULT_ASSET_RETRY_COUNT);
        assert!(rc.disallowed_tags.iter().any(|t| t == "script"));
    }

    #[test]
    fn cli_run_error_exit_codes() {
        assert_eq!(CliRunError::InvalidInput("x".into()).exit_code(), 1);
        assert_eq!(CliRunError::Config(ConfigError::NoUrls).exit_code(), 1);
        assert_eq!(
            CliRunError::Pipeline(PipelineError::NoArticlesProcessed { attempted: 1 }).exit_code(),
            2
        );
        assert_eq!(
            CliRunError::Pipeline(PipelineError::Epub(crate::epub::EpubError::NoDocuments))
                .exit_code(),
            3
        );
        assert_eq!(CliRunError::Report("x".into()).exit_code(), 3);
    }
}
