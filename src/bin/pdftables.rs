//! CLI binary for edgequake-pdftables.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig`, runs the batch and prints a per-document summary.
//!
//! Exit codes: 0 when every document succeeded, 1 when at least one failed,
//! 2 when the run could not start (bad flags, missing credentials, unusable
//! output directory).

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdftables::{
    collect_inputs, convert_batch, inspect, BatchProgressCallback, BatchReport, DocumentState,
    ExtractionConfig, ProgressCallback, DEFAULT_MODEL, DEFAULT_OUTPUT_DIR, DEFAULT_PROVIDER,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// At least one document failed.
const EXIT_DOCUMENT_FAILED: u8 = 1;
/// The run could not start.
const EXIT_STARTUP_FAILED: u8 = 2;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the documents of the batch and one log
/// line per finished document. Documents may finish out of order when
/// `--concurrency` is above 1.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut t| t.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting tables from {total_documents} document(s)…"))
        ));
    }

    fn on_document_start(&self, index: usize, path: &Path) {
        if let Ok(mut t) = self.start_times.lock() {
            t.insert(index, Instant::now());
        }
        self.bar.set_message(file_name(path));
    }

    fn on_document_state(&self, _index: usize, path: &Path, state: DocumentState) {
        if !state.is_terminal() {
            self.bar
                .set_message(format!("{}: {}", file_name(path), state));
        }
    }

    fn on_document_complete(&self, index: usize, path: &Path, artifacts: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            file_name(path),
            dim(&format!("{artifacts} file(s)")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, path: &Path, error: &str) {
        let secs = self.elapsed_secs(index);
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            file_name(path),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_documents: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract tables from one PDF into ./json_outputs
  pdftables "Rate Notification.pdf"

  # Every PDF of a directory, two at a time, into ./tables
  pdftables pdfs/ -o tables --concurrency 2

  # Keep the split sub-documents next to the JSON
  pdftables --keep-splits annual-report.pdf

  # Machine-readable run report
  pdftables --json pdfs/ > report.json

  # Page count and PDF version only (no API key needed)
  pdftables --inspect-only document.pdf

OUTPUT FILES:
  <stem>.json                      documents of up to 23 pages
  <stem>_pages_<s>-<e>.json        one per detected table range of longer documents
  splits/<stem>_pages_<s>-<e>.pdf  with --keep-splits

  Each file is a JSON array of {"page": <int>, "table": [{<column>: <value>, ...}, ...]}.
  Pages are numbered as in the input document.

EXIT CODES:
  0  every document succeeded
  1  at least one document failed (see the summary)
  2  the run could not start

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key (--provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (--provider anthropic)
  EDGEQUAKE_LLM_PROVIDER  Override provider
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override the log filter
"#;

/// Extract tables from PDF documents into JSON using multimodal LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdftables",
    version,
    about = "Extract tables from PDF documents into JSON using multimodal LLMs",
    long_about = "Find the tables in PDF documents and write them as JSON. Documents longer \
than 23 pages are first scanned for table page ranges and split, so each model call only \
sees the pages that matter.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or directories of PDFs.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving the JSON files.
    #[arg(short, long, env = "PDFTABLES_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// LLM model ID.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_LLM_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// Number of documents processed at once.
    #[arg(short, long, env = "PDFTABLES_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Retries per model call on transient failures.
    #[arg(long, env = "PDFTABLES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "PDFTABLES_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PDFTABLES_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFTABLES_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file replacing the built-in extraction prompt.
    #[arg(long, env = "PDFTABLES_EXTRACTION_PROMPT")]
    extraction_prompt: Option<PathBuf>,

    /// Also write split sub-documents to <output-dir>/splits/.
    #[arg(long, env = "PDFTABLES_KEEP_SPLITS")]
    keep_splits: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "PDFTABLES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFTABLES_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and PDF version only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTABLES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", red("error:"), e);
            ExitCode::from(EXIT_STARTUP_FAILED)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ExitCode> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect_inputs(cli).await;
    }

    tokio::fs::create_dir_all(&cli.output_dir)
        .await
        .with_context(|| {
            format!(
                "Cannot create output directory {}",
                cli.output_dir.display()
            )
        })?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(cli, progress_cb).await?;

    // ── Run batch ────────────────────────────────────────────────────────
    let report = convert_batch(&cli.inputs, &config).await.map_err(|e| {
        let hint = e.hint().map(|h| format!("\n{h}")).unwrap_or_default();
        anyhow::anyhow!("{e}{hint}")
    })?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    }
    if !cli.quiet {
        print_summary(&report);
    } else {
        print_failures(&report);
    }

    Ok(ExitCode::from(batch_exit_code(&report)))
}

fn batch_exit_code(report: &BatchReport) -> u8 {
    if report.is_success() {
        0
    } else {
        EXIT_DOCUMENT_FAILED
    }
}

async fn inspect_inputs(cli: &Cli) -> Result<ExitCode> {
    let inputs = collect_inputs(&cli.inputs).await?;
    let mut infos = Vec::new();
    let mut failed = false;

    for path in &inputs {
        match inspect(path).await {
            Ok(info) => infos.push(info),
            Err(e) => {
                failed = true;
                eprintln!("{} {}  [{}] {}", red("✗"), path.display(), e.kind(), e);
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&infos).context("Failed to serialise metadata")?
        );
    } else {
        for info in &infos {
            println!("File:         {}", info.path.display());
            println!("Pages:        {}", info.page_count);
            println!("PDF Version:  {}", info.pdf_version);
            println!("Size:         {} bytes", info.size_bytes);
            println!(
                "Split:        {}",
                if info.page_count > edgequake_pdftables::DEFAULT_SPLIT_THRESHOLD {
                    "yes (ranges detected first)"
                } else {
                    "no"
                }
            );
        }
    }

    Ok(if failed {
        ExitCode::from(EXIT_DOCUMENT_FAILED)
    } else {
        ExitCode::SUCCESS
    })
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .output_dir(&cli.output_dir)
        .model(&cli.model)
        .provider_name(&cli.provider)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .keep_splits(cli.keep_splits);

    if let Some(ref path) = cli.extraction_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read extraction prompt from {:?}", path))?;
        builder = builder.extraction_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &BatchReport) {
    for doc in &report.documents {
        if doc.succeeded() {
            let files = if doc.artifacts.is_empty() {
                dim("no tables found")
            } else {
                doc.artifacts
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            eprintln!(
                "{} {}  {}  {}",
                green("✔"),
                doc.input.display(),
                dim(&format!(
                    "{} table page(s), {} row(s)",
                    doc.pages_with_tables, doc.rows
                )),
                files
            );
        }
    }
    print_failures(report);

    let failed = report.failed();
    let total = report.documents.len();
    eprintln!(
        "{} {}/{} documents  {}ms",
        if failed == 0 {
            green("✔")
        } else if failed == total {
            red("✘")
        } else {
            cyan("⚠")
        },
        bold(&report.succeeded().to_string()),
        total,
        report.duration_ms,
    );
    let input_tokens: usize = report.documents.iter().map(|d| d.input_tokens).sum();
    let output_tokens: usize = report.documents.iter().map(|d| d.output_tokens).sum();
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&input_tokens.to_string()),
        dim(&output_tokens.to_string()),
    );
}

fn print_failures(report: &BatchReport) {
    for doc in report.documents.iter().filter(|d| !d.succeeded()) {
        let kind = match doc.state {
            DocumentState::Failed(kind) => kind.to_string(),
            other => other.to_string(),
        };
        eprintln!(
            "{} {}  [{}] {}",
            red("✗"),
            doc.input.display(),
            kind,
            doc.error.as_deref().unwrap_or("unknown error")
        );
        if let Some(ref hint) = doc.hint {
            eprintln!("  {}", dim(hint));
        }
    }
}
