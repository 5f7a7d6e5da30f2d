//! CLI binary for ddr-report.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs the pipeline and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use ddr_report::{
    generate_report, list_models, ExtractionMode, PipelineConfig, PipelineProgress,
    ProgressCallback, PromptSet, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a stage counter at the bottom of the terminal plus one
/// log line per finished stage. Stage lines may interleave in concurrent mode.
struct CliProgress {
    bar: ProgressBar,
    start_times: Mutex<HashMap<Stage, Instant>>,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Checking configuration…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, stage: Stage) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&stage))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgress for CliProgress {
    fn on_run_start(&self, total_stages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:30.green/238}] {pos}/{len} stages  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_stages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar
            .println(format!("{} {}", cyan("◆"), bold("DDR generation started")));
    }

    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(stage, Instant::now());
        }
        self.bar.set_message(stage.description().to_string());
    }

    fn on_stage_complete(&self, stage: Stage, chars: usize, path: &Path) {
        let secs = self.elapsed_secs(stage);
        self.bar.println(format!(
            "  {} [{}/{}] {:<32} {}  {}  {}",
            green("✓"),
            stage.ordinal(),
            Stage::ALL.len(),
            stage.description(),
            dim(&format!("{chars:>7} chars")),
            dim(&format!("{secs:.1}s")),
            dim(&path.display().to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        let secs = self.elapsed_secs(stage);
        let msg = if error.chars().count() > 100 {
            let cut: String = error.chars().take(99).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} [{}/{}] {:<32} {}  {}",
            red("✗"),
            stage.ordinal(),
            Stage::ALL.len(),
            stage.description(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_page_ocr(&self, stage: Stage, page_num: usize, total_pages: usize) {
        self.bar.set_message(format!(
            "{}: page {page_num}/{total_pages} transcribed",
            stage.description()
        ));
    }

    fn on_run_complete(&self, _output_dir: &Path) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Full run with defaults (data/Thermal Images.pdf + data/Sample Report.pdf → output/)
  ddr

  # Custom inputs and output directory
  ddr --thermal scans/thermal.pdf --inspection scans/site.pdf -o reports/unit-4

  # Scanned documents: transcribe page images instead of reading the text layer
  ddr --extraction ocr --dpi 200

  # Read text where possible, fall back to OCR for image-only PDFs
  ddr --extraction auto

  # Analyse both documents at the same time
  ddr --concurrent

  # Machine-readable run report
  ddr --json > run.json

  # Which models does my key have access to?
  ddr --list-models

ARTIFACTS (written to the output directory, overwritten each run):
  thermal_raw.txt            extracted thermal text, one marker per page
  inspection_raw.txt         extracted inspection text, one marker per page
  thermal_structured.txt     structured thermal summary
  inspection_structured.txt  structured inspection summary
  final_ddr_report.txt       the Diagnostic Defect Report
  thermal_pages/, inspection_pages/   page images (OCR only)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY    Gemini API key (variable name configurable with --api-key-env)
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Override log filtering (e.g. ddr_report=debug)

  A .env file in the working directory is loaded before flags are parsed.
"#;

/// Generate a Diagnostic Defect Report from thermal and inspection PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ddr",
    version,
    about = "Generate a Diagnostic Defect Report from thermal and inspection PDFs",
    long_about = "Extracts the text of a thermal-imaging report and a property-inspection \
report, structures each with a language model, and synthesises both into a single \
Diagnostic Defect Report. Every intermediate result is saved to the output directory.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Thermal-imaging PDF.
    #[arg(long, env = "DDR_THERMAL_PDF")]
    thermal: Option<PathBuf>,

    /// Property-inspection PDF.
    #[arg(long, env = "DDR_INSPECTION_PDF")]
    inspection: Option<PathBuf>,

    /// Directory receiving the artifacts.
    #[arg(short, long, env = "DDR_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Gemini model ID (default: gemini-2.5-flash).
    #[arg(long, env = "DDR_MODEL")]
    model: Option<String>,

    /// Environment variable holding the API key (default: GEMINI_API_KEY).
    #[arg(long, env = "DDR_API_KEY_ENV")]
    api_key_env: Option<String>,

    /// How text is obtained from each PDF.
    #[arg(long, env = "DDR_EXTRACTION", value_enum, default_value = "text")]
    extraction: ExtractionArg,

    /// Rendering DPI for the OCR path (72–400).
    #[arg(long, env = "DDR_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password, applied to both documents.
    #[arg(long, env = "DDR_PASSWORD")]
    password: Option<String>,

    /// Directory with prompt overrides (thermal.txt, inspection.txt, report.txt, ocr.txt).
    #[arg(long, env = "DDR_PROMPTS_DIR")]
    prompts_dir: Option<PathBuf>,

    /// Extract and analyse the two documents concurrently.
    #[arg(long, env = "DDR_CONCURRENT")]
    concurrent: bool,

    /// Concurrent page transcriptions on the OCR path.
    #[arg(long, env = "DDR_OCR_CONCURRENCY", default_value_t = 4)]
    ocr_concurrency: usize,

    /// Sampling temperature (service default when unset).
    #[arg(long, env = "DDR_TEMPERATURE")]
    temperature: Option<f32>,

    /// Max generated tokens per call (service default when unset).
    #[arg(long, env = "DDR_MAX_TOKENS")]
    max_tokens: Option<u32>,

    /// Per-call timeout in seconds.
    #[arg(long, env = "DDR_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the run report as JSON on stdout.
    #[arg(long, env = "DDR_JSON")]
    json: bool,

    /// Disable the progress display.
    #[arg(long, env = "DDR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DDR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DDR_QUIET")]
    quiet: bool,

    /// List the models available for the API key and exit.
    #[arg(long)]
    list_models: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ExtractionArg {
    Text,
    Ocr,
    Auto,
}

impl From<ExtractionArg> for ExtractionMode {
    fn from(v: ExtractionArg) -> Self {
        match v {
            ExtractionArg::Text => ExtractionMode::Text,
            ExtractionArg::Ocr => ExtractionMode::Ocr,
            ExtractionArg::Auto => ExtractionMode::Auto,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed flags.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress display; keep them
    // for --no-progress runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_models;
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

    let mut config = build_config(&cli).await?;

    // Nothing is drawn or printed until the key is known to exist.
    config
        .load_credential()
        .context("Cannot call the completion service")?;

    // ── Model listing ────────────────────────────────────────────────────
    if cli.list_models {
        let models = list_models(&config)
            .await
            .context("Failed to list models")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&models).context("Failed to serialise models")?
            );
        } else {
            for m in &models {
                let name = m.name.strip_prefix("models/").unwrap_or(&m.name);
                match m.display_name {
                    Some(ref display) => println!("{name:<40} {}", dim(display)),
                    None => println!("{name}"),
                }
            }
        }
        return Ok(());
    }

    // ── Run pipeline ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgress::new);
    if let Some(ref p) = progress {
        config.progress_callback = Some(p.clone() as ProgressCallback);
    } else if !cli.quiet && !cli.json {
        eprintln!("{}", bold("DDR generation started"));
    }

    let report = match generate_report(&config).await {
        Ok(report) => report,
        Err(e) => {
            if let Some(ref p) = progress {
                p.bar.abandon();
            }
            return Err(e).context("DDR generation failed");
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        if !show_progress {
            for a in &report.artifacts {
                eprintln!(
                    "  [{}/{}] {:<32} {:>7} chars  {}",
                    a.stage.ordinal(),
                    Stage::ALL.len(),
                    a.stage.description(),
                    a.chars,
                    a.path.display()
                );
            }
        }
        eprintln!(
            "{} DDR report generated  →  {}",
            green("✔"),
            bold(&Stage::Synthesize.artifact_path(&report.output_dir).display().to_string()),
        );
        eprintln!(
            "   {} model calls  {} tokens in  /  {} tokens out  {}ms total",
            report.stats.service_calls,
            dim(&report.stats.total_input_tokens.to_string()),
            dim(&report.stats.total_output_tokens.to_string()),
            report.stats.total_duration_ms,
        );
        if !report.page_images.is_empty() {
            eprintln!("   {} page images saved", report.page_images.len());
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`. Unset flags keep the library defaults.
async fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let prompts = match cli.prompts_dir {
        Some(ref dir) => PromptSet::from_dir(dir)
            .await
            .with_context(|| format!("Failed to load prompts from {:?}", dir))?,
        None => PromptSet::default(),
    };

    let mut builder = PipelineConfig::builder()
        .extraction(cli.extraction.into())
        .dpi(cli.dpi)
        .ocr_concurrency(cli.ocr_concurrency)
        .concurrent_domains(cli.concurrent)
        .api_timeout_secs(cli.api_timeout)
        .prompts(prompts);

    if let Some(ref p) = cli.thermal {
        builder = builder.thermal_pdf(p);
    }
    if let Some(ref p) = cli.inspection {
        builder = builder.inspection_pdf(p);
    }
    if let Some(ref p) = cli.output_dir {
        builder = builder.output_dir(p);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    if let Some(ref var) = cli.api_key_env {
        builder = builder.credential_env(var);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }
    if let Some(n) = cli.max_tokens {
        builder = builder.max_output_tokens(n);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    builder.build().context("Invalid configuration")
}
