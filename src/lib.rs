//! # ddr-report
//!
//! Generate a Diagnostic Defect Report (DDR) for a building from two PDFs:
//! a thermal-imaging report and a property-inspection report.
//!
//! ## Why this crate?
//!
//! The two source reports describe the same property from different angles
//! and in inconsistent layouts. Rather than parse either format, this crate
//! pulls the raw text out of both, asks a language model to structure each
//! one, then asks it again to merge the two structured summaries into a single
//! client-facing report. Every intermediate result is written to disk so a
//! run can be audited stage by stage.
//!
//! ## Pipeline Overview
//!
//! ```text
//! thermal.pdf ────┐                          ┌── thermal_structured.txt ──┐
//!                 ├─ 1-2. Extract  (pdfium)  ┤                            ├─ 5. Synthesize
//! inspection.pdf ─┘     *_raw.txt            └─ inspection_structured.txt ┘   final_ddr_report.txt
//!                          3-4. Analyze (one model call each)
//! ```
//!
//! Scanned documents with no usable text layer can be transcribed page by
//! page instead ([`ExtractionMode::Ocr`] / [`ExtractionMode::Auto`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ddr_report::{generate_report, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from GEMINI_API_KEY
//!     let config = PipelineConfig::builder()
//!         .thermal_pdf("data/Thermal Images.pdf")
//!         .inspection_pdf("data/Sample Report.pdf")
//!         .output_dir("output")
//!         .build()?;
//!     let report = generate_report(&config).await?;
//!     println!("{}", report.final_report);
//!     eprintln!("{} model calls", report.stats.service_calls);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ddr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ddr-report = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifacts;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifacts::{ArtifactRecord, Domain, PipelineReport, RunStats, Stage};
pub use config::{Credential, ExtractionMode, PipelineConfig, PipelineConfigBuilder};
pub use error::{DdrError, ErrorKind};
pub use pipeline::extract::{DocumentExtractor, PageImage, PdfiumExtractor};
pub use progress::{NoopProgress, PipelineProgress, ProgressCallback};
pub use prompts::PromptSet;
pub use report::{generate_report, generate_report_sync, generate_report_with, list_models};
pub use service::gemini::ModelInfo;
pub use service::llm::LlmService;
pub use service::{Completion, CompletionRequest, CompletionService, InlineImage};
