//! Pipeline orchestration: two PDFs in, five artifacts out.
//!
//! [`generate_report`] is the primary entry point. It loads the credential,
//! builds the production service and extractor, then hands over to
//! [`generate_report_with`], which is also what tests drive with stubs.
//!
//! Stages run in [`Stage::ALL`] order and each one persists its artifact
//! before the next starts, so a failed run leaves every completed stage's
//! output on disk. There is no retry and no partial success: the first
//! failure ends the run, attributed to the stage it happened in.

use crate::artifacts::{
    ensure_output_dir, persist_stage, ArtifactRecord, Domain, PipelineReport, RunStats, Stage,
};
use crate::config::{ExtractionMode, PipelineConfig};
use crate::error::DdrError;
use crate::pipeline::{analyze, extract, ocr, synthesize};
use crate::pipeline::extract::{DocumentExtractor, PdfiumExtractor};
use crate::service::gemini::{self, ModelInfo};
use crate::service::{CompletionService, Metered};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Run the full pipeline with the Gemini service and pdfium.
///
/// # Errors
/// A missing or empty credential fails with a
/// [`crate::error::ErrorKind::Configuration`] error before any file is
/// touched. Every later failure is a [`DdrError::Stage`] naming the stage.
pub async fn generate_report(config: &PipelineConfig) -> Result<PipelineReport, DdrError> {
    let credential = config.load_credential()?;
    let service = gemini::service(config, &credential);
    let extractor = PdfiumExtractor::from_config(config);
    generate_report_with(config, &service, &extractor).await
}

/// Synchronous wrapper around [`generate_report`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_report_sync(config: &PipelineConfig) -> Result<PipelineReport, DdrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DdrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_report(config))
}

/// List the models the configured credential can use.
pub async fn list_models(config: &PipelineConfig) -> Result<Vec<ModelInfo>, DdrError> {
    let credential = config.load_credential()?;
    gemini::list_models(config, &credential).await
}

/// Run the pipeline against caller-supplied service and extractor.
pub async fn generate_report_with(
    config: &PipelineConfig,
    service: &dyn CompletionService,
    extractor: &dyn DocumentExtractor,
) -> Result<PipelineReport, DdrError> {
    let run_start = Instant::now();
    info!(
        "Starting DDR run: thermal={}, inspection={}, output={}",
        config.thermal_pdf.display(),
        config.inspection_pdf.display(),
        config.output_dir.display()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(Stage::ALL.len());
    }

    ensure_output_dir(&config.output_dir).await?;

    let meter = Metered::new(service);
    let run = Run {
        config,
        service: &meter,
        extractor,
        thermal_pages: Mutex::new(Vec::new()),
        inspection_pages: Mutex::new(Vec::new()),
    };

    let (thermal_summary, inspection_summary, mut artifacts) = if config.concurrent_domains {
        run.domains_concurrently().await?
    } else {
        run.domains_sequentially().await?
    };

    let (final_report, record) = run
        .stage(Stage::Synthesize, async {
            synthesize::synthesize(
                run.service,
                &thermal_summary,
                &inspection_summary,
                &config.prompts.report,
            )
            .await
        })
        .await?;
    artifacts.push(record);

    let page_images = run.into_page_images()?;

    let stats = RunStats {
        service_calls: meter.calls(),
        total_input_tokens: meter.input_tokens(),
        total_output_tokens: meter.output_tokens(),
        total_duration_ms: run_start.elapsed().as_millis() as u64,
    };

    info!(
        "DDR run complete: {} service calls, {}ms total",
        stats.service_calls, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(&config.output_dir);
    }

    Ok(PipelineReport {
        output_dir: config.output_dir.clone(),
        artifacts,
        page_images,
        stats,
        final_report,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Shared state for one run.
struct Run<'a> {
    config: &'a PipelineConfig,
    service: &'a dyn CompletionService,
    extractor: &'a dyn DocumentExtractor,
    thermal_pages: Mutex<Vec<PathBuf>>,
    inspection_pages: Mutex<Vec<PathBuf>>,
}

type DomainOutputs = (String, String, Vec<ArtifactRecord>);

impl Run<'_> {
    /// Page images in report order: thermal pages, then inspection pages,
    /// each in page order.
    fn into_page_images(self) -> Result<Vec<PathBuf>, DdrError> {
        let poisoned = |_| DdrError::Internal("Page image list poisoned".into());
        let mut pages = self.thermal_pages.into_inner().map_err(poisoned)?;
        pages.extend(self.inspection_pages.into_inner().map_err(poisoned)?);
        Ok(pages)
    }

    /// Run `work` as `stage`: report progress, persist the artifact, and
    /// attribute any failure to the stage.
    async fn stage<F>(&self, stage: Stage, work: F) -> Result<(String, ArtifactRecord), DdrError>
    where
        F: Future<Output = Result<String, DdrError>>,
    {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_stage_start(stage);
        }
        info!("[{}/{}] {}", stage.ordinal(), Stage::ALL.len(), stage.description());

        let started = Instant::now();
        let result = match work.await {
            Ok(text) => {
                let elapsed = started.elapsed().as_millis() as u64;
                persist_stage(&self.config.output_dir, stage, &text, elapsed)
                    .await
                    .map(|record| (text, record))
            }
            Err(e) => Err(e),
        };

        match result {
            Ok((text, record)) => {
                info!(
                    "{} saved: {} characters → {}",
                    stage,
                    record.chars,
                    record.path.display()
                );
                if let Some(cb) = cb {
                    cb.on_stage_complete(stage, record.chars, &record.path);
                }
                Ok((text, record))
            }
            Err(e) => {
                warn!("Stage {} failed: {}", stage, e);
                if let Some(cb) = cb {
                    cb.on_stage_error(stage, &e.to_string());
                }
                Err(e.in_stage(stage))
            }
        }
    }

    async fn domains_sequentially(&self) -> Result<DomainOutputs, DdrError> {
        let (thermal_raw, r1) = self.extract_stage(Domain::Thermal).await?;
        let (inspection_raw, r2) = self.extract_stage(Domain::Inspection).await?;
        let (thermal_summary, r3) = self.analyze_stage(Domain::Thermal, &thermal_raw).await?;
        let (inspection_summary, r4) = self
            .analyze_stage(Domain::Inspection, &inspection_raw)
            .await?;
        Ok((thermal_summary, inspection_summary, vec![r1, r2, r3, r4]))
    }

    /// Both branches always finish; on failure the error from the earliest
    /// stage in [`Stage::ALL`] order wins.
    async fn domains_concurrently(&self) -> Result<DomainOutputs, DdrError> {
        let (thermal, inspection) = futures::join!(
            self.branch(Domain::Thermal),
            self.branch(Domain::Inspection)
        );

        match (thermal, inspection) {
            (Ok((thermal_summary, mut records)), Ok((inspection_summary, more))) => {
                records.extend(more);
                records.sort_by_key(|r| r.stage);
                Ok((thermal_summary, inspection_summary, records))
            }
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
            (Err(a), Err(b)) => Err(if b.stage() < a.stage() { b } else { a }),
        }
    }

    async fn branch(&self, domain: Domain) -> Result<(String, Vec<ArtifactRecord>), DdrError> {
        let (raw, extracted) = self.extract_stage(domain).await?;
        let (summary, analyzed) = self.analyze_stage(domain, &raw).await?;
        Ok((summary, vec![extracted, analyzed]))
    }

    async fn extract_stage(&self, domain: Domain) -> Result<(String, ArtifactRecord), DdrError> {
        self.stage(domain.extract_stage(), self.extract(domain)).await
    }

    async fn analyze_stage(
        &self,
        domain: Domain,
        raw_text: &str,
    ) -> Result<(String, ArtifactRecord), DdrError> {
        let template = analyze::template_for(&self.config.prompts, domain);
        self.stage(
            domain.analyze_stage(),
            analyze::analyze(self.service, domain, raw_text, template),
        )
        .await
    }

    async fn extract(&self, domain: Domain) -> Result<String, DdrError> {
        let path = match domain {
            Domain::Thermal => &self.config.thermal_pdf,
            Domain::Inspection => &self.config.inspection_pdf,
        };

        match self.config.extraction {
            ExtractionMode::Text => extract::extract_text(self.extractor, path).await,
            ExtractionMode::Ocr => self.transcribe(domain).await,
            ExtractionMode::Auto => {
                let pages = self.extractor.page_texts(path).await?;
                if extract::is_sparse(&pages, self.config.auto_min_chars_per_page) {
                    info!(
                        "{} document has too little selectable text ({} pages); using OCR",
                        domain,
                        pages.len()
                    );
                    self.transcribe(domain).await
                } else {
                    Ok(extract::assemble_pages(&pages))
                }
            }
        }
    }

    async fn transcribe(&self, domain: Domain) -> Result<String, DdrError> {
        let path = match domain {
            Domain::Thermal => &self.config.thermal_pdf,
            Domain::Inspection => &self.config.inspection_pdf,
        };

        let images = self.extractor.render_pages(path).await?;
        let pages_dir = self.config.output_dir.join(domain.pages_dir_name());
        let paths = extract::write_page_images(&pages_dir, &images).await?;
        let pages = match domain {
            Domain::Thermal => &self.thermal_pages,
            Domain::Inspection => &self.inspection_pages,
        };
        pages
            .lock()
            .map_err(|_| DdrError::Internal("Page image list poisoned".into()))?
            .extend(paths);

        let text = ocr::transcribe_pages(
            self.service,
            &images,
            &self.config.prompts.ocr,
            self.config.ocr_concurrency,
            domain.extract_stage(),
            self.config.progress_callback.as_ref(),
        )
        .await?;
        info!(
            "{} document transcribed: {} pages, {} characters",
            domain,
            images.len(),
            text.chars().count()
        );
        Ok(text)
    }
}
