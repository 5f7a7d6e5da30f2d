//! Progress-callback trait for stage events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages. The `ddr` binary uses it
//! to drive a terminal spinner; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use ddr_report::{PipelineConfig, PipelineProgress, Stage};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgress for Printer {
//!     fn on_stage_complete(&self, stage: Stage, chars: usize, path: &Path) {
//!         eprintln!("{stage}: {chars} chars → {}", path.display());
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::artifacts::Stage;
use std::path::Path;
use std::sync::Arc;

/// Called by the orchestrator as a run progresses.
///
/// All methods default to no-ops. With `concurrent_domains` enabled, events
/// for the two domain branches may arrive interleaved from different tasks.
pub trait PipelineProgress: Send + Sync {
    /// Called once, after the credential check, before the first stage.
    fn on_run_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after a stage's artifact has been persisted.
    ///
    /// # Arguments
    /// * `chars` - length of the artifact in characters
    /// * `path`  - where it was written
    fn on_stage_complete(&self, stage: Stage, chars: usize, path: &Path) {
        let _ = (stage, chars, path);
    }

    /// Called when a stage fails. The run aborts afterwards.
    fn on_stage_error(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called after each page transcription on the OCR path.
    fn on_page_ocr(&self, stage: Stage, page_num: usize, total_pages: usize) {
        let _ = (stage, page_num, total_pages);
    }

    /// Called once after the final report has been written.
    fn on_run_complete(&self, output_dir: &Path) {
        let _ = output_dir;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgress>;
