//! Error types for the ddr-report library.
//!
//! Every failure is fatal for the run: the pipeline has no partial-success
//! mode, so a single enum, [`DdrError`], carries all of them. The variants are
//! grouped by where they originate, and [`DdrError::kind`] folds them into the
//! coarse taxonomy callers usually branch on:
//!
//! * [`ErrorKind::Configuration`] - missing credential, invalid settings or
//!   prompt templates. Raised before any stage runs.
//! * [`ErrorKind::DocumentOpen`] - the PDF is missing, unreadable, not a PDF,
//!   corrupt, or encrypted.
//! * [`ErrorKind::AnalysisService`] - the completion service failed or
//!   returned no text.
//! * [`ErrorKind::Output`] - an artifact could not be written.
//! * [`ErrorKind::Internal`] - pdfium binding, rasterisation, task panics.
//!
//! The orchestrator wraps stage failures in [`DdrError::Stage`] so the message
//! a user sees names the stage that failed as well as the underlying cause.

use crate::artifacts::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`DdrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    DocumentOpen,
    AnalysisService,
    Output,
    Internal,
}

/// All errors returned by the ddr-report library.
#[derive(Debug, Error)]
pub enum DdrError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// The credential environment variable is unset or empty.
    #[error("API credential not found: environment variable '{var}' is unset or empty.\nSet it in your shell or in a .env file.")]
    MissingCredential { var: String },

    /// Builder or prompt validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A prompt override file could not be read.
    #[error("Failed to read prompt template '{path}': {source}")]
    PromptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium could not extract the text layer of a page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// pdfium-render returned an error while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Completion service errors ─────────────────────────────────────────
    /// The service returned a non-success response or the request failed.
    #[error("Completion service error ({service}): {message}")]
    ServiceFailed { service: String, message: String },

    /// The service rejected the credential (401/403).
    #[error("Authentication error from '{service}': {detail}\nCheck the API key.")]
    AuthError { service: String, detail: String },

    /// The service returned HTTP 429.
    #[error("Quota or rate limit exceeded for '{service}'")]
    RateLimitExceeded {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// The request did not complete within the configured timeout.
    #[error("Completion request to '{service}' timed out after {secs}s")]
    ServiceTimeout { service: String, secs: u64 },

    /// The service answered but produced no text.
    #[error("Completion service '{service}' returned an empty response")]
    EmptyResponse { service: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write an artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, then either:\n\
  • place it next to the executable or in the working directory, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Stage context ─────────────────────────────────────────────────────
    /// A pipeline stage failed; `source` is the underlying cause.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<DdrError>,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DdrError {
    /// Classify this error. [`DdrError::Stage`] reports the kind of its cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DdrError::MissingCredential { .. }
            | DdrError::InvalidConfig(_)
            | DdrError::PromptRead { .. } => ErrorKind::Configuration,

            DdrError::FileNotFound { .. }
            | DdrError::PermissionDenied { .. }
            | DdrError::NotAPdf { .. }
            | DdrError::CorruptPdf { .. }
            | DdrError::PasswordRequired { .. }
            | DdrError::WrongPassword { .. } => ErrorKind::DocumentOpen,

            DdrError::ServiceFailed { .. }
            | DdrError::AuthError { .. }
            | DdrError::RateLimitExceeded { .. }
            | DdrError::ServiceTimeout { .. }
            | DdrError::EmptyResponse { .. } => ErrorKind::AnalysisService,

            DdrError::OutputWriteFailed { .. } => ErrorKind::Output,

            DdrError::TextExtractionFailed { .. }
            | DdrError::RasterisationFailed { .. }
            | DdrError::PdfiumBindingFailed(_)
            | DdrError::Internal(_) => ErrorKind::Internal,

            DdrError::Stage { source, .. } => source.kind(),
        }
    }

    /// The stage this error was raised in, if it has been attributed to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DdrError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Attribute this error to `stage`. Already-attributed errors are kept as is.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            DdrError::Stage { .. } => self,
            other => DdrError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }
}
