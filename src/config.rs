//! Configuration for a DDR pipeline run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The API credential is not part of
//! the config: it is loaded once into a [`Credential`] and handed to the
//! completion service that needs it.

use crate::error::DdrError;
use crate::progress::ProgressCallback;
use crate::prompts::PromptSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default environment variable holding the API key.
pub const DEFAULT_CREDENTIAL_ENV: &str = "GEMINI_API_KEY";
/// Default completion model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for one pipeline run.
///
/// # Example
/// ```rust
/// use ddr_report::{ExtractionMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .thermal_pdf("data/thermal.pdf")
///     .inspection_pdf("data/inspection.pdf")
///     .output_dir("out")
///     .extraction(ExtractionMode::Auto)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Thermal-imaging PDF. Default: `data/Thermal Images.pdf`.
    pub thermal_pdf: PathBuf,

    /// Property-inspection PDF. Default: `data/Sample Report.pdf`.
    pub inspection_pdf: PathBuf,

    /// Directory receiving the five artifacts. Default: `output`.
    pub output_dir: PathBuf,

    /// Completion model identifier. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Environment variable the credential is read from. Default: `GEMINI_API_KEY`.
    pub credential_env: String,

    /// How text is obtained from each PDF. Default: [`ExtractionMode::Text`].
    pub extraction: ExtractionMode,

    /// In [`ExtractionMode::Auto`], fall back to OCR when the document averages
    /// fewer non-whitespace characters per page than this. Default: 16.
    pub auto_min_chars_per_page: usize,

    /// Rendering DPI for the OCR path. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent page OCR calls. Page order is preserved. Default: 4.
    pub ocr_concurrency: usize,

    /// Run the thermal and inspection branches concurrently. Default: false.
    ///
    /// Both branches always run to completion before the run decides whether
    /// it failed, so artifacts from a healthy branch are still persisted.
    pub concurrent_domains: bool,

    /// Sampling temperature. `None` leaves the service default.
    pub temperature: Option<f32>,

    /// Maximum generated tokens per call. `None` leaves the service default.
    pub max_output_tokens: Option<u32>,

    /// Per-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// PDF user password, applied to both documents.
    pub password: Option<String>,

    /// Explicit pdfium library file or directory. Falls back to
    /// `PDFIUM_LIB_PATH`, then the working directory, then the system library.
    pub pdfium_library: Option<PathBuf>,

    /// Instruction templates.
    pub prompts: PromptSet,

    /// Receives stage events. `None` disables progress reporting.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thermal_pdf: PathBuf::from("data").join("Thermal Images.pdf"),
            inspection_pdf: PathBuf::from("data").join("Sample Report.pdf"),
            output_dir: PathBuf::from("output"),
            model: DEFAULT_MODEL.to_string(),
            credential_env: DEFAULT_CREDENTIAL_ENV.to_string(),
            extraction: ExtractionMode::default(),
            auto_min_chars_per_page: 16,
            dpi: 150,
            max_rendered_pixels: 2000,
            ocr_concurrency: 4,
            concurrent_domains: false,
            temperature: None,
            max_output_tokens: None,
            api_timeout_secs: 300,
            password: None,
            pdfium_library: None,
            prompts: PromptSet::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("thermal_pdf", &self.thermal_pdf)
            .field("inspection_pdf", &self.inspection_pdf)
            .field("output_dir", &self.output_dir)
            .field("model", &self.model)
            .field("credential_env", &self.credential_env)
            .field("extraction", &self.extraction)
            .field("dpi", &self.dpi)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("concurrent_domains", &self.concurrent_domains)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library", &self.pdfium_library)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgress>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the credential named by [`PipelineConfig::credential_env`].
    pub fn load_credential(&self) -> Result<Credential, DdrError> {
        Credential::from_env(&self.credential_env)
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn thermal_pdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.thermal_pdf = path.into();
        self
    }

    pub fn inspection_pdf(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.inspection_pdf = path.into();
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn credential_env(mut self, var: impl Into<String>) -> Self {
        self.config.credential_env = var.into();
        self
    }

    pub fn extraction(mut self, mode: ExtractionMode) -> Self {
        self.config.extraction = mode;
        self
    }

    pub fn auto_min_chars_per_page(mut self, n: usize) -> Self {
        self.config.auto_min_chars_per_page = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n.max(1);
        self
    }

    pub fn concurrent_domains(mut self, v: bool) -> Self {
        self.config.concurrent_domains = v;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = Some(n);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, DdrError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DdrError::InvalidConfig("Model must not be empty".into()));
        }
        if c.credential_env.trim().is_empty() {
            return Err(DdrError::InvalidConfig(
                "Credential variable name must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DdrError::InvalidConfig("API timeout must be ≥ 1 second".into()));
        }
        c.prompts.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How raw text is obtained from a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Read the selectable text layer. No completion calls. (default)
    #[default]
    Text,
    /// Render each page and have the completion service transcribe it.
    /// One extra call per page.
    Ocr,
    /// Read the text layer; switch to OCR when it is too sparse to be useful.
    Auto,
}

// ── Credential ───────────────────────────────────────────────────────────

/// An opaque API key.
///
/// Never printed: `Debug` is redacted and there is no `Display` impl. Use
/// [`Credential::expose`] at the single point where it goes on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a key. Empty or whitespace-only keys are rejected.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Read the key from environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self, DdrError> {
        std::env::var(var)
            .ok()
            .and_then(Credential::new)
            .ok_or_else(|| DdrError::MissingCredential {
                var: var.to_string(),
            })
    }

    /// The raw key.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}
