//! The completion-service seam.
//!
//! Every model call in the pipeline goes through [`CompletionService`]: submit
//! a prompt (optionally with inline images), get text back. The production
//! implementation is [`llm::LlmService`] over the Gemini provider
//! from [`gemini`]; tests drive the orchestrator
//! with deterministic stubs instead.

pub mod gemini;
pub mod llm;

use crate::error::DdrError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Binary image data sent inline with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    /// A PNG image.
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data,
        }
    }
}

/// A single user turn: instruction text plus optional images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub images: Vec<InlineImage>,
}

impl CompletionRequest {
    /// A text-only request.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
        }
    }

    /// Attach an image after the text part.
    pub fn with_image(mut self, image: InlineImage) -> Self {
        self.images.push(image);
        self
    }
}

/// The service's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Prompt tokens, when the service reports usage.
    pub input_tokens: Option<u64>,
    /// Generated tokens, when the service reports usage.
    pub output_tokens: Option<u64>,
}

impl Completion {
    /// A completion without usage information.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Anything that turns a prompt into generated text.
///
/// Implementations hold whatever they need to authenticate (the credential is
/// injected at construction), must be safe to share across tasks, and report
/// failures as [`DdrError`] values of kind
/// [`crate::error::ErrorKind::AnalysisService`].
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Short identifier used in error messages and logs.
    fn name(&self) -> &str;

    /// Submit one request and return the raw response.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError>;
}

/// Submit `request` and reject responses that carry no text.
///
/// The text is returned exactly as the service produced it; whitespace-only
/// responses count as empty.
pub async fn complete_non_empty(
    service: &dyn CompletionService,
    request: &CompletionRequest,
) -> Result<Completion, DdrError> {
    debug!(
        "Submitting request to {}: {} prompt chars, {} image(s)",
        service.name(),
        request.prompt.len(),
        request.images.len()
    );

    let completion = service.complete(request).await?;
    if completion.text.trim().is_empty() {
        return Err(DdrError::EmptyResponse {
            service: service.name().to_string(),
        });
    }
    Ok(completion)
}

/// Wraps a service and tallies calls and reported token usage.
///
/// The orchestrator routes every call of a run through one meter so the run
/// report can state how many requests were made, OCR pages included.
pub struct Metered<'a> {
    inner: &'a dyn CompletionService,
    calls: AtomicUsize,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
}

impl<'a> Metered<'a> {
    pub fn new(inner: &'a dyn CompletionService) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
        }
    }

    /// Requests submitted so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens.load(Ordering::SeqCst)
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionService for Metered<'_> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let completion = self.inner.complete(request).await?;
        if let Some(n) = completion.input_tokens {
            self.input_tokens.fetch_add(n, Ordering::SeqCst);
        }
        if let Some(n) = completion.output_tokens {
            self.output_tokens.fetch_add(n, Ordering::SeqCst);
        }
        Ok(completion)
    }
}
