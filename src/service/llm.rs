//! [`CompletionService`] on top of an `edgequake-llm` provider.
//!
//! Each request becomes a single user [`ChatMessage`]: the prompt text plus
//! any inline images, base64-encoded into [`ImageData`]. The provider does the
//! wire work; this adapter adds the per-call timeout and folds [`LlmError`]
//! into [`DdrError`]. No retries.

use crate::error::DdrError;
use crate::service::{Completion, CompletionRequest, CompletionService};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-call timeout, matching [`crate::PipelineConfig::api_timeout_secs`].
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A completion service backed by any [`LLMProvider`].
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout_secs: u64,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("provider", &self.provider.name())
            .field("model", &self.provider.model())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmService {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            options: CompletionOptions::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sampling settings sent with every call.
    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs.max(1);
        self
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn options(&self) -> &CompletionOptions {
        &self.options
    }
}

#[async_trait]
impl CompletionService for LlmService {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
        let message = if request.images.is_empty() {
            ChatMessage::user(request.prompt.as_str())
        } else {
            let images = request
                .images
                .iter()
                .map(|img| ImageData::new(STANDARD.encode(&img.data), img.mime_type.as_str()))
                .collect();
            ChatMessage::user_with_images(request.prompt.as_str(), images)
        };

        let call = self.provider.chat(std::slice::from_ref(&message), Some(&self.options));
        let response = match tokio::time::timeout(Duration::from_secs(self.timeout_secs), call).await
        {
            Ok(result) => result.map_err(|e| self.service_error(e))?,
            Err(_) => {
                warn!("{}: no response after {}s", self.name(), self.timeout_secs);
                return Err(DdrError::ServiceTimeout {
                    service: self.name().to_string(),
                    secs: self.timeout_secs,
                });
            }
        };

        debug!(
            "{}: {} chars, finish={:?}, tokens in={} out={}",
            self.name(),
            response.content.len(),
            response.finish_reason,
            response.prompt_tokens,
            response.completion_tokens
        );

        // Providers report 0 when the API returned no usage block.
        let usage = |n: usize| (n > 0).then_some(n as u64);
        Ok(Completion {
            input_tokens: usage(response.prompt_tokens),
            output_tokens: usage(response.completion_tokens),
            text: response.content,
        })
    }
}

impl LlmService {
    fn service_error(&self, e: LlmError) -> DdrError {
        warn!("{} call failed: {}", self.name(), e);
        map_llm_error(self.name(), self.timeout_secs, e)
    }
}

/// Fold a provider error into the service variants of [`DdrError`].
///
/// Gemini reports every HTTP failure as `ApiError("Gemini API error (<code>): …")`,
/// so the status code is recovered from the message.
pub(crate) fn map_llm_error(service: &str, timeout_secs: u64, e: LlmError) -> DdrError {
    let service = service.to_string();
    match e {
        LlmError::AuthError(detail) => DdrError::AuthError { service, detail },
        LlmError::RateLimited(_) => DdrError::RateLimitExceeded {
            service,
            retry_after_secs: None,
        },
        LlmError::Timeout => DdrError::ServiceTimeout {
            service,
            secs: timeout_secs,
        },
        LlmError::ApiError(message) => match api_status(&message) {
            Some(401) | Some(403) => DdrError::AuthError {
                service,
                detail: message,
            },
            Some(400) if message.contains("API key") => DdrError::AuthError {
                service,
                detail: message,
            },
            Some(429) => DdrError::RateLimitExceeded {
                service,
                retry_after_secs: None,
            },
            _ => DdrError::ServiceFailed { service, message },
        },
        other => DdrError::ServiceFailed {
            service,
            message: other.to_string(),
        },
    }
}

/// The HTTP status in an `"… error (403): …"` or `"… error (403 Forbidden): …"` message.
fn api_status(message: &str) -> Option<u16> {
    let start = message.find("error (")? + "error (".len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::service::InlineImage;
    use edgequake_llm::{LLMResponse, MockProvider};
    use std::sync::Mutex;

    /// Records the messages it receives and answers with fixed usage.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ChatMessage>>,
        options: Mutex<Option<CompletionOptions>>,
    }

    #[async_trait]
    impl LLMProvider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn model(&self) -> &str {
            "recorder-1"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            *self.options.lock().unwrap() = options.cloned();
            Ok(LLMResponse::new("recorded", "recorder-1").with_usage(120, 45))
        }
    }

    #[tokio::test]
    async fn prompt_and_images_form_one_user_message() {
        let recorder = Arc::new(Recorder::default());
        let service = LlmService::new(recorder.clone());

        let req = CompletionRequest::text("read this").with_image(InlineImage::png(vec![1, 2, 3]));
        let out = service.complete(&req).await.unwrap();

        assert_eq!(out.text, "recorded");
        assert_eq!(out.input_tokens, Some(120));
        assert_eq!(out.output_tokens, Some(45));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].content, "read this");
        let images = seen[0].images.as_ref().expect("image attached");
        assert_eq!(images[0].mime_type, "image/png");
        assert_eq!(images[0].data, "AQID");
    }

    #[tokio::test]
    async fn options_are_forwarded() {
        let recorder = Arc::new(Recorder::default());
        let service = LlmService::new(recorder.clone()).with_options(CompletionOptions {
            temperature: Some(0.5),
            max_tokens: Some(2048),
            ..Default::default()
        });

        service.complete(&CompletionRequest::text("x")).await.unwrap();

        let opts = recorder.options.lock().unwrap().clone().unwrap();
        assert_eq!(opts.temperature, Some(0.5));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[tokio::test]
    async fn missing_usage_is_none() {
        let mock = MockProvider::new();
        mock.add_response("hello").await;
        let service = LlmService::new(Arc::new(mock));

        let out = service.complete(&CompletionRequest::text("x")).await.unwrap();
        assert_eq!(out.text, "hello");
        assert_eq!(out.input_tokens, None);
        assert_eq!(service.name(), "mock");
    }

    struct Stalled;

    #[async_trait]
    impl LLMProvider for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn model(&self) -> &str {
            "stalled-1"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(LLMResponse::new("late", "stalled-1"))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete("").await
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let service = LlmService::new(Arc::new(Stalled)).with_timeout_secs(1);
        let err = service
            .complete(&CompletionRequest::text("x"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DdrError::ServiceTimeout { secs: 1, ref service } if service == "stalled"),
            "got: {err:?}"
        );
    }

    #[test]
    fn gemini_forbidden_is_an_auth_error() {
        let err = map_llm_error(
            "gemini",
            5,
            LlmError::ApiError("Gemini API error (403): Permission denied on resource".into()),
        );
        assert!(matches!(err, DdrError::AuthError { ref detail, .. } if detail.contains("Permission denied")));
        assert_eq!(err.kind(), ErrorKind::AnalysisService);
    }

    #[test]
    fn invalid_key_400_is_an_auth_error() {
        let err = map_llm_error(
            "gemini",
            5,
            LlmError::ApiError(
                "Gemini API error (400): API key not valid. Please pass a valid API key.".into(),
            ),
        );
        assert!(matches!(err, DdrError::AuthError { .. }), "got: {err:?}");
    }

    #[test]
    fn too_many_requests_is_a_rate_limit() {
        let err = map_llm_error(
            "gemini",
            5,
            LlmError::ApiError("Gemini API error (429 Too Many Requests): quota".into()),
        );
        assert!(matches!(err, DdrError::RateLimitExceeded { .. }));
    }

    #[test]
    fn other_failures_keep_the_provider_message() {
        let err = map_llm_error(
            "gemini",
            5,
            LlmError::ApiError("Gemini API error (500): upstream exploded".into()),
        );
        let msg = err.to_string();
        assert!(msg.contains("500") && msg.contains("upstream exploded"), "got: {msg}");

        let err = map_llm_error("gemini", 5, LlmError::ApiError("Empty candidates array".into()));
        assert!(matches!(err, DdrError::ServiceFailed { .. }));
    }

    #[test]
    fn provider_timeout_reports_configured_limit() {
        let err = map_llm_error("gemini", 42, LlmError::Timeout);
        assert!(matches!(err, DdrError::ServiceTimeout { secs: 42, .. }));
    }

    #[test]
    fn api_status_parses_both_message_shapes() {
        assert_eq!(api_status("Gemini API error (403): x"), Some(403));
        assert_eq!(api_status("Gemini API error (404 Not Found): x"), Some(404));
        assert_eq!(api_status("No candidates in response"), None);
    }

    #[test]
    fn debug_names_provider_and_model() {
        let s = format!("{:?}", LlmService::new(Arc::new(MockProvider::new())));
        assert!(s.contains("mock") && s.contains("mock-model"), "got: {s}");
    }
}
