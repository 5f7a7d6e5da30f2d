//! Domain analysis: raw document text → structured summary.
//!
//! One completion call per domain. The template gets the raw text embedded
//! verbatim in its `{document}` placeholder and the response comes back
//! unmodified; the only check applied is that it is not empty.

use crate::artifacts::Domain;
use crate::error::DdrError;
use crate::prompts::{render_template, PromptSet, DOCUMENT};
use crate::service::{complete_non_empty, CompletionRequest, CompletionService};
use tracing::{info, warn};

/// The analysis template for `domain`.
pub fn template_for(prompts: &PromptSet, domain: Domain) -> &str {
    match domain {
        Domain::Thermal => &prompts.thermal,
        Domain::Inspection => &prompts.inspection,
    }
}

/// Build the analysis request for `raw_text`.
pub fn build_request(template: &str, raw_text: &str) -> CompletionRequest {
    CompletionRequest::text(render_template(template, &[(DOCUMENT, raw_text)]))
}

/// Structure one document's raw text.
///
/// # Errors
/// Any service failure, or an empty response, as a [`DdrError`] of kind
/// [`crate::error::ErrorKind::AnalysisService`].
pub async fn analyze(
    service: &dyn CompletionService,
    domain: Domain,
    raw_text: &str,
    template: &str,
) -> Result<String, DdrError> {
    if raw_text.trim().is_empty() {
        warn!("{} document text is empty; analysing anyway", domain);
    }

    let request = build_request(template, raw_text);
    let completion = complete_non_empty(service, &request).await?;

    info!(
        "{} summary: {} characters",
        domain,
        completion.text.chars().count()
    );
    Ok(completion.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::THERMAL_PROMPT;
    use crate::service::Completion;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Capture {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for Capture {
        fn name(&self) -> &str {
            "capture"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DdrError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            Ok(Completion::from_text(self.reply.clone()))
        }
    }

    #[tokio::test]
    async fn response_is_passed_through_exactly() {
        let reply = "  **Date:** 2024-01-01\n\n| a | b |\n   ".to_string();
        let service = Capture {
            reply: reply.clone(),
            prompts: Mutex::new(Vec::new()),
        };

        let out = analyze(&service, Domain::Thermal, "Hotspot 41.2 °C", THERMAL_PROMPT)
            .await
            .unwrap();
        assert_eq!(out, reply);

        let prompts = service.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("THERMAL DOCUMENT TEXT:\nHotspot 41.2 °C"));
        assert!(!prompts[0].contains("{document}"));
    }

    #[tokio::test]
    async fn empty_response_is_an_error() {
        let service = Capture {
            reply: "\n".into(),
            prompts: Mutex::new(Vec::new()),
        };
        let err = analyze(&service, Domain::Inspection, "text", "{document}")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AnalysisService);
    }

    #[test]
    fn template_selection_follows_domain() {
        let prompts = PromptSet::default();
        assert!(template_for(&prompts, Domain::Thermal).contains("Emissivity"));
        assert!(template_for(&prompts, Domain::Inspection).contains("Area/Room"));
    }
}
