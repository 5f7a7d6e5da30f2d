//! Report synthesis: both structured summaries → the final DDR text.
//!
//! The summaries are embedded verbatim and are not validated; whatever the
//! analysis stages produced flows through.

use crate::error::DdrError;
use crate::prompts::{render_template, INSPECTION, THERMAL};
use crate::service::{complete_non_empty, CompletionRequest, CompletionService};
use tracing::info;

/// Build the synthesis request.
pub fn build_request(template: &str, thermal_summary: &str, inspection_summary: &str) -> CompletionRequest {
    CompletionRequest::text(render_template(
        template,
        &[(THERMAL, thermal_summary), (INSPECTION, inspection_summary)],
    ))
}

/// Combine the two summaries into the final report.
pub async fn synthesize(
    service: &dyn CompletionService,
    thermal_summary: &str,
    inspection_summary: &str,
    template: &str,
) -> Result<String, DdrError> {
    let request = build_request(template, thermal_summary, inspection_summary);
    let completion = complete_non_empty(service, &request).await?;
    info!("Final report: {} characters", completion.text.chars().count());
    Ok(completion.text)
}
