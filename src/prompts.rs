//! Instruction templates for the completion service.
//!
//! Templates are plain data: a [`PromptSet`] holds one template per call
//! type, and the built-in defaults below can be replaced wholesale or loaded
//! from a directory of override files without touching orchestration code.
//!
//! Placeholders use `{name}` syntax. Substitution is single-pass: only
//! placeholders that appear in the template itself are replaced, so document
//! text or summaries that happen to contain `{thermal}` are embedded verbatim.

use crate::error::DdrError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Placeholder for the raw document text in the analysis templates.
pub const DOCUMENT: &str = "document";
/// Placeholder for the structured thermal summary in the report template.
pub const THERMAL: &str = "thermal";
/// Placeholder for the structured inspection summary in the report template.
pub const INSPECTION: &str = "inspection";

/// Default instruction for structuring the thermal-imaging document.
pub const THERMAL_PROMPT: &str = r#"You are a building inspection AI assistant.

Below is the full extracted text from a thermal inspection document.

Your task:
1. Identify all thermal images/pages.
2. Extract:
   - Date
   - Location/Area (if available)
   - Hotspot temperature
   - Coldspot temperature
   - Emissivity
   - Reflected temperature
3. Summarize thermal anomalies.
4. Identify possible causes.
5. Rate severity (Low / Moderate / High).

Return the result in clean structured format.

THERMAL DOCUMENT TEXT:
{document}
"#;

/// Default instruction for structuring the property-inspection document.
pub const INSPECTION_PROMPT: &str = r#"You are a property inspection AI assistant.

Below is the full inspection report text.

Your task:
1. Identify all reported issues.
2. Extract:
   - Area/Room
   - Issue description
   - Severity (if mentioned)
   - Recommended action
3. Summarize overall property condition.
4. Highlight urgent risks.

Return structured output.

INSPECTION REPORT TEXT:
{document}
"#;

/// Default instruction for combining both summaries into the final report.
pub const REPORT_PROMPT: &str = r#"You are a professional building diagnostics AI.

Using the structured thermal findings and structured inspection findings below,
generate a complete Diagnostic Defect Report (DDR).

Structure the final report as:

1. Executive Summary
2. Property Condition Overview
3. Thermal Findings Summary
4. Inspection Findings Summary
5. Correlated Issues (where thermal + inspection relate)
6. Severity Assessment (Low / Moderate / High per issue)
7. Root Cause Analysis
8. Recommended Corrective Actions
9. Urgent Risks
10. Missing or Unclear Information

THERMAL STRUCTURED DATA:
{thermal}

INSPECTION STRUCTURED DATA:
{inspection}
"#;

/// Default instruction sent alongside each page image on the OCR path.
pub const OCR_PROMPT: &str =
    "Extract all readable text from this inspection or thermal report image. Preserve structure clearly.";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder regex is valid"));

/// Substitute `{name}` placeholders in `template` with the matching value.
///
/// Unknown placeholders are left untouched. Values are inserted verbatim.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            values
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v).to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Whether `template` references the `{name}` placeholder.
pub fn has_placeholder(template: &str, name: &str) -> bool {
    PLACEHOLDER
        .captures_iter(template)
        .any(|caps| &caps[1] == name)
}

/// The four instruction templates used by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    /// Thermal analysis; must contain `{document}`.
    pub thermal: String,
    /// Inspection analysis; must contain `{document}`.
    pub inspection: String,
    /// Final report; must contain `{thermal}` and `{inspection}`.
    pub report: String,
    /// Per-page OCR instruction; sent as text next to the image.
    pub ocr: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            thermal: THERMAL_PROMPT.to_string(),
            inspection: INSPECTION_PROMPT.to_string(),
            report: REPORT_PROMPT.to_string(),
            ocr: OCR_PROMPT.to_string(),
        }
    }
}

impl PromptSet {
    /// Load overrides from `dir`.
    ///
    /// Looks for `thermal.txt`, `inspection.txt`, `report.txt` and `ocr.txt`;
    /// any file that is absent keeps the built-in template. The result is
    /// validated before it is returned.
    pub async fn from_dir(dir: &Path) -> Result<Self, DdrError> {
        let mut set = Self::default();

        for (file, slot) in [
            ("thermal.txt", &mut set.thermal),
            ("inspection.txt", &mut set.inspection),
            ("report.txt", &mut set.report),
            ("ocr.txt", &mut set.ocr),
        ] {
            let path = dir.join(file);
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    info!("Using prompt override: {}", path.display());
                    *slot = text;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("No override at {}, keeping built-in", path.display());
                }
                Err(e) => return Err(DdrError::PromptRead { path, source: e }),
            }
        }

        set.validate()?;
        Ok(set)
    }

    /// Check that every template references the placeholders it needs.
    pub fn validate(&self) -> Result<(), DdrError> {
        let required: [(&str, &str, &[&str]); 3] = [
            ("thermal", &self.thermal, &[DOCUMENT]),
            ("inspection", &self.inspection, &[DOCUMENT]),
            ("report", &self.report, &[THERMAL, INSPECTION]),
        ];

        for (name, template, placeholders) in required {
            for p in placeholders {
                if !has_placeholder(template, p) {
                    return Err(DdrError::InvalidConfig(format!(
                        "{name} prompt must contain the {{{p}}} placeholder"
                    )));
                }
            }
        }

        if self.ocr.trim().is_empty() {
            return Err(DdrError::InvalidConfig("ocr prompt must not be empty".into()));
        }
        Ok(())
    }
}
