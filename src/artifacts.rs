//! Pipeline stages, the artifacts they produce, and the run report.
//!
//! Every stage writes exactly one UTF-8 text file into the output directory
//! before the next stage starts. Files are overwritten on each run and written
//! atomically (temp file in the same directory, then rename) so an aborted run
//! never leaves a half-written artifact behind.

use crate::error::DdrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which source document a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Thermal,
    Inspection,
}

impl Domain {
    /// Lowercase label used in file names and log lines.
    pub fn label(self) -> &'static str {
        match self {
            Domain::Thermal => "thermal",
            Domain::Inspection => "inspection",
        }
    }

    /// The extraction stage for this domain.
    pub fn extract_stage(self) -> Stage {
        match self {
            Domain::Thermal => Stage::ExtractThermal,
            Domain::Inspection => Stage::ExtractInspection,
        }
    }

    /// The analysis stage for this domain.
    pub fn analyze_stage(self) -> Stage {
        match self {
            Domain::Thermal => Stage::AnalyzeThermal,
            Domain::Inspection => Stage::AnalyzeInspection,
        }
    }

    /// Directory (under the output directory) for rendered page images.
    pub fn pages_dir_name(self) -> &'static str {
        match self {
            Domain::Thermal => "thermal_pages",
            Domain::Inspection => "inspection_pages",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five ordered stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ExtractThermal,
    ExtractInspection,
    AnalyzeThermal,
    AnalyzeInspection,
    Synthesize,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::ExtractThermal,
        Stage::ExtractInspection,
        Stage::AnalyzeThermal,
        Stage::AnalyzeInspection,
        Stage::Synthesize,
    ];

    /// File name of the artifact this stage persists.
    pub fn artifact_file_name(self) -> &'static str {
        match self {
            Stage::ExtractThermal => "thermal_raw.txt",
            Stage::ExtractInspection => "inspection_raw.txt",
            Stage::AnalyzeThermal => "thermal_structured.txt",
            Stage::AnalyzeInspection => "inspection_structured.txt",
            Stage::Synthesize => "final_ddr_report.txt",
        }
    }

    /// Human-readable description for progress output.
    pub fn description(self) -> &'static str {
        match self {
            Stage::ExtractThermal => "Extracting thermal PDF text",
            Stage::ExtractInspection => "Extracting inspection PDF text",
            Stage::AnalyzeThermal => "Analyzing thermal document",
            Stage::AnalyzeInspection => "Analyzing inspection document",
            Stage::Synthesize => "Generating final DDR report",
        }
    }

    /// 1-based position in [`Stage::ALL`].
    pub fn ordinal(self) -> usize {
        Stage::ALL
            .iter()
            .position(|s| *s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Full path of this stage's artifact inside `output_dir`.
    pub fn artifact_path(self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.artifact_file_name())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ExtractThermal => "extract-thermal",
            Stage::ExtractInspection => "extract-inspection",
            Stage::AnalyzeThermal => "analyze-thermal",
            Stage::AnalyzeInspection => "analyze-inspection",
            Stage::Synthesize => "synthesize",
        };
        f.write_str(name)
    }
}

/// One persisted artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub stage: Stage,
    pub path: PathBuf,
    /// Length of the artifact in characters (not bytes).
    pub chars: usize,
    pub duration_ms: u64,
}

/// Aggregate statistics for a successful run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Completion-service calls made, including per-page OCR calls.
    pub service_calls: usize,
    /// Prompt tokens, when the service reports usage.
    pub total_input_tokens: u64,
    /// Generated tokens, when the service reports usage.
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub output_dir: PathBuf,
    /// One record per stage, in [`Stage::ALL`] order.
    pub artifacts: Vec<ArtifactRecord>,
    /// Page images written on the OCR path: thermal pages, then inspection
    /// pages, each in page order.
    pub page_images: Vec<PathBuf>,
    pub stats: RunStats,
    /// The final report text, also persisted as `final_ddr_report.txt`.
    pub final_report: String,
}

impl PipelineReport {
    /// The record for `stage`, if that stage ran.
    pub fn artifact(&self, stage: Stage) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.stage == stage)
    }
}

/// Create the output directory (and parents) if needed.
pub async fn ensure_output_dir(dir: &Path) -> Result<(), DdrError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DdrError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Atomically write `contents` to `path`, replacing any previous file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), DdrError> {
    let path = path.to_path_buf();
    let contents = contents.to_vec();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(|e| DdrError::Internal(format!("Write task panicked: {}", e)))?
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> Result<(), DdrError> {
    let write_err = |source: std::io::Error| DdrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}

/// Persist the artifact for `stage` and return its record.
pub async fn persist_stage(
    output_dir: &Path,
    stage: Stage,
    text: &str,
    duration_ms: u64,
) -> Result<ArtifactRecord, DdrError> {
    let path = stage.artifact_path(output_dir);
    write_atomic(&path, text.as_bytes()).await?;
    Ok(ArtifactRecord {
        stage,
        path,
        chars: text.chars().count(),
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_and_file_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Stage::ALL.iter().map(|s| s.artifact_file_name()).collect();
        assert_eq!(names.len(), 5);
        assert_eq!(Stage::ExtractThermal.ordinal(), 1);
        assert_eq!(Stage::Synthesize.ordinal(), 5);
        assert!(Stage::AnalyzeThermal < Stage::AnalyzeInspection);
    }

    #[test]
    fn domain_stage_mapping() {
        assert_eq!(Domain::Thermal.extract_stage(), Stage::ExtractThermal);
        assert_eq!(Domain::Inspection.analyze_stage(), Stage::AnalyzeInspection);
        assert_eq!(Domain::Inspection.to_string(), "inspection");
    }

    #[test]
    fn stage_serialises_kebab_case() {
        let json = serde_json::to_string(&Stage::AnalyzeInspection).unwrap();
        assert_eq!(json, "\"analyze-inspection\"");
    }

    #[tokio::test]
    async fn persist_stage_overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        persist_stage(dir.path(), Stage::Synthesize, "first run", 1)
            .await
            .unwrap();
        let record = persist_stage(dir.path(), Stage::Synthesize, "ünïcode", 2)
            .await
            .unwrap();

        assert_eq!(record.chars, 7);
        assert_eq!(record.path, dir.path().join("final_ddr_report.txt"));
        let on_disk = std::fs::read_to_string(&record.path).unwrap();
        assert_eq!(on_disk, "ünïcode");

        // No temp files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
