//! Run report (`--report` JSON)
//!
//! One entry per requested project, in request order, with the outcome of
//! the merge step and aggregate counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::settings::MergeOutcome;

/// Schema version for the run report
pub const SYNC_REPORT_SCHEMA_VERSION: u32 = 1;

/// Per-project outcome as recorded in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Written,
    DryRun,
    SkippedMissingMarker,
    SkippedMissingGeneral,
    SkippedMissingProcessors,
    SkippedMissingSummary,
    Failed,
}

impl ReportOutcome {
    pub fn is_skipped(self) -> bool {
        matches!(
            self,
            ReportOutcome::SkippedMissingMarker
                | ReportOutcome::SkippedMissingGeneral
                | ReportOutcome::SkippedMissingProcessors
                | ReportOutcome::SkippedMissingSummary
        )
    }
}

impl From<&MergeOutcome> for ReportOutcome {
    fn from(outcome: &MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Written(_) => ReportOutcome::Written,
            MergeOutcome::DryRun(_) => ReportOutcome::DryRun,
            MergeOutcome::SkippedMissingMarker { .. } => ReportOutcome::SkippedMissingMarker,
            MergeOutcome::SkippedMissingGeneral => ReportOutcome::SkippedMissingGeneral,
            MergeOutcome::SkippedMissingProcessors => ReportOutcome::SkippedMissingProcessors,
            MergeOutcome::SkippedMissingSummary => ReportOutcome::SkippedMissingSummary,
        }
    }
}

/// Report entry for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    /// Project name
    pub project: String,

    pub outcome: ReportOutcome,

    /// Settings file path (written or would-be)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Missing category or failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProjectReport {
    pub fn from_outcome(project: impl Into<String>, outcome: &MergeOutcome) -> Self {
        Self {
            project: project.into(),
            outcome: outcome.into(),
            path: outcome.path().map(Path::to_path_buf),
            detail: outcome
                .missing_category()
                .map(|category| format!("missing {}", category)),
        }
    }

    pub fn failed(project: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            outcome: ReportOutcome::Failed,
            path: None,
            detail: Some(message.into()),
        }
    }
}

/// Report of one settings run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Schema version
    pub schema_version: u32,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Whether settings files were written (false = dry run)
    pub write_enabled: bool,

    /// Per-project entries in request order
    pub projects: Vec<ProjectReport>,

    /// Count of files written
    pub written: usize,

    /// Count of documents built without writing
    pub dry_run: usize,

    /// Count of projects skipped for missing settings
    pub skipped: usize,

    /// Count of projects whose file could not be written
    pub failed: usize,

    /// Human-readable summary
    pub human_summary: String,
}

impl SyncReport {
    /// Aggregate project entries into a report
    pub fn from_projects(write_enabled: bool, projects: Vec<ProjectReport>) -> Self {
        let count = |pred: fn(ReportOutcome) -> bool| {
            projects.iter().filter(|p| pred(p.outcome)).count()
        };
        let written = count(|o| o == ReportOutcome::Written);
        let dry_run = count(|o| o == ReportOutcome::DryRun);
        let skipped = count(ReportOutcome::is_skipped);
        let failed = count(|o| o == ReportOutcome::Failed);

        let human_summary =
            Self::generate_human_summary(write_enabled, projects.len(), written, dry_run, skipped, failed);

        Self {
            schema_version: SYNC_REPORT_SCHEMA_VERSION,
            created_at: Utc::now(),
            write_enabled,
            projects,
            written,
            dry_run,
            skipped,
            failed,
            human_summary,
        }
    }

    fn generate_human_summary(
        write_enabled: bool,
        total: usize,
        written: usize,
        dry_run: usize,
        skipped: usize,
        failed: usize,
    ) -> String {
        if total == 0 {
            return "No projects processed".to_string();
        }
        let produced = if write_enabled {
            format!("{}/{} settings files written", written, total)
        } else {
            format!("Dry run: {}/{} settings documents built", dry_run, total)
        };
        match (skipped, failed) {
            (0, 0) => produced,
            (skipped, 0) => format!("{}, {} skipped", produced, skipped),
            (skipped, failed) => format!("{}, {} skipped, {} failed", produced, skipped, failed),
        }
    }

    /// True when no project failed to write
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Entry for a project
    pub fn project(&self, name: &str) -> Option<&ProjectReport> {
        self.projects.iter().find(|p| p.project == name)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("JSON error: {}", e))
        })?;
        fs::write(path, json)
    }
}
