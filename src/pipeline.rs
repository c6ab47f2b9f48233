//! Settings pipeline
//!
//! Drives one run end to end:
//! - List forms and export every requested project's completion markers
//! - Filter out incomplete forms
//! - Build general settings, processor/module descriptors and summaries
//! - Merge per project and write (or dry-run) the settings files
//!
//! Record source failures abort the run. Per-project problems (missing
//! markers, missing settings parts, write failures) are reported and the
//! remaining projects still processed.

use thiserror::Error;
use tracing::{debug, error, info};

use dax_redcap::{ExportRequest, RecordSource, SourceError};

use crate::config::ConfigError;
use crate::output::OutputError;
use crate::report::{ProjectReport, SyncReport};
use crate::settings::{
    build_general_settings, build_project_components, build_project_summaries, completion_key,
    discover_declarations, filter_projects, RecordLayout, SettingsMerger, SettingsParts,
};

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("record source error: {0}")]
    Source(#[from] SourceError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("report error: {0}")]
    Report(#[from] std::io::Error),

    #[error("no projects requested")]
    NoProjects,

    #[error("{failed} settings file(s) could not be written")]
    PartialFailure { failed: usize },
}

impl PipelineError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::NoProjects => 2,
            PipelineError::Source(SourceError::Config(_)) => 2,
            PipelineError::Source(SourceError::Unauthorized { .. }) => 3,
            PipelineError::Source(SourceError::Unavailable { .. }) => 4,
            PipelineError::Source(_) => 5,
            PipelineError::Output(_) => 6,
            PipelineError::Report(_) => 6,
            PipelineError::PartialFailure { .. } => 1,
        }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Parse a comma-separated project list.
///
/// Entries are trimmed, empty entries dropped and duplicates removed keeping
/// the first occurrence.
pub fn parse_project_list(raw: &str) -> PipelineResult<Vec<String>> {
    let mut projects: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !projects.iter().any(|p| p == entry) {
            projects.push(entry.to_string());
        }
    }
    if projects.is_empty() {
        return Err(PipelineError::NoProjects);
    }
    Ok(projects)
}

/// One settings run against a record source
pub struct SettingsPipeline<'a, S: RecordSource> {
    source: &'a S,
    layout: RecordLayout,
    merger: SettingsMerger,
}

impl<'a, S: RecordSource> SettingsPipeline<'a, S> {
    pub fn new(source: &'a S, layout: RecordLayout, merger: SettingsMerger) -> Self {
        Self {
            source,
            layout,
            merger,
        }
    }

    /// Build the three settings parts for the requested projects
    pub fn collect_parts(&self, projects: &[String]) -> PipelineResult<SettingsParts> {
        let forms = self.source.forms()?;
        debug!(forms = ?forms, "listed forms");

        let completion_fields = std::iter::once(self.layout.record_id_field.clone())
            .chain(forms.iter().map(|form| completion_key(form)));
        let request = ExportRequest::records(projects.iter().cloned()).with_fields(completion_fields);
        let completion_records = self.source.export_records(&request)?;
        info!(
            requested = projects.len(),
            exported = completion_records.len(),
            "exported completion records"
        );

        let batch = filter_projects(&forms, completion_records, &self.layout);
        let completed = batch.completed;

        let general = build_general_settings(self.source, &completed, &self.layout)?;

        let declared: Vec<String> = discover_declarations(&completed, &self.layout)
            .into_keys()
            .collect();
        let full_records = if declared.is_empty() {
            debug!("no project declares processors or modules");
            Vec::new()
        } else {
            self.source.export_records(&ExportRequest::records(declared))?
        };
        let components = build_project_components(&completed, &full_records, &self.layout);

        let summaries = build_project_summaries(&completed);

        Ok(SettingsParts {
            general,
            components,
            summaries,
            rejected: batch.rejected,
        })
    }

    /// Run the pipeline; source failures are fatal, per-project failures
    /// end up in the report
    pub fn run(&self, projects: &[String]) -> PipelineResult<SyncReport> {
        if projects.is_empty() {
            return Err(PipelineError::NoProjects);
        }
        info!(
            projects = ?projects,
            write = self.merger.write_enabled(),
            "generating settings"
        );

        let parts = self.collect_parts(projects)?;

        let entries = projects
            .iter()
            .map(|project| match self.merger.merge_project(project, &parts) {
                Ok(outcome) => ProjectReport::from_outcome(project.as_str(), &outcome),
                Err(e) => {
                    error!(project = %project, error = %e, "failed to write settings");
                    ProjectReport::failed(project.as_str(), e.to_string())
                }
            })
            .collect();

        let report = SyncReport::from_projects(self.merger.write_enabled(), entries);
        info!(summary = %report.human_summary, "settings run finished");
        Ok(report)
    }
}
