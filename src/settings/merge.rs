//! Settings merger
//!
//! A project's document is the shallow union of its general settings, its
//! processor/module descriptors and its summary section. All three must
//! exist; partial documents are never written. A project whose completion
//! record was rejected is skipped before any part is looked at.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::completion::CompletionError;
use super::components::ProjectComponents;
use super::general::GeneralSettings;
use super::summary::ProjectsSection;
use crate::output::{render_yaml, OutputError, SettingsWriter};

/// One merged settings document, keys in output order
pub type SettingsDocument = Map<String, Value>;

/// What happened to one requested project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Document written to the path
    Written(PathBuf),
    /// Document built; writing disabled
    DryRun(PathBuf),
    /// Completion record lacked this form marker
    SkippedMissingMarker { field: String },
    SkippedMissingGeneral,
    SkippedMissingProcessors,
    SkippedMissingSummary,
}

impl MergeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Written(_) => "written",
            MergeOutcome::DryRun(_) => "dry_run",
            MergeOutcome::SkippedMissingMarker { .. } => "skipped_missing_marker",
            MergeOutcome::SkippedMissingGeneral => "skipped_missing_general",
            MergeOutcome::SkippedMissingProcessors => "skipped_missing_processors",
            MergeOutcome::SkippedMissingSummary => "skipped_missing_summary",
        }
    }

    /// What was missing when the project was skipped
    pub fn missing_category(&self) -> Option<String> {
        match self {
            MergeOutcome::SkippedMissingMarker { field } => {
                Some(format!("completion marker '{}'", field))
            }
            MergeOutcome::SkippedMissingGeneral => Some("general settings".to_string()),
            MergeOutcome::SkippedMissingProcessors => {
                Some("processor/module settings".to_string())
            }
            MergeOutcome::SkippedMissingSummary => Some("project summary".to_string()),
            MergeOutcome::Written(_) | MergeOutcome::DryRun(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        !matches!(self, MergeOutcome::Written(_) | MergeOutcome::DryRun(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            MergeOutcome::Written(path) | MergeOutcome::DryRun(path) => Some(path),
            _ => None,
        }
    }
}

/// The three per-project derivations, plus projects rejected by the
/// completion filter
#[derive(Debug, Clone, Default)]
pub struct SettingsParts {
    pub general: IndexMap<String, GeneralSettings>,
    pub components: IndexMap<String, ProjectComponents>,
    pub summaries: IndexMap<String, ProjectsSection>,
    pub rejected: IndexMap<String, CompletionError>,
}

/// Result of assembling one project's document
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    Complete(SettingsDocument),
    /// A part is missing; carries the skip outcome
    Incomplete(MergeOutcome),
}

/// Shallow merge; on a key collision the later document wins
pub fn merge_documents<I>(documents: I) -> SettingsDocument
where
    I: IntoIterator<Item = SettingsDocument>,
{
    documents
        .into_iter()
        .fold(SettingsDocument::new(), |mut merged, document| {
            for (key, value) in document {
                merged.insert(key, value);
            }
            merged
        })
}

fn to_document<T: Serialize>(project: &str, part: &T) -> Result<SettingsDocument, OutputError> {
    let render_error = |reason: String| OutputError::Render {
        project: project.to_string(),
        reason,
    };
    match serde_json::to_value(part) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(render_error(format!(
            "settings section is not a mapping: {}",
            other
        ))),
        Err(e) => Err(render_error(e.to_string())),
    }
}

/// Assemble one project's document.
///
/// Checks run in order: rejected completion record, general settings,
/// processors/modules, summary. The first missing part names the outcome.
pub fn assemble_document(project: &str, parts: &SettingsParts) -> Result<Assembled, OutputError> {
    if let Some(err) = parts.rejected.get(project) {
        return Ok(Assembled::Incomplete(MergeOutcome::SkippedMissingMarker {
            field: err.field().to_string(),
        }));
    }
    let Some(general) = parts.general.get(project) else {
        return Ok(Assembled::Incomplete(MergeOutcome::SkippedMissingGeneral));
    };
    let Some(components) = parts.components.get(project) else {
        return Ok(Assembled::Incomplete(MergeOutcome::SkippedMissingProcessors));
    };
    let Some(summary) = parts.summaries.get(project) else {
        return Ok(Assembled::Incomplete(MergeOutcome::SkippedMissingSummary));
    };

    Ok(Assembled::Complete(merge_documents([
        general.clone(),
        to_document(project, components)?,
        to_document(project, summary)?,
    ])))
}

/// Merges project parts and hands complete documents to the writer
#[derive(Debug, Clone)]
pub struct SettingsMerger {
    writer: SettingsWriter,
    write_enabled: bool,
}

impl SettingsMerger {
    pub fn new(writer: SettingsWriter, write_enabled: bool) -> Self {
        Self {
            writer,
            write_enabled,
        }
    }

    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Merge and persist one project
    pub fn merge_project(
        &self,
        project: &str,
        parts: &SettingsParts,
    ) -> Result<MergeOutcome, OutputError> {
        let document = match assemble_document(project, parts)? {
            Assembled::Complete(document) => document,
            Assembled::Incomplete(outcome) => {
                warn!(
                    project,
                    missing = outcome.missing_category().as_deref().unwrap_or("unknown"),
                    "skipping project: settings incomplete"
                );
                return Ok(outcome);
            }
        };

        if self.write_enabled {
            let path = self.writer.write(project, &document)?;
            info!(project, path = %path.display(), "wrote settings file");
            Ok(MergeOutcome::Written(path))
        } else {
            let path = self.writer.target_path(project)?;
            let yaml = render_yaml(project, &document)?;
            debug!(project, path = %path.display(), "settings document:\n{}", yaml);
            info!(project, path = %path.display(), "dry run: settings file not written");
            Ok(MergeOutcome::DryRun(path))
        }
    }
}
