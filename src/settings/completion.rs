//! Form completion filter
//!
//! A form counts for a project only when its `<form>_complete` marker is the
//! string "2" (REDCap's "Complete" status). Incomplete markers are dropped
//! from the project's completion record; every other field is left alone.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use dax_redcap::Record;

use super::fields::completion_key;
use super::RecordLayout;

/// Marker value of a completed form
pub const COMPLETE_STATUS: &str = "2";

/// Completion filter errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("project '{project}' has no '{field}' field")]
    MissingField { project: String, field: String },

    #[error("record has no '{field}' identifier")]
    MissingRecordId { field: String },
}

impl CompletionError {
    /// The field whose absence caused the error
    pub fn field(&self) -> &str {
        match self {
            CompletionError::MissingField { field, .. } => field,
            CompletionError::MissingRecordId { field } => field,
        }
    }
}

/// Whether a completion marker value means "complete"
pub fn is_complete(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(status)) if status == COMPLETE_STATUS)
}

/// Drop the completion marker of every form that is not complete.
///
/// Fails when a form has no marker in the record at all.
pub fn filter_complete_forms(
    forms: &[String],
    mut record: Record,
    record_id_field: &str,
) -> Result<Record, CompletionError> {
    for form in forms {
        let key = completion_key(form);
        if !record.contains_key(&key) {
            return Err(CompletionError::MissingField {
                project: record
                    .record_id(record_id_field)
                    .unwrap_or_else(|| "<unknown>".to_string()),
                field: key,
            });
        }
        if !is_complete(record.get(&key)) {
            record.remove(&key);
        }
    }
    Ok(record)
}

/// Completed forms of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedForms {
    /// Project name (record id)
    pub project: String,
    /// Completion markers that survived filtering, in record order
    pub markers: Vec<String>,
}

impl CompletedForms {
    /// Build from a filtered completion record
    pub fn from_record(record: &Record, record_id_field: &str) -> Result<Self, CompletionError> {
        let project = record
            .record_id(record_id_field)
            .ok_or_else(|| CompletionError::MissingRecordId {
                field: record_id_field.to_string(),
            })?;
        let markers = record
            .keys()
            .filter(|key| *key != record_id_field)
            .map(str::to_string)
            .collect();
        Ok(Self { project, markers })
    }

    /// Whether the given form is complete
    pub fn has_completed(&self, form: &str) -> bool {
        let key = completion_key(form);
        self.markers.iter().any(|marker| *marker == key)
    }

    /// Markers other than the general form's
    pub fn component_markers<'a>(
        &'a self,
        layout: &RecordLayout,
    ) -> impl Iterator<Item = &'a str> + 'a {
        let general = layout.general_marker();
        self.markers
            .iter()
            .map(String::as_str)
            .filter(move |marker| *marker != general)
    }
}

/// Outcome of filtering a batch of completion records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredBatch {
    /// Projects whose completion record was usable, in batch order
    pub completed: Vec<CompletedForms>,
    /// Projects whose completion record lacked a form marker
    pub rejected: IndexMap<String, CompletionError>,
}

/// Filter the completion records of a batch of projects.
///
/// A project whose record lacks a form marker is logged and moved to
/// `rejected`; a record without an identifier cannot be attributed and is
/// only logged. The others are still returned.
pub fn filter_projects(forms: &[String], records: Vec<Record>, layout: &RecordLayout) -> FilteredBatch {
    let mut batch = FilteredBatch {
        completed: Vec::with_capacity(records.len()),
        rejected: IndexMap::new(),
    };
    for record in records {
        let project = record.record_id(&layout.record_id_field);
        let filtered = filter_complete_forms(forms, record, &layout.record_id_field)
            .and_then(|record| CompletedForms::from_record(&record, &layout.record_id_field));
        match filtered {
            Ok(project_forms) => {
                debug!(
                    project = %project_forms.project,
                    completed = ?project_forms.markers,
                    "filtered completed forms"
                );
                batch.completed.push(project_forms);
            }
            Err(e) => {
                warn!(error = %e, "skipping project with incomplete completion record");
                let missing_marker = matches!(e, CompletionError::MissingField { .. });
                if let (true, Some(project)) = (missing_marker, project) {
                    batch.rejected.insert(project, e);
                }
            }
        }
    }
    batch
}
