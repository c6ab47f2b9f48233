//! General settings per project
//!
//! The "general" form holds project-wide settings. Only projects that
//! completed it get an entry; its fields are re-exported from the source and
//! the completion marker stripped.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use dax_redcap::{ExportRequest, Record, RecordSource, SourceResult};

use super::completion::CompletedForms;
use super::RecordLayout;

/// General-form fields of one project, marker removed
pub type GeneralSettings = Map<String, Value>;

/// Projects whose general form is complete, in batch order
pub fn general_projects(completed: &[CompletedForms], layout: &RecordLayout) -> Vec<String> {
    completed
        .iter()
        .filter(|forms| forms.has_completed(&layout.general_form))
        .map(|forms| forms.project.clone())
        .collect()
}

/// Index exported general-form records by project name
pub fn index_general_records(
    records: Vec<Record>,
    layout: &RecordLayout,
) -> IndexMap<String, GeneralSettings> {
    let marker = layout.general_marker();
    let mut settings = IndexMap::new();
    for mut record in records {
        let Some(project) = record.record_id(&layout.record_id_field) else {
            warn!(
                field = %layout.record_id_field,
                "general settings record without project identifier"
            );
            continue;
        };
        record.remove(&marker);
        settings.insert(project, record.into_map());
    }
    settings
}

/// Export and index the general form of every project that completed it.
///
/// No request is made when no project qualifies.
pub fn build_general_settings<S: RecordSource>(
    source: &S,
    completed: &[CompletedForms],
    layout: &RecordLayout,
) -> SourceResult<IndexMap<String, GeneralSettings>> {
    let projects = general_projects(completed, layout);
    if projects.is_empty() {
        debug!("no project has a completed general form");
        return Ok(IndexMap::new());
    }

    let request = ExportRequest::records(projects).with_forms([layout.general_form.as_str()]);
    let records = source.export_records(&request)?;
    let settings = index_general_records(records, layout);
    debug!(projects = settings.len(), "built general settings");
    Ok(settings)
}
