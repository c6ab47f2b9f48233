//! Record transformation core
//!
//! Turns flat REDCap records into per-project settings documents:
//! - `completion`: prune forms whose `<form>_complete` marker is not "2"
//! - `fields`: field-key naming conventions (processor/module declarations)
//! - `args`: `key:value` argument blocks
//! - `general`: general-form settings per project
//! - `components`: processor/module descriptors per project
//! - `summary`: project-qualified identifier lists
//! - `merge`: assemble and persist one document per project

mod args;
mod completion;
mod components;
mod fields;
mod general;
mod merge;
mod summary;

pub use args::{parse_argument_block, ArgumentError, Arguments};
pub use completion::{
    filter_complete_forms, filter_projects, is_complete, CompletedForms, CompletionError,
    FilteredBatch, COMPLETE_STATUS,
};
pub use components::{
    build_project_components, discover_declarations, resolve_descriptor, ComponentDescriptor,
    ProjectComponents,
};
pub use fields::{classify_form_key, completion_key, Declarations, FormKey, COMPLETE_SUFFIX};
pub use general::{build_general_settings, general_projects, index_general_records, GeneralSettings};
pub use merge::{
    assemble_document, merge_documents, Assembled, MergeOutcome, SettingsDocument,
    SettingsMerger, SettingsParts,
};
pub use summary::{build_project_summaries, ProjectSummary, ProjectsSection};

/// Field naming of the REDCap project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    /// Field identifying a project record
    pub record_id_field: String,
    /// Form holding general settings
    pub general_form: String,
}

impl Default for RecordLayout {
    fn default() -> Self {
        Self {
            record_id_field: "project_name".to_string(),
            general_form: "general".to_string(),
        }
    }
}

impl RecordLayout {
    /// Completion marker of the general form, e.g. `general_complete`
    pub fn general_marker(&self) -> String {
        completion_key(&self.general_form)
    }
}
