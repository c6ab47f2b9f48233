//! Processor and module descriptors
//!
//! Two phases:
//! 1. Discovery: which processors/modules a project declares, read from the
//!    completion markers that survived filtering.
//! 2. Resolution: each declared identifier becomes a descriptor built from the
//!    project's full record (`<id>_name`, `<id>_filepath`, `<id>_args`,
//!    `<id>_args_val`).

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use dax_redcap::Record;

use super::args::{parse_argument_block, Arguments};
use super::completion::CompletedForms;
use super::fields::Declarations;
use super::RecordLayout;

/// One processor or module entry of a settings document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentDescriptor {
    /// Display name (`<id>_name`), null when absent
    pub name: Option<String>,

    /// Path of the processor/module file (`<id>_filepath`), null when absent
    pub filepath: Option<String>,

    /// Parsed `<id>_args_val`, present only when `<id>_args` is 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
}

/// The `yamlprocessors`/`modules` part of a settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectComponents {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub yamlprocessors: Vec<ComponentDescriptor>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ComponentDescriptor>,
}

impl ProjectComponents {
    pub fn is_empty(&self) -> bool {
        self.yamlprocessors.is_empty() && self.modules.is_empty()
    }
}

/// Declarations of every project that completed at least one form besides
/// the general one. Projects with nothing declared are left out.
pub fn discover_declarations(
    completed: &[CompletedForms],
    layout: &RecordLayout,
) -> IndexMap<String, Declarations> {
    let mut discovered = IndexMap::new();
    for forms in completed {
        let mut markers = forms.component_markers(layout).peekable();
        if markers.peek().is_none() {
            continue;
        }
        let declarations = Declarations::from_keys(markers);
        if declarations.is_empty() {
            continue;
        }
        debug!(
            project = %forms.project,
            processors = ?declarations.processors,
            modules = ?declarations.modules,
            "discovered declarations"
        );
        discovered.insert(forms.project.clone(), declarations);
    }
    discovered
}

/// `<id>_args` switches arguments on with 1 (numeric or textual)
fn arguments_enabled(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s.trim() == "1",
        _ => false,
    }
}

/// Build the descriptor of one identifier from a project's full record.
///
/// A malformed argument block is logged and the descriptor keeps no
/// `arguments`; so does an enabled but empty block.
pub fn resolve_descriptor(id: &str, record: &Record) -> ComponentDescriptor {
    let name = record.get_str(&format!("{}_name", id));
    let filepath = record.get_str(&format!("{}_filepath", id));

    let arguments = if arguments_enabled(record.get(&format!("{}_args", id))) {
        let block = record
            .get_str(&format!("{}_args_val", id))
            .unwrap_or_default();
        match parse_argument_block(&block) {
            Ok(args) if args.is_empty() => {
                debug!(component = id, "arguments enabled but block is empty");
                None
            }
            Ok(args) => Some(args),
            Err(e) => {
                warn!(component = id, error = %e, "ignoring malformed argument block");
                None
            }
        }
    } else {
        None
    };

    ComponentDescriptor {
        name,
        filepath,
        arguments,
    }
}

/// Resolve every project's declarations against its full record
pub fn build_project_components(
    completed: &[CompletedForms],
    records: &[Record],
    layout: &RecordLayout,
) -> IndexMap<String, ProjectComponents> {
    let discovered = discover_declarations(completed, layout);
    let mut components = IndexMap::new();

    for record in records {
        let Some(project) = record.record_id(&layout.record_id_field) else {
            continue;
        };
        let Some(declarations) = discovered.get(&project) else {
            continue;
        };

        let resolved = ProjectComponents {
            yamlprocessors: declarations
                .processors
                .iter()
                .map(|id| resolve_descriptor(id, record))
                .collect(),
            modules: declarations
                .modules
                .iter()
                .map(|id| resolve_descriptor(id, record))
                .collect(),
        };
        if !resolved.is_empty() {
            components.insert(project, resolved);
        }
    }

    for project in discovered.keys() {
        if !components.contains_key(project) {
            warn!(project = %project, "declared components but no full record was exported");
        }
    }
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::try_from(value).unwrap()
    }

    fn completed(project: &str, markers: &[&str]) -> CompletedForms {
        CompletedForms {
            project: project.to_string(),
            markers: markers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_resolve_with_arguments() {
        let full = record(json!({
            "align_name": "Aligner",
            "align_filepath": "/bin/align",
            "align_args": 1,
            "align_args_val": "threads: 4\r\nmode: fast"
        }));
        let descriptor = resolve_descriptor("align", &full);

        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "name": "Aligner",
                "filepath": "/bin/align",
                "arguments": {"threads": "4", "mode": "fast"}
            })
        );
    }

    #[test]
    fn test_textual_args_flag() {
        let full = record(json!({
            "qc_name": "QC",
            "qc_filepath": "/bin/qc",
            "qc_args": "1",
            "qc_args_val": "level:2"
        }));
        let descriptor = resolve_descriptor("qc", &full);
        assert_eq!(descriptor.arguments.unwrap()["level"], "2");
    }

    #[test]
    fn test_arguments_disabled() {
        let full = record(json!({
            "qc_name": "QC",
            "qc_filepath": "/bin/qc",
            "qc_args": "0",
            "qc_args_val": "level:2"
        }));
        let descriptor = resolve_descriptor("qc", &full);

        assert!(descriptor.arguments.is_none());
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({"name": "QC", "filepath": "/bin/qc"})
        );
    }

    #[test]
    fn test_malformed_arguments_dropped() {
        let full = record(json!({
            "qc_name": "QC",
            "qc_filepath": "/bin/qc",
            "qc_args": 1,
            "qc_args_val": "level 2"
        }));
        let descriptor = resolve_descriptor("qc", &full);

        assert_eq!(descriptor.name.as_deref(), Some("QC"));
        assert!(descriptor.arguments.is_none());
    }

    #[test]
    fn test_missing_fields_are_null() {
        let descriptor = resolve_descriptor("ghost", &record(json!({"project_name": "P1"})));
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({"name": null, "filepath": null})
        );
    }

    #[test]
    fn test_discovery_requires_component_marker() {
        let batch = vec![
            completed("P1", &["general_complete"]),
            completed("P2", &["general_complete", "process_align_complete", "module_qc_complete"]),
            completed("P3", &["process_fs_complete"]),
            completed("P4", &["extra_notes_complete"]),
        ];
        let discovered = discover_declarations(&batch, &RecordLayout::default());

        let projects: Vec<&String> = discovered.keys().collect();
        assert_eq!(projects, vec!["P2", "P3"]);
        assert_eq!(discovered["P2"].processors, vec!["align"]);
        assert_eq!(discovered["P2"].modules, vec!["qc"]);
        assert_eq!(discovered["P3"].processors, vec!["fs"]);
    }

    #[test]
    fn test_declarations_reset_per_project() {
        let batch = vec![
            completed("P1", &["general_complete", "process_align_complete"]),
            completed("P2", &["general_complete", "module_qc_complete"]),
        ];
        let discovered = discover_declarations(&batch, &RecordLayout::default());

        assert!(discovered["P1"].modules.is_empty());
        assert!(discovered["P2"].processors.is_empty());
    }

    #[test]
    fn test_build_project_components() {
        let batch = vec![
            completed("P1", &["general_complete", "module_qc_complete"]),
            completed("P2", &["general_complete"]),
        ];
        let records = vec![
            record(json!({
                "project_name": "P1",
                "qc_name": "QC",
                "qc_filepath": "/bin/qc",
                "qc_args": "0"
            })),
            record(json!({"project_name": "P2"})),
        ];
        let components = build_project_components(&batch, &records, &RecordLayout::default());

        assert_eq!(components.len(), 1);
        assert_eq!(
            serde_json::to_value(&components["P1"]).unwrap(),
            json!({"modules": [{"name": "QC", "filepath": "/bin/qc"}]})
        );
    }
}
