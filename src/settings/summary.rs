//! Project summary section
//!
//! Every filtered project gets a `projects` entry listing its processors and
//! modules as comma-joined `<id>_<project>` identifiers.

use indexmap::IndexMap;
use serde::Serialize;

use super::completion::CompletedForms;
use super::fields::Declarations;

/// One entry of the `projects` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub project: String,
    pub yamlprocessors: String,
    pub modules: String,
}

/// The `projects` part of a settings document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectsSection {
    pub projects: Vec<ProjectSummary>,
}

impl ProjectSummary {
    pub fn from_declarations(project: &str, declarations: &Declarations) -> Self {
        Self {
            project: project.to_string(),
            yamlprocessors: qualify(&declarations.processors, project),
            modules: qualify(&declarations.modules, project),
        }
    }
}

fn qualify(ids: &[String], project: &str) -> String {
    ids.iter()
        .map(|id| format!("{}_{}", id, project))
        .collect::<Vec<_>>()
        .join(",")
}

/// Summary section for every project, whether or not its general form is
/// complete and even when it declares nothing
pub fn build_project_summaries(completed: &[CompletedForms]) -> IndexMap<String, ProjectsSection> {
    completed
        .iter()
        .map(|forms| {
            let declarations = Declarations::from_keys(forms.markers.iter().map(String::as_str));
            let summary = ProjectSummary::from_declarations(&forms.project, &declarations);
            (
                forms.project.clone(),
                ProjectsSection {
                    projects: vec![summary],
                },
            )
        })
        .collect()
}
