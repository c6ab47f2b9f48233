//! Settings file output
//!
//! One `<project>.yaml` per project in the settings directory: block-style
//! YAML, keys in document order, UTF-8.

use std::fs;
use std::io;
use std::path::PathBuf;

use crate::settings::SettingsDocument;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("project name {0:?} cannot be used as a file name")]
    InvalidProjectName(String),

    #[error("failed to render settings for {project}: {reason}")]
    Render { project: String, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Render a document as block-style YAML
pub fn render_yaml(project: &str, document: &SettingsDocument) -> Result<String, OutputError> {
    serde_yaml::to_string(document).map_err(|e| OutputError::Render {
        project: project.to_string(),
        reason: e.to_string(),
    })
}

/// Writes settings documents into one directory
#[derive(Debug, Clone)]
pub struct SettingsWriter {
    dir: PathBuf,
}

impl SettingsWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a project's settings file.
    ///
    /// Project names must be plain file names; path separators and `.`/`..`
    /// are rejected.
    pub fn target_path(&self, project: &str) -> Result<PathBuf, OutputError> {
        let invalid = project.is_empty()
            || project == "."
            || project == ".."
            || project.contains(['/', '\\'])
            || project.contains('\0');
        if invalid {
            return Err(OutputError::InvalidProjectName(project.to_string()));
        }
        Ok(self.dir.join(format!("{}.yaml", project)))
    }

    /// Render and write a project's document, replacing any existing file
    pub fn write(&self, project: &str, document: &SettingsDocument) -> Result<PathBuf, OutputError> {
        let path = self.target_path(project)?;
        let yaml = render_yaml(project, document)?;

        fs::create_dir_all(&self.dir).map_err(|source| OutputError::Io {
            path: self.dir.clone(),
            source,
        })?;
        fs::write(&path, yaml).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
