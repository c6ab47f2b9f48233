//! Field-key naming conventions
//!
//! Processor forms are named `process_<id>` and module forms `module_<id>`,
//! so their completion markers read `process_<id>_complete` and
//! `module_<id>_complete`. The data fields of a declared component are
//! prefixed with its identifier: `<id>_name`, `<id>_filepath`, `<id>_args`,
//! `<id>_args_val`.

/// Suffix of a form's completion marker
pub const COMPLETE_SUFFIX: &str = "_complete";

const PROCESSOR_MARKER: &str = "process_";
const MODULE_MARKER: &str = "module_";

/// What a field key declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormKey {
    /// A processor declaration with its identifier
    Processor(String),
    /// A module declaration with its identifier
    Module(String),
    /// Neither
    Other,
}

impl FormKey {
    /// `(processor id, module id)`; an empty string means not applicable
    pub fn identifiers(&self) -> (&str, &str) {
        match self {
            FormKey::Processor(id) => (id.as_str(), ""),
            FormKey::Module(id) => ("", id.as_str()),
            FormKey::Other => ("", ""),
        }
    }
}

/// Completion marker field of a form
pub fn completion_key(form: &str) -> String {
    format!("{}{}", form, COMPLETE_SUFFIX)
}

/// Classify a field key.
///
/// A key containing `process_` is a processor even when it also contains
/// `module_`. The identifier runs from the marker up to the next `_complete`
/// (or the end of the key); an empty identifier classifies as `Other`.
pub fn classify_form_key(key: &str) -> FormKey {
    if key.contains(PROCESSOR_MARKER) {
        return identifier_after(key, PROCESSOR_MARKER)
            .map(FormKey::Processor)
            .unwrap_or(FormKey::Other);
    }
    if key.contains(MODULE_MARKER) {
        return identifier_after(key, MODULE_MARKER)
            .map(FormKey::Module)
            .unwrap_or(FormKey::Other);
    }
    FormKey::Other
}

fn identifier_after(key: &str, marker: &str) -> Option<String> {
    let (_, rest) = key.split_once(marker)?;
    let id = match rest.find(COMPLETE_SUFFIX) {
        Some(end) => &rest[..end],
        None => rest,
    };
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Processor and module identifiers declared by one project.
///
/// Identifiers keep first-seen order and are never duplicated. A value is
/// built fresh for every project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub processors: Vec<String>,
    pub modules: Vec<String>,
}

impl Declarations {
    /// Accumulate declarations from a sequence of field keys
    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .map(classify_form_key)
            .fold(Self::default(), Self::with)
    }

    /// Add one classified key
    pub fn with(mut self, key: FormKey) -> Self {
        match key {
            FormKey::Processor(id) => {
                if !self.processors.contains(&id) {
                    self.processors.push(id);
                }
            }
            FormKey::Module(id) => {
                if !self.modules.contains(&id) {
                    self.modules.push(id);
                }
            }
            FormKey::Other => {}
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty() && self.modules.is_empty()
    }
}
