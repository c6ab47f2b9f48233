//! Record source interface
//!
//! Abstracts the remote database for testability. Provides:
//! - `RecordSource` trait: record export and form listing
//! - `ExportRequest`: which records, fields and forms to export
//! - `SourceError`: failure taxonomy for the remote side

use crate::record::Record;

/// Interface to the remote record store
pub trait RecordSource {
    /// Export flat records.
    ///
    /// With neither fields nor forms requested, each record carries every
    /// field. Otherwise only the record-id field, the requested fields and the
    /// fields of the requested forms (including their `<form>_complete`
    /// markers) are returned.
    fn export_records(&self, request: &ExportRequest) -> SourceResult<Vec<Record>>;

    /// All form (instrument) names known to the source, in definition order
    fn forms(&self) -> SourceResult<Vec<String>>;
}

/// Parameters of a record export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRequest {
    /// Record identifiers to export (empty = all records)
    pub records: Vec<String>,
    /// Individual fields to include
    pub fields: Vec<String>,
    /// Whole forms to include
    pub forms: Vec<String>,
}

impl ExportRequest {
    /// Export the given records with all of their fields
    pub fn records<I, S>(records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: records.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Restrict the export to the given fields
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the export to the given forms
    pub fn with_forms<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forms = forms.into_iter().map(Into::into).collect();
        self
    }

    /// True when no field or form restriction applies
    pub fn is_unrestricted(&self) -> bool {
        self.fields.is_empty() && self.forms.is_empty()
    }
}

/// Record source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("REDCap unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    #[error("REDCap rejected the API token (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("REDCap rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to decode REDCap response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl SourceError {
    /// Whether another attempt could succeed without changing the request
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Unavailable { .. })
    }
}

/// Result type for record source operations
pub type SourceResult<T> = Result<T, SourceError>;
