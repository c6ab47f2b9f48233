//! In-memory record source
//!
//! Mirrors the REDCap export semantics the settings pipeline depends on:
//! the record-id field is always returned, field/form restrictions select
//! columns, unknown record ids are ignored, and records come back in
//! storage order regardless of request order.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::record::Record;
use crate::source::{ExportRequest, RecordSource, SourceError, SourceResult};

/// Mock record source for tests
#[derive(Debug)]
pub struct MockRecordSource {
    record_id_field: String,
    forms: Vec<(String, Vec<String>)>,
    records: Vec<Record>,
    unavailable: bool,
    requests: Mutex<Vec<ExportRequest>>,
}

impl Default for MockRecordSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecordSource {
    /// Empty source keyed by `project_name`
    pub fn new() -> Self {
        Self {
            record_id_field: "project_name".to_string(),
            forms: Vec::new(),
            records: Vec::new(),
            unavailable: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Use a different record-id field
    pub fn with_record_id_field(mut self, field: impl Into<String>) -> Self {
        self.record_id_field = field.into();
        self
    }

    /// Declare a form and the data fields it owns (without its `_complete` marker)
    pub fn with_form<I, S>(mut self, name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forms
            .push((name.into(), fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Store a record
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Make every call fail as if the server were down
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Export requests received so far
    pub fn requests(&self) -> Vec<ExportRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn check_available(&self) -> SourceResult<()> {
        if self.unavailable {
            return Err(SourceError::Unavailable {
                url: "mock://redcap".to_string(),
                reason: "mock source configured as unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Columns selected by a restricted request
    fn selected_columns(&self, request: &ExportRequest) -> HashSet<String> {
        let mut columns: HashSet<String> = HashSet::new();
        columns.insert(self.record_id_field.clone());
        columns.extend(request.fields.iter().cloned());
        for (name, fields) in &self.forms {
            if request.forms.contains(name) {
                columns.extend(fields.iter().cloned());
                columns.insert(format!("{}_complete", name));
            }
        }
        columns
    }
}

impl RecordSource for MockRecordSource {
    fn export_records(&self, request: &ExportRequest) -> SourceResult<Vec<Record>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.check_available()?;

        let wanted = |record: &Record| {
            request.records.is_empty()
                || record
                    .record_id(&self.record_id_field)
                    .map(|id| request.records.contains(&id))
                    .unwrap_or(false)
        };

        let columns = if request.is_unrestricted() {
            None
        } else {
            Some(self.selected_columns(request))
        };

        Ok(self
            .records
            .iter()
            .filter(|record| wanted(record))
            .map(|record| match &columns {
                None => record.clone(),
                Some(columns) => record
                    .as_map()
                    .iter()
                    .filter(|(key, _)| columns.contains(key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect::<Record>(),
            })
            .collect())
    }

    fn forms(&self) -> SourceResult<Vec<String>> {
        self.check_available()?;
        Ok(self.forms.iter().map(|(name, _)| name.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> MockRecordSource {
        MockRecordSource::new()
            .with_form("general", ["site", "owner"])
            .with_form("process_align", ["align_name", "align_filepath"])
            .with_record(
                Record::try_from(json!({
                    "project_name": "P1",
                    "site": "VU",
                    "owner": "lab",
                    "general_complete": "2",
                    "align_name": "Aligner",
                    "align_filepath": "/bin/align",
                    "process_align_complete": "0"
                }))
                .unwrap(),
            )
            .with_record(
                Record::try_from(json!({
                    "project_name": "P2",
                    "site": "UK",
                    "general_complete": "1"
                }))
                .unwrap(),
            )
    }

    #[test]
    fn test_unrestricted_export_returns_full_records() {
        let records = source().export_records(&ExportRequest::records(["P1"])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 7);
    }

    #[test]
    fn test_field_restriction_keeps_record_id() {
        let request = ExportRequest::records(["P1", "P2"])
            .with_fields(["general_complete", "process_align_complete"]);
        let records = source().export_records(&request).unwrap();

        let keys: Vec<&str> = records[0].keys().collect();
        assert_eq!(
            keys,
            vec!["project_name", "general_complete", "process_align_complete"]
        );
        let keys: Vec<&str> = records[1].keys().collect();
        assert_eq!(keys, vec!["project_name", "general_complete"]);
    }

    #[test]
    fn test_form_restriction_includes_marker() {
        let request = ExportRequest::records(["P1"]).with_forms(["general"]);
        let records = source().export_records(&request).unwrap();

        let keys: Vec<&str> = records[0].keys().collect();
        assert_eq!(keys, vec!["project_name", "site", "owner", "general_complete"]);
    }

    #[test]
    fn test_unknown_records_ignored() {
        let records = source()
            .export_records(&ExportRequest::records(["P9"]))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_forms_in_definition_order() {
        assert_eq!(source().forms().unwrap(), vec!["general", "process_align"]);
    }

    #[test]
    fn test_requests_are_recorded() {
        let source = source();
        source.export_records(&ExportRequest::records(["P1"])).unwrap();
        source
            .export_records(&ExportRequest::records(["P2"]).with_forms(["general"]))
            .unwrap();

        let requests = source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].forms, vec!["general"]);
    }

    #[test]
    fn test_unavailable_source() {
        let source = source().unavailable();
        assert!(matches!(
            source.forms(),
            Err(SourceError::Unavailable { .. })
        ));
        assert!(source.export_records(&ExportRequest::default()).is_err());
    }
}
