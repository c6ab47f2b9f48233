//! REDCap record source
//!
//! Everything the settings generator needs from the remote survey database:
//! - `Record`: one flat field -> value record as exported by REDCap
//! - `RecordSource`: the export interface (records + form names)
//! - `RedcapClient`: blocking HTTP client for the REDCap API
//! - `MockRecordSource`: in-memory source with REDCap export semantics for tests

mod client;
mod mock;
mod record;
mod retry;
mod source;

pub use client::{instrument_params, record_export_params, RedcapClient, RedcapClientConfig};
pub use mock::MockRecordSource;
pub use record::Record;
pub use retry::RetryPolicy;
pub use source::{ExportRequest, RecordSource, SourceError, SourceResult};
