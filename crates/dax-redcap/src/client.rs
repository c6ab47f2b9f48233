//! REDCap API client
//!
//! Blocking HTTP client for the REDCap API. Every call is a single
//! form-encoded POST wrapped in the configured retry policy.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::source::{ExportRequest, RecordSource, SourceError, SourceResult};

/// Client configuration
#[derive(Debug, Clone)]
pub struct RedcapClientConfig {
    /// API endpoint, e.g. `https://redcap.example.edu/api/`
    pub api_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for RedcapClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://redcap.vanderbilt.edu/api/".to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// REDCap API client bound to one project token
pub struct RedcapClient {
    http: Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
}

impl fmt::Debug for RedcapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedcapClient")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}

/// Instrument entry from `content=instrument`
#[derive(Debug, Deserialize)]
struct Instrument {
    instrument_name: String,
}

impl RedcapClient {
    /// Create a client for the given API token
    pub fn new(token: impl Into<String>, config: RedcapClientConfig) -> SourceResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SourceError::Config("API token is empty".to_string()));
        }
        if config.api_url.trim().is_empty() {
            return Err(SourceError::Config("API URL is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url,
            token,
            retry: config.retry,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// POST the parameters and decode the JSON body
    fn post_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        params: &[(String, String)],
    ) -> SourceResult<T> {
        self.retry.run(operation, || {
            debug!(operation, url = %self.api_url, "sending REDCap request");
            let response = self
                .http
                .post(&self.api_url)
                .form(params)
                .send()
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(SourceError::Unauthorized {
                    status: status.as_u16(),
                });
            }
            if status.is_server_error() {
                return Err(SourceError::Unavailable {
                    url: self.api_url.clone(),
                    reason: format!("HTTP {}", status.as_u16()),
                });
            }
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(SourceError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            response
                .json::<T>()
                .map_err(|e| SourceError::Decode(e.to_string()))
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SourceError {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            err.to_string()
        };
        SourceError::Unavailable {
            url: self.api_url.clone(),
            reason,
        }
    }
}

impl RecordSource for RedcapClient {
    fn export_records(&self, request: &ExportRequest) -> SourceResult<Vec<Record>> {
        let params = record_export_params(&self.token, request);
        let records: Vec<Record> = self.post_json("export_records", &params)?;
        debug!(
            requested = request.records.len(),
            returned = records.len(),
            "exported records"
        );
        Ok(records)
    }

    fn forms(&self) -> SourceResult<Vec<String>> {
        let params = instrument_params(&self.token);
        let instruments: Vec<Instrument> = self.post_json("export_instruments", &params)?;
        Ok(instruments
            .into_iter()
            .map(|instrument| instrument.instrument_name)
            .collect())
    }
}

/// Form parameters for a flat JSON record export
pub fn record_export_params(token: &str, request: &ExportRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("token".to_string(), token.to_string()),
        ("content".to_string(), "record".to_string()),
        ("format".to_string(), "json".to_string()),
        ("type".to_string(), "flat".to_string()),
        ("returnFormat".to_string(), "json".to_string()),
    ];
    push_indexed(&mut params, "records", &request.records);
    push_indexed(&mut params, "fields", &request.fields);
    push_indexed(&mut params, "forms", &request.forms);
    params
}

/// Form parameters for listing instruments (forms)
pub fn instrument_params(token: &str) -> Vec<(String, String)> {
    vec![
        ("token".to_string(), token.to_string()),
        ("content".to_string(), "instrument".to_string()),
        ("format".to_string(), "json".to_string()),
        ("returnFormat".to_string(), "json".to_string()),
    ]
}

/// REDCap expects arrays as `name[0]=a&name[1]=b`
fn push_indexed(params: &mut Vec<(String, String)>, name: &str, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        params.push((format!("{}[{}]", name, i), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_record_export_params() {
        let request = ExportRequest::records(["P1", "P2"]).with_fields(["general_complete"]);
        let params = record_export_params("secret", &request);

        assert_eq!(param(&params, "token"), Some("secret"));
        assert_eq!(param(&params, "content"), Some("record"));
        assert_eq!(param(&params, "type"), Some("flat"));
        assert_eq!(param(&params, "records[0]"), Some("P1"));
        assert_eq!(param(&params, "records[1]"), Some("P2"));
        assert_eq!(param(&params, "fields[0]"), Some("general_complete"));
        assert_eq!(param(&params, "forms[0]"), None);
    }

    #[test]
    fn test_form_restricted_params() {
        let request = ExportRequest::records(["P1"]).with_forms(["general"]);
        let params = record_export_params("secret", &request);

        assert_eq!(param(&params, "forms[0]"), Some("general"));
        assert_eq!(param(&params, "fields[0]"), None);
    }

    #[test]
    fn test_instrument_params() {
        let params = instrument_params("secret");
        assert_eq!(param(&params, "content"), Some("instrument"));
        assert_eq!(param(&params, "format"), Some("json"));
    }

    #[test]
    fn test_rejects_empty_token() {
        let err = RedcapClient::new("  ", RedcapClientConfig::default()).unwrap_err();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = RedcapClient::new("ABCDEF0123", RedcapClientConfig::default()).unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("ABCDEF0123"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_unreachable_host_is_unavailable() {
        let config = RedcapClientConfig {
            api_url: "http://127.0.0.1:9/api/".to_string(),
            timeout: Duration::from_secs(2),
            retry: RetryPolicy::none(),
        };
        let client = RedcapClient::new("token", config).unwrap();
        let err = client.forms().unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
    }
}
