//! DAX project settings generator
//!
//! Reads project configuration records from REDCap and writes one YAML
//! settings file per project:
//! - `settings`: record transformation (completion filter, general settings,
//!   processor/module descriptors, summaries, merge)
//! - `config`: layered configuration with provenance
//! - `output`: YAML settings files
//! - `pipeline`: run orchestration
//! - `report`: per-run outcome report

pub mod config;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod settings;

pub use config::{ConfigError, EffectiveConfig, SettingsConfig};
pub use output::{render_yaml, OutputError, SettingsWriter};
pub use pipeline::{parse_project_list, PipelineError, PipelineResult, SettingsPipeline};
pub use report::{ProjectReport, ReportOutcome, SyncReport};
pub use settings::{MergeOutcome, RecordLayout, SettingsMerger};
