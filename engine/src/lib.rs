//! Session orchestration for glint.
//!
//! [`Coordinator`] ties provisioning, debounced validation and the analysis
//! server together behind an explicit start/stop lifecycle. Configuration is
//! read from `~/.glint/config.toml`.

mod analyzer;
mod config;
mod coordinator;

pub use analyzer::{AnalyzerError, AnalyzerServer, AnalyzerTransport};
pub use config::{
    AnalyzerConfig, ConfigError, GlintConfig, ProvisionConfig, ValidationConfig, config_path,
    expand_env_vars,
};
pub use coordinator::{Coordinator, DocumentEvent, Subscription};
