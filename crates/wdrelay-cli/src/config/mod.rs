//! CLI configuration file support
//!
//! Loads configuration from ~/.config/wdrelay/config.toml

mod settings;

pub use settings::AgentSettings;
