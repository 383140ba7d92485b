//! Settings management for CLI set/unset commands.
//!
//! Each configuration key is served by a [`SettingHandler`]:
//!
//! - Simple settings (`default-provider`)
//! - Provider-keyed settings (`default-model`, `base-url`)

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;

pub use error::SettingError;
pub use registry::SettingRegistry;

use std::path::Path;

use crate::core::config::data::Config;

/// Context provided to setting handlers during set/unset operations.
pub struct SetContext<'a> {
    /// Snapshot used for validation and display.
    pub config: &'a Config,
    /// File the change is written to.
    pub config_path: &'a Path,
}

/// Trait for handling a configuration setting.
pub trait SettingHandler: Send + Sync {
    /// Returns the configuration key this handler manages.
    fn key(&self) -> &'static str;

    /// Sets the value from the arguments that followed the key and returns
    /// the message to display.
    fn set(&self, args: &[String], ctx: &SetContext<'_>) -> Result<String, SettingError>;

    /// Clears the value. Provider-keyed settings take the provider id.
    fn unset(&self, args: Option<&str>, ctx: &SetContext<'_>) -> Result<String, SettingError>;

    /// Formats the current value for `tokenlens set` output.
    fn format(&self, config: &Config) -> String;
}

#[cfg(test)]
mod tests;
