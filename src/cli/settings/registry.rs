//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{BaseUrlHandler, DefaultModelHandler, DefaultProviderHandler};
use super::SettingHandler;
use crate::core::config::data::Config;

/// Registry of all available setting handlers.
pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `tokenlens set` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        registry.register(Box::new(DefaultProviderHandler));
        registry.register(Box::new(DefaultModelHandler));
        registry.register(Box::new(BaseUrlHandler));

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    /// Renders every setting in display order.
    pub fn format_all(&self, config: &Config) -> String {
        let mut output = String::from("Current configuration:");
        for key in &self.display_order {
            if let Some(handler) = self.handlers.get(key) {
                output.push('\n');
                output.push_str(&handler.format(config));
            }
        }
        output
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}
