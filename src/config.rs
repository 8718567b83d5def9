//! Configuration - serde-backed option structs
//!
//! Both structs read camelCase JSON so they can be lifted straight out of
//! a `data-*` attribute or a page-level config blob.

use std::time::Duration;

use serde::Deserialize;

use crate::viewport::Triggers;

/// Option overrides for the lazy loader.
///
/// A timeout of 0 keeps the viewport's own default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LazyLoaderOptions {
    /// Quiet period in milliseconds before `resize:complete` fires.
    pub resize_timeout: u64,
    /// Quiet period in milliseconds before `scroll:complete` fires.
    pub scroll_timeout: u64,
    /// Which sources trigger a re-scan. Not read from JSON.
    #[serde(skip)]
    pub triggers: Triggers,
}

impl Default for LazyLoaderOptions {
    fn default() -> Self {
        Self {
            resize_timeout: 0,
            scroll_timeout: 0,
            triggers: Triggers::all(),
        }
    }
}

impl LazyLoaderOptions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn resize_timeout(&self) -> Option<Duration> {
        (self.resize_timeout > 0).then(|| Duration::from_millis(self.resize_timeout))
    }

    pub fn scroll_timeout(&self) -> Option<Duration> {
        (self.scroll_timeout > 0).then(|| Duration::from_millis(self.scroll_timeout))
    }
}

/// Manager-wide settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerOptions {
    /// Global switch for sub-module discovery.
    pub sub_modules_enabled: bool,
    /// Class name prepended to every derived module class.
    pub base_class_name: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            sub_modules_enabled: true,
            base_class_name: "module".to_string(),
        }
    }
}

impl ManagerOptions {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_loader_options_from_json() {
        let options = LazyLoaderOptions::from_json(r#"{"scrollTimeout": 150}"#).unwrap();
        assert_eq!(options.scroll_timeout(), Some(Duration::from_millis(150)));
        assert_eq!(options.resize_timeout(), None);
        assert_eq!(options.triggers, Triggers::all());
    }

    #[test]
    fn test_manager_options_defaults() {
        let options = ManagerOptions::from_json("{}").unwrap();
        assert!(options.sub_modules_enabled);
        assert_eq!(options.base_class_name, "module");

        let options = ManagerOptions::from_json(r#"{"subModulesEnabled": false}"#).unwrap();
        assert!(!options.sub_modules_enabled);
    }
}
