//! MetaData - Typed view of an element's module declaration
//!
//! Reads `data-modules`, `data-module-options` and `data-module-media`.
//! With one declared type the whole options object belongs to it; with
//! several, options are keyed by type name and a missing key means `{}`.

use std::ops::ControlFlow;

use serde_json::Value;

use crate::dom::{Element, Window};
use crate::error::{Error, Result};
use crate::types::OptionBag;

pub const MODULES_ATTRIBUTE: &str = "data-modules";
pub const OPTIONS_ATTRIBUTE: &str = "data-module-options";
pub const MEDIA_ATTRIBUTE: &str = "data-module-media";
pub const CREATED_ATTRIBUTE: &str = "data-modules-created";
pub const PROPERTY_ATTRIBUTE: &str = "data-module-property";
pub const LAZYLOAD_ATTRIBUTE: &str = "data-module-lazyload";
pub const LAZYLOADED_ATTRIBUTE: &str = "data-module-lazyloaded";

#[derive(Debug, Clone)]
pub struct MetaData {
    element: Element,
    types: Vec<String>,
    options: OptionBag,
    media: Option<String>,
}

impl MetaData {
    pub fn parse(element: &Element) -> Result<Self> {
        let types: Vec<String> = element
            .attribute(MODULES_ATTRIBUTE)
            .map(|raw| raw.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        if types.is_empty() {
            return Err(Error::MissingAttribute {
                attribute: MODULES_ATTRIBUTE,
                element: element.describe(),
            });
        }

        let options = match element.attribute(OPTIONS_ATTRIBUTE).filter(|s| !s.trim().is_empty()) {
            None => OptionBag::new(),
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(Error::OptionsNotObject {
                        element: element.describe(),
                    });
                }
                Err(source) => {
                    return Err(Error::InvalidOptions {
                        element: element.describe(),
                        source,
                    });
                }
            },
        };

        let media = element.attribute(MEDIA_ATTRIBUTE).filter(|m| !m.is_empty());

        Ok(Self {
            element: element.clone(),
            types,
            options,
            media,
        })
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn options(&self) -> &OptionBag {
        &self.options
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    /// Options belonging to the type at `index`.
    pub fn options_for(&self, index: usize) -> OptionBag {
        if self.types.len() == 1 {
            return self.options.clone();
        }
        self.types
            .get(index)
            .and_then(|t| self.options.get(t))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Visit `(element, type, options, index)` per declared type, stopping
    /// at the first `Break`.
    pub fn for_each<B, F>(&self, mut callback: F) -> ControlFlow<B>
    where
        F: FnMut(&Element, &str, OptionBag, usize) -> ControlFlow<B>,
    {
        for (index, type_name) in self.types.iter().enumerate() {
            callback(&self.element, type_name, self.options_for(index), index)?;
        }
        ControlFlow::Continue(())
    }

    /// True without a media condition, else whatever the host says.
    /// Fails when the host cannot evaluate media queries at all.
    pub fn media_matches(&self, window: &Window) -> Result<bool> {
        let matcher = window.media_matcher().ok_or(Error::MediaQueriesUnsupported)?;
        let Some(media) = &self.media else {
            return Ok(true);
        };
        let matches = matcher.matches(media);
        tracing::debug!(media = %media, matches, "match media");
        Ok(matches)
    }
}
