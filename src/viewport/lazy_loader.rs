//! LazyLoader - Deferred module creation driven by visibility
//!
//! Elements carrying `data-module-lazyload` are skipped by eager loading.
//! The loader re-scans the viewport whenever scrolling or resizing settles
//! and creates the modules of every visible deferred element whose
//! attribute accepts the trigger reason:
//!
//! - `any` accepts every reason
//! - anything else is a regular expression tested against the reason
//!
//! Scans use the reason `scrollto`. Hovering a deferred element inside the
//! managed root uses the event type (`mouseover`) and skips the
//! visibility test. After a successful creation the attribute is swapped
//! for `data-module-lazyloaded`, so an element is never loaded twice.

use std::ops::ControlFlow;

use regex::Regex;

use super::browser_viewport::{RESIZE_COMPLETE, SCROLL_COMPLETE, Viewport};
use crate::config::LazyLoaderOptions;
use crate::dom::{Element, ListenerId};
use crate::error::{Error, Result};
use crate::events::Propagation;
use crate::module::{LAZYLOAD_ATTRIBUTE, LAZYLOADED_ATTRIBUTE, Manager, WeakManager};

/// Wildcard `data-module-lazyload` value.
pub const ANY: &str = "any";
/// Reason passed for viewport scans.
pub const SCROLL_TO: &str = "scrollto";

const HOVER_EVENT: &str = "mouseover";
const DEFERRED_SELECTOR: &str = "[data-module-lazyload]";

bitflags::bitflags! {
    /// Sources that make the loader look for deferred modules.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Triggers: u8 {
        const SCROLL = 1 << 0;
        const RESIZE = 1 << 1;
        const HOVER = 1 << 2;
    }
}

// =============================================================================
// LOADING
// =============================================================================

/// Does the deferral `pattern` accept `reason`?
pub fn accepts_reason(pattern: &str, reason: &str) -> Result<bool> {
    if pattern == ANY {
        return Ok(true);
    }
    let regex = Regex::new(pattern).map_err(|source| Error::InvalidLazyLoadPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(regex.is_match(reason))
}

/// Create the deferred modules of `element` if its pattern accepts
/// `reason`. Returns true when modules were created.
pub fn lazy_load(manager: &Manager, element: &Element, reason: &str) -> Result<bool> {
    let Some(pattern) = element
        .attribute(LAZYLOAD_ATTRIBUTE)
        .filter(|p| !p.is_empty())
    else {
        return Ok(false);
    };
    if !accepts_reason(&pattern, reason)? {
        return Ok(false);
    }
    if manager.create_modules(element, true)?.is_empty() {
        return Ok(false);
    }

    element.remove_attribute(LAZYLOAD_ATTRIBUTE);
    element.set_attribute(LAZYLOADED_ATTRIBUTE, &pattern);
    tracing::debug!(element = %element.describe(), reason, "lazy loaded");
    Ok(true)
}

/// Load every visible deferred element. Returns how many were loaded.
///
/// An element that fails to load is logged and left deferred; the scan
/// goes on with the next one.
pub fn load_visible(manager: &Manager, viewport: &Viewport) -> Result<usize> {
    let visible = viewport.query_selector_all(DEFERRED_SELECTOR, |_, _| ControlFlow::Continue(()))?;
    let mut loaded = 0;
    for element in visible {
        match lazy_load(manager, &element, SCROLL_TO) {
            Ok(true) => loaded += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(element = %element.describe(), error = %err, "lazy load failed");
            }
        }
    }
    Ok(loaded)
}

fn rescan(manager: &WeakManager, viewport: &Viewport, trigger: &str) {
    let Some(manager) = manager.upgrade() else {
        return;
    };
    if let Err(err) = load_visible(&manager, viewport) {
        tracing::error!(trigger, error = %err, "lazy load scan failed");
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// Watches a viewport on behalf of a manager.
#[derive(Debug)]
pub struct LazyLoader {
    manager: WeakManager,
    viewport: Viewport,
    element: Option<Element>,
    options: LazyLoaderOptions,
    scroll_listener: Option<ListenerId>,
    resize_listener: Option<ListenerId>,
    hover_listener: Option<(Element, ListenerId)>,
}

impl LazyLoader {
    pub fn new(manager: WeakManager, viewport: Viewport) -> Self {
        Self {
            manager,
            viewport,
            element: None,
            options: LazyLoaderOptions::default(),
            scroll_listener: None,
            resize_listener: None,
            hover_listener: None,
        }
    }

    /// Root watched for hover. Defaults to nothing; `init` requires one.
    pub fn set_element(&mut self, element: Element) {
        self.element = Some(element);
    }

    pub fn element(&self) -> Option<&Element> {
        self.element.as_ref()
    }

    pub fn set_manager(&mut self, manager: WeakManager) {
        self.manager = manager;
    }

    pub fn set_options(&mut self, options: LazyLoaderOptions) {
        self.options = options;
    }

    pub fn options(&self) -> &LazyLoaderOptions {
        &self.options
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_listening(&self) -> bool {
        self.scroll_listener.is_some() || self.resize_listener.is_some() || self.hover_listener.is_some()
    }

    /// Apply options, subscribe and load whatever is already visible.
    /// Calling it again replaces the previous subscriptions.
    pub fn init(&mut self) -> Result<()> {
        let element = self.element.clone().ok_or(Error::MissingArgument("element"))?;
        let manager = self.manager.upgrade().ok_or(Error::MissingArgument("manager"))?;
        self.unsubscribe();

        if let Some(timeout) = self.options.resize_timeout() {
            self.viewport.set_resize_timeout(timeout);
        }
        if let Some(timeout) = self.options.scroll_timeout() {
            self.viewport.set_scroll_timeout(timeout);
        }

        let triggers = self.options.triggers;
        if triggers.contains(Triggers::SCROLL) {
            let weak = self.manager.clone();
            self.scroll_listener = self.viewport.add_event_listener(SCROLL_COMPLETE, move |viewport| {
                rescan(&weak, viewport, SCROLL_COMPLETE);
                Propagation::Continue
            });
        }
        if triggers.contains(Triggers::RESIZE) {
            let weak = self.manager.clone();
            self.resize_listener = self.viewport.add_event_listener(RESIZE_COMPLETE, move |viewport| {
                rescan(&weak, viewport, RESIZE_COMPLETE);
                Propagation::Continue
            });
        }
        if triggers.contains(Triggers::HOVER) {
            let weak = self.manager.clone();
            let document = element.document().downgrade();
            let id = element.document().add_event_listener(element.node(), HOVER_EVENT, move |event| {
                let (Some(manager), Some(document)) = (weak.upgrade(), document.upgrade()) else {
                    return;
                };
                let target = document.element(event.target);
                if let Err(err) = lazy_load(&manager, &target, &event.event_type) {
                    tracing::error!(element = %target.describe(), error = %err, "lazy load on hover failed");
                }
            });
            self.hover_listener = Some((element, id));
        }

        let loaded = load_visible(&manager, &self.viewport)?;
        tracing::debug!(loaded, ?triggers, "lazy loader ready");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(id) = self.scroll_listener.take() {
            self.viewport.remove_event_listener(SCROLL_COMPLETE, id);
        }
        if let Some(id) = self.resize_listener.take() {
            self.viewport.remove_event_listener(RESIZE_COMPLETE, id);
        }
        if let Some((element, id)) = self.hover_listener.take() {
            element.document().remove_event_listener(id);
        }
    }

    /// Stop listening and forget the root.
    pub fn destructor(&mut self) {
        self.unsubscribe();
        self.element = None;
        self.manager = WeakManager::default();
    }
}

impl Drop for LazyLoader {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
