//! Manager - Module registry and lifecycle
//!
//! The manager is the entry point: it discovers `data-modules` elements,
//! drives the [`Provider`] to build modules, registers and initializes
//! them, and tears everything down again.
//!
//! # State
//!
//! ```text
//! unregistered → registered → unregistered
//! ```
//!
//! Every registered module sits in the registry (keyed by guid) and in the
//! group for its type. Both are updated together.
//!
//! # Example
//!
//! ```ignore
//! let manager = Manager::new(window.clone());
//! manager.register_type("Blog.PostModule", PostModule::new)?;
//! manager.eager_load_modules(&body)?;
//! manager.lazy_load_modules(&body, LazyLoaderOptions::default())?;
//! ```

use std::cell::{Cell, RefCell, RefMut};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::base::{Guid, Module, ModuleRef};
use super::factory::ObjectFactory;
use super::meta_data::{
    MetaData, CREATED_ATTRIBUTE, LAZYLOAD_ATTRIBUTE, MODULES_ATTRIBUTE, PROPERTY_ATTRIBUTE,
};
use super::observer::{ModuleObserver, NullObserver};
use super::provider::Provider;
use crate::config::{LazyLoaderOptions, ManagerOptions};
use crate::dom::{Element, Window};
use crate::error::{Error, Result};
use crate::types::OptionBag;
use crate::viewport::{LazyLoader, Viewport};

/// Record that `element` has been processed: its declaration moves from
/// `data-modules` to `data-modules-created`.
pub fn mark_modules_created(element: &Element, meta: &MetaData) {
    element.set_attribute(CREATED_ATTRIBUTE, &meta.types().join(" "));
    element.remove_attribute(MODULES_ATTRIBUTE);
}

fn has_value(element: &Element, attribute: &str) -> bool {
    element.attribute(attribute).is_some_and(|v| !v.is_empty())
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone)]
struct RegistryEntry {
    module: ModuleRef,
    type_name: String,
}

#[derive(Default)]
struct ManagerState {
    registry: IndexMap<Guid, RegistryEntry>,
    groups: IndexMap<String, Vec<ModuleRef>>,
    default_module: Option<ModuleRef>,
    default_module_focused: bool,
}

struct ManagerInner {
    window: Window,
    viewport: Viewport,
    provider: RefCell<Provider>,
    state: RefCell<ManagerState>,
    lazy_loader: RefCell<Option<LazyLoader>>,
    observer: RefCell<Rc<dyn ModuleObserver>>,
    in_pass: Cell<bool>,
}

/// Clears the in-pass flag when a creation pass ends.
struct PassGuard<'a>(&'a Cell<bool>);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Shared manager handle.
#[derive(Clone)]
pub struct Manager {
    inner: Rc<ManagerInner>,
}

/// Non-owning manager handle, held by listeners and the provider.
#[derive(Clone, Default)]
pub struct WeakManager(Weak<ManagerInner>);

impl WeakManager {
    pub fn upgrade(&self) -> Option<Manager> {
        self.0.upgrade().map(|inner| Manager { inner })
    }
}

impl std::fmt::Debug for WeakManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakManager")
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Manager");
        if let Ok(state) = self.inner.state.try_borrow() {
            s.field("registered", &state.registry.len());
            s.field("groups", &state.groups.keys().collect::<Vec<_>>());
        }
        s.finish()
    }
}

impl Manager {
    pub fn new(window: Window) -> Self {
        Self::with_options(window, ManagerOptions::default())
    }

    pub fn with_options(window: Window, options: ManagerOptions) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let mut provider = Provider::default();
            provider.set_manager(WeakManager(weak.clone()));
            provider.set_sub_modules_enabled(options.sub_modules_enabled);
            provider.set_base_class_name(&options.base_class_name);

            ManagerInner {
                viewport: Viewport::new(window.clone()),
                window,
                provider: RefCell::new(provider),
                state: RefCell::new(ManagerState::default()),
                lazy_loader: RefCell::new(None),
                observer: RefCell::new(Rc::new(NullObserver)),
                in_pass: Cell::new(false),
            }
        });
        Self { inner }
    }

    pub fn downgrade(&self) -> WeakManager {
        WeakManager(Rc::downgrade(&self.inner))
    }

    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    pub fn viewport(&self) -> &Viewport {
        &self.inner.viewport
    }

    fn state_mut(&self) -> Result<RefMut<'_, ManagerState>> {
        self.inner.state.try_borrow_mut().map_err(|_| {
            tracing::warn!("manager state already borrowed");
            Error::ManagerBusy
        })
    }

    fn observer(&self) -> Rc<dyn ModuleObserver> {
        self.inner.observer.borrow().clone()
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    /// Run `f` with mutable access to the provider.
    pub fn with_provider<R>(&self, f: impl FnOnce(&mut Provider) -> R) -> Result<R> {
        let mut provider = self.inner.provider.try_borrow_mut().map_err(|_| {
            tracing::warn!("provider already borrowed");
            Error::ManagerBusy
        })?;
        Ok(f(&mut provider))
    }

    /// Register a module type with the factory.
    pub fn register_type<M, F>(&self, type_name: &str, constructor: F) -> Result<()>
    where
        M: Module,
        F: Fn() -> M + 'static,
    {
        self.with_provider(|provider| provider.factory_mut().register(type_name, constructor))?
    }

    pub fn set_object_factory(&self, object_factory: Rc<dyn ObjectFactory>) -> Result<()> {
        self.with_provider(|provider| provider.factory_mut().set_object_factory(object_factory))
    }

    pub fn set_observer(&self, observer: Rc<dyn ModuleObserver>) -> Result<()> {
        self.with_provider(|provider| provider.set_observer(observer.clone()))?;
        *self.inner.observer.borrow_mut() = observer;
        Ok(())
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Build one module, registering it if asked. It is not initialized.
    pub fn create_module(
        &self,
        element: &Element,
        type_name: &str,
        options: OptionBag,
        register: bool,
    ) -> Result<ModuleRef> {
        let module = {
            let provider = self.inner.provider.try_borrow().map_err(|_| Error::ManagerBusy)?;
            provider.create_module(element, type_name, options)?
        };
        if register {
            self.register_module(type_name, &module)?;
        }
        Ok(module)
    }

    /// Create, register and initialize every module `element` declares.
    ///
    /// Returns nothing for elements deferred with `data-module-lazyload`
    /// (unless `bypass_lazy`), for sub-module placeholders and when the
    /// media condition does not match.
    pub fn create_modules(&self, element: &Element, bypass_lazy: bool) -> Result<Vec<ModuleRef>> {
        if self.inner.in_pass.replace(true) {
            tracing::warn!(element = %element.describe(), "reentrant create_modules refused");
            return Err(Error::ManagerBusy);
        }
        let _guard = PassGuard(&self.inner.in_pass);

        if !bypass_lazy && has_value(element, LAZYLOAD_ATTRIBUTE) {
            return Ok(Vec::new());
        }
        if has_value(element, PROPERTY_ATTRIBUTE) {
            return Ok(Vec::new());
        }

        let meta = MetaData::parse(element)?;
        if !meta.media_matches(&self.inner.window)? {
            return Ok(Vec::new());
        }

        let modules = {
            let provider = self.inner.provider.try_borrow().map_err(|_| Error::ManagerBusy)?;
            provider.create_modules(&meta, |module, _, type_name, _| {
                self.register_module(type_name, module)?;
                module.init()
            })?
        };

        mark_modules_created(element, &meta);
        Ok(modules)
    }

    /// Create modules for every `data-modules` element beneath `element`,
    /// except deferred ones.
    pub fn eager_load_modules(&self, element: &Element) -> Result<()> {
        for candidate in element.query_selector_all("[data-modules]")? {
            // Sub-modules built earlier in this walk lose the attribute.
            if !candidate.has_attribute(MODULES_ATTRIBUTE) {
                continue;
            }
            self.create_modules(&candidate, false)?;
        }
        Ok(())
    }

    /// Hand the deferred modules beneath `element` to the lazy loader,
    /// creating the loader on first use.
    pub fn lazy_load_modules(&self, element: &Element, options: LazyLoaderOptions) -> Result<()> {
        let existing = self.inner.lazy_loader.borrow_mut().take();
        let mut loader =
            existing.unwrap_or_else(|| LazyLoader::new(self.downgrade(), self.inner.viewport.clone()));
        loader.set_element(element.clone());
        loader.set_options(options);
        let result = loader.init();
        *self.inner.lazy_loader.borrow_mut() = Some(loader);
        result
    }

    pub fn has_lazy_loader(&self) -> bool {
        self.inner.lazy_loader.borrow().is_some()
    }

    pub fn mark_modules_created(&self, element: &Element, meta: &MetaData) {
        mark_modules_created(element, meta);
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    pub fn register_module(&self, type_name: &str, module: &ModuleRef) -> Result<()> {
        let guid = module
            .guid()
            .ok_or_else(|| Error::MissingGuid(type_name.to_string()))?;
        {
            let mut state = self.state_mut()?;
            if state.registry.contains_key(&guid) {
                return Err(Error::AlreadyRegistered(guid));
            }
            state.registry.insert(
                guid.clone(),
                RegistryEntry {
                    module: module.clone(),
                    type_name: type_name.to_string(),
                },
            );
            state
                .groups
                .entry(type_name.to_string())
                .or_default()
                .push(module.clone());
        }
        tracing::trace!(%guid, type_name, "module registered");
        self.observer().on_module_registered(module, type_name);
        Ok(())
    }

    /// Remove `module` from the registry and its group. False if it was
    /// not registered.
    pub fn unregister_module(&self, module: &ModuleRef) -> bool {
        let Some(guid) = module.guid() else {
            return false;
        };
        let removed = {
            let Ok(mut state) = self.state_mut() else {
                return false;
            };
            let Some(entry) = state.registry.shift_remove(&guid) else {
                return false;
            };
            state.groups.get_mut(&entry.type_name).is_some_and(|group| {
                match group.iter().position(|m| m.ptr_eq(module)) {
                    Some(index) => {
                        group.remove(index);
                        true
                    }
                    None => false,
                }
            })
        };
        if removed {
            tracing::trace!(%guid, "module unregistered");
            self.observer().on_module_unregistered(module);
        }
        removed
    }

    pub fn module(&self, guid: &Guid) -> Option<ModuleRef> {
        self.inner
            .state
            .borrow()
            .registry
            .get(guid)
            .map(|entry| entry.module.clone())
    }

    /// Registered modules of `type_name`, in registration order.
    pub fn group(&self, type_name: &str) -> Vec<ModuleRef> {
        self.inner
            .state
            .borrow()
            .groups
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // DEFAULT MODULE
    // =========================================================================

    /// The first designation wins.
    pub fn set_default_module(&self, module: &ModuleRef) {
        if let Ok(mut state) = self.state_mut() {
            if state.default_module.is_none() {
                state.default_module = Some(module.clone());
            }
        }
    }

    pub fn default_module(&self) -> Option<ModuleRef> {
        self.inner.state.borrow().default_module.clone()
    }

    /// Focus the default module, at most once per manager.
    pub fn focus_default_module(&self, anything: bool) {
        let module = {
            let Ok(mut state) = self.state_mut() else {
                return;
            };
            if state.default_module_focused {
                return;
            }
            let Some(module) = state.default_module.clone() else {
                return;
            };
            state.default_module_focused = true;
            module
        };
        module.focus(anything);
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Drop every module reference. With `cascade` each module's
    /// destructor runs (keeping its element) and the provider is torn down.
    pub fn destructor(&self, cascade: bool) {
        if let Some(mut loader) = self.inner.lazy_loader.borrow_mut().take() {
            loader.destructor();
        }

        let entries: Vec<RegistryEntry> = match self.state_mut() {
            Ok(mut state) => {
                state.groups.clear();
                state.default_module = None;
                std::mem::take(&mut state.registry).into_values().collect()
            }
            Err(_) => return,
        };

        let observer = self.observer();
        for entry in entries {
            observer.on_module_unregistered(&entry.module);
            if cascade {
                entry.module.destructor(true);
            }
        }

        if cascade {
            if let Ok(mut provider) = self.inner.provider.try_borrow_mut() {
                provider.destructor(true);
            }
            self.inner.viewport.destructor();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::module::ModuleBase;

    struct Widget {
        base: ModuleBase,
        inits: usize,
        destroyed: bool,
    }

    impl Widget {
        fn new() -> Self {
            Self {
                base: ModuleBase::new(),
                inits: 0,
                destroyed: false,
            }
        }
    }

    impl Module for Widget {
        fn base(&self) -> &ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModuleBase {
            &mut self.base
        }

        fn init(&mut self) -> Result<()> {
            self.inits += 1;
            Ok(())
        }

        fn destructor(&mut self, _keep_element: bool) {
            self.destroyed = true;
        }
    }

    fn manager() -> (Manager, Document) {
        let window = Window::new(800.0, 600.0);
        window.set_media_matcher(|query: &str| query == "screen");
        let document = window.document().clone();
        let manager = Manager::new(window);
        manager.register_type("Widget", Widget::new).unwrap();
        manager.register_type("Other", Widget::new).unwrap();
        (manager, document)
    }

    fn element(doc: &Document, attrs: &[(&str, &str)]) -> Element {
        let el = doc.element(doc.create_element("div"));
        for (name, value) in attrs {
            el.set_attribute(name, value);
        }
        doc.element(doc.body()).append_child(&el);
        el
    }

    #[test]
    fn test_create_modules_marks_element() {
        let (manager, doc) = manager();
        let el = element(&doc, &[("data-modules", "Widget Other")]);

        let modules = manager.create_modules(&el, false).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(el.attribute("data-modules-created").as_deref(), Some("Widget Other"));
        assert!(!el.has_attribute("data-modules"));
        assert!(modules.iter().all(|m| m.with(|w: &mut Widget| w.inits) == Some(1)));
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.group("Widget"), vec![modules[0].clone()]);
    }

    #[test]
    fn test_create_modules_missing_declaration() {
        let (manager, doc) = manager();
        let el = element(&doc, &[("class", "a b"), ("id", "c")]);
        let err = manager.create_modules(&el, false).unwrap_err();
        assert_eq!(err.to_string(), "Missing required attribute data-modules on DIV.a.b#c");
    }

    #[test]
    fn test_create_modules_skips() {
        let (manager, doc) = manager();
        let lazy = element(&doc, &[("data-modules", "Widget"), ("data-module-lazyload", "any")]);
        let property = element(&doc, &[("data-modules", "Widget"), ("data-module-property", "x")]);
        let media = element(&doc, &[("data-modules", "Widget"), ("data-module-media", "print")]);

        assert!(manager.create_modules(&lazy, false).unwrap().is_empty());
        assert!(manager.create_modules(&property, false).unwrap().is_empty());
        assert!(manager.create_modules(&media, false).unwrap().is_empty());
        assert!(media.has_attribute("data-modules"));

        assert_eq!(manager.create_modules(&lazy, true).unwrap().len(), 1);
    }

    #[test]
    fn test_register_twice_and_unregister() {
        let (manager, _) = manager();
        let module = ModuleRef::new("Widget", Widget::new());
        manager.register_module("Widget", &module).unwrap();
        assert!(matches!(
            manager.register_module("Widget", &module),
            Err(Error::AlreadyRegistered(_))
        ));

        assert!(manager.unregister_module(&module));
        assert!(!manager.unregister_module(&module));
        assert!(manager.group("Widget").is_empty());
        assert!(manager.module(&module.guid().unwrap()).is_none());
    }

    #[test]
    fn test_register_without_guid() {
        let (manager, _) = manager();
        let module = ModuleRef::new(
            "Widget",
            Widget {
                base: ModuleBase::anonymous(),
                inits: 0,
                destroyed: false,
            },
        );
        let err = manager.register_module("Widget", &module).unwrap_err();
        assert_eq!(err.to_string(), "Cannot register module Widget without a guid property");
        assert!(!manager.unregister_module(&module));
    }

    #[test]
    fn test_eager_load_is_idempotent() {
        let (manager, doc) = manager();
        element(&doc, &[("data-modules", "Widget")]);
        element(&doc, &[("data-modules", "Other"), ("data-module-lazyload", "any")]);
        let body = doc.element(doc.body());

        manager.eager_load_modules(&body).unwrap();
        manager.eager_load_modules(&body).unwrap();
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.group("Widget").len(), 1);
    }

    #[test]
    fn test_default_module_focused_once() {
        let (manager, doc) = manager();
        let first = element(&doc, &[("data-modules", "Widget"), ("data-module-options", r#"{"defaultModule": true}"#)]);
        let input = doc.element(doc.create_element("input"));
        first.append_child(&input);
        let second = element(&doc, &[("data-modules", "Other"), ("data-module-options", r#"{"defaultModule": true}"#)]);

        let created = manager.create_modules(&first, false).unwrap();
        manager.create_modules(&second, false).unwrap();
        assert_eq!(manager.default_module(), Some(created[0].clone()));

        manager.focus_default_module(false);
        assert!(input.is_focused());

        doc.blur();
        manager.focus_default_module(false);
        assert!(!input.is_focused());
    }

    #[test]
    fn test_destructor_cascade() {
        let (manager, doc) = manager();
        let el = element(&doc, &[("data-modules", "Widget")]);
        let modules = manager.create_modules(&el, false).unwrap();

        manager.destructor(true);
        assert!(manager.is_empty());
        assert_eq!(modules[0].with(|w: &mut Widget| w.destroyed), Some(true));
        assert!(doc.is_connected(el.node()));
    }

    #[test]
    fn test_destructor_without_cascade_keeps_modules_alive() {
        let (manager, doc) = manager();
        let el = element(&doc, &[("data-modules", "Widget")]);
        let modules = manager.create_modules(&el, false).unwrap();

        manager.destructor(false);
        assert!(manager.is_empty());
        assert_eq!(modules[0].with(|w: &mut Widget| w.destroyed), Some(false));
    }

    #[test]
    fn test_reentrant_create_modules_is_refused() {
        struct Nested {
            base: ModuleBase,
            manager: WeakManager,
            outcome: Option<bool>,
        }

        impl Module for Nested {
            fn base(&self) -> &ModuleBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut ModuleBase {
                &mut self.base
            }

            fn init(&mut self) -> Result<()> {
                let manager = self.manager.upgrade().ok_or(Error::MissingArgument("manager"))?;
                let element = self.base.element.clone().ok_or(Error::MissingArgument("element"))?;
                self.outcome = Some(matches!(manager.create_modules(&element, true), Err(Error::ManagerBusy)));
                Ok(())
            }
        }

        let (manager, doc) = manager();
        let weak = manager.downgrade();
        manager
            .register_type("Nested", move || Nested {
                base: ModuleBase::new(),
                manager: weak.clone(),
                outcome: None,
            })
            .unwrap();

        let el = element(&doc, &[("data-modules", "Nested")]);
        let modules = manager.create_modules(&el, false).unwrap();
        assert_eq!(modules[0].with(|n: &mut Nested| n.outcome), Some(Some(true)));
    }
}
