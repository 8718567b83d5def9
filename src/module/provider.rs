//! Provider - Builds fully wired modules
//!
//! Resolves an instance through the [`Factory`], tags the element with the
//! module's CSS class, hands over element and options, and recursively
//! builds sub-modules: descendants carrying `data-module-property` become
//! initialized children assigned to the named slot on the parent.

use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::base::ModuleRef;
use super::factory::Factory;
use super::manager::{mark_modules_created, WeakManager};
use super::meta_data::{MetaData, CREATED_ATTRIBUTE, PROPERTY_ATTRIBUTE};
use super::observer::{ModuleObserver, NullObserver};
use crate::config::ManagerOptions;
use crate::dom::Element;
use crate::error::{Error, Result};
use crate::types::{option_flag, OptionBag};

static NAMESPACE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[A-Z]").expect("static pattern"));

/// CSS class derived from a module type: `A.B.FooModule` → `a-b-foo`.
pub fn derive_class_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = NAMESPACE_BOUNDARY.replace_all(chars.as_str(), |caps: &Captures<'_>| {
        format!("-{}", caps[0][1..].to_lowercase())
    });
    let mut name: String = first.to_lowercase().collect();
    name.push_str(rest.strip_suffix("Module").unwrap_or(&*rest));
    name.trim().to_string()
}

pub struct Provider {
    factory: Factory,
    observer: Rc<dyn ModuleObserver>,
    manager: Option<WeakManager>,
    sub_modules_enabled: bool,
    base_class_name: String,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("factory", &self.factory)
            .field("sub_modules_enabled", &self.sub_modules_enabled)
            .field("base_class_name", &self.base_class_name)
            .finish()
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::new(Factory::new())
    }
}

impl Provider {
    pub fn new(factory: Factory) -> Self {
        let options = ManagerOptions::default();
        Self {
            factory,
            observer: Rc::new(NullObserver),
            manager: None,
            sub_modules_enabled: options.sub_modules_enabled,
            base_class_name: options.base_class_name,
        }
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut Factory {
        &mut self.factory
    }

    pub fn set_observer(&mut self, observer: Rc<dyn ModuleObserver>) {
        self.observer = observer;
    }

    /// Manager receiving `defaultModule` designations.
    pub fn set_manager(&mut self, manager: WeakManager) {
        self.manager = Some(manager);
    }

    pub fn set_sub_modules_enabled(&mut self, enabled: bool) {
        self.sub_modules_enabled = enabled;
    }

    pub fn sub_modules_enabled(&self) -> bool {
        self.sub_modules_enabled
    }

    pub fn set_base_class_name(&mut self, base_class_name: &str) {
        self.base_class_name = base_class_name.to_string();
    }

    /// Full class text appended to a module element.
    pub fn create_module_class(&self, type_name: &str) -> String {
        let derived = derive_class_name(type_name);
        if self.base_class_name.is_empty() {
            derived
        } else {
            format!("{} {}", self.base_class_name, derived)
        }
    }

    /// Drop the manager link. With `cascade` the factory is torn down too.
    pub fn destructor(&mut self, cascade: bool) {
        if cascade {
            self.factory.destructor();
        }
        self.manager = None;
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    pub fn create_module(&self, element: &Element, type_name: &str, options: OptionBag) -> Result<ModuleRef> {
        let module = self.factory.get_instance(type_name)?;

        element.add_class(&self.create_module_class(type_name));
        module.set_element(element.clone());
        module.set_options(options.clone());

        if option_flag(&options, "defaultModule") {
            if let Some(manager) = self.manager.as_ref().and_then(WeakManager::upgrade) {
                manager.set_default_module(&module);
            }
        }

        self.observer.on_module_created(&module, element, type_name);

        if self.sub_modules_enabled && !option_flag(&options, "subModulesDisabled") {
            self.create_sub_modules(&module, element)?;
        }

        Ok(module)
    }

    /// One module per declared type, in declaration order. `callback` runs
    /// after each creation; an error stops the pass.
    pub fn create_modules<F>(&self, meta: &MetaData, mut callback: F) -> Result<Vec<ModuleRef>>
    where
        F: FnMut(&ModuleRef, &Element, &str, &OptionBag) -> Result<()>,
    {
        let mut modules = Vec::new();
        let flow = meta.for_each(|element, type_name, options, _| {
            let created = self.create_module(element, type_name, options.clone()).and_then(|module| {
                modules.push(module.clone());
                callback(&module, element, type_name, &options)
            });
            match created {
                Ok(()) => ControlFlow::Continue(()),
                Err(err) => ControlFlow::Break(err),
            }
        });

        match flow {
            ControlFlow::Break(err) => Err(err),
            ControlFlow::Continue(()) => Ok(modules),
        }
    }

    fn create_sub_modules(&self, parent: &ModuleRef, element: &Element) -> Result<()> {
        for descendant in element.descendants() {
            let Some(name) = descendant.attribute(PROPERTY_ATTRIBUTE).filter(|n| !n.is_empty()) else {
                continue;
            };
            // Already built as part of a nested sub-module.
            if descendant.has_attribute(CREATED_ATTRIBUTE) {
                continue;
            }
            self.create_sub_module_property(parent, &name, &descendant)?;
        }
        Ok(())
    }

    fn create_sub_module_property(&self, parent: &ModuleRef, name: &str, element: &Element) -> Result<()> {
        let meta = MetaData::parse(element)?;
        let [type_name] = meta.types() else {
            return Err(Error::SubModuleTypes);
        };

        let sub_module = self.create_module(element, type_name, meta.options_for(0))?;
        self.observer.on_sub_module_created(&sub_module, element, type_name);
        sub_module.init()?;
        parent.assign_sub_module(name, sub_module)?;

        mark_modules_created(element, &meta);
        Ok(())
    }
}
