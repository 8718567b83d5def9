//! Module Observer - Lifecycle notifications
//!
//! Hosts observe creation and registration, e.g. to hand modules to a
//! front controller. Every hook defaults to a no-op.

use super::base::ModuleRef;
use crate::dom::Element;

pub trait ModuleObserver {
    fn on_module_created(&self, _module: &ModuleRef, _element: &Element, _type_name: &str) {}

    fn on_sub_module_created(&self, _module: &ModuleRef, _element: &Element, _type_name: &str) {}

    fn on_module_registered(&self, _module: &ModuleRef, _type_name: &str) {}

    /// Also fired for every registered module when the manager is torn down.
    fn on_module_unregistered(&self, _module: &ModuleRef) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ModuleObserver for NullObserver {}
