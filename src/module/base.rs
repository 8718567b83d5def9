//! Module Base - The module trait and its type-erased handle
//!
//! A module is any type implementing [`Module`]. The manager never sees the
//! concrete type: it holds a [`ModuleRef`], a shared handle over a cell
//! that owns the module, its flattened [`ModuleDefinition`] and the
//! delegator routing DOM events to the definition's action table.
//!
//! # Lifecycle
//!
//! ```text
//! Factory::get_instance → set_element → set_options → (sub-modules)
//!     → ModuleRef::init → ... → ModuleRef::destructor
//! ```
//!
//! `ModuleRef::init` binds the delegator, runs the `before_ready`
//! callbacks, then `Module::init`, then the `after_ready` callbacks.
//!
//! # Example
//!
//! ```ignore
//! struct Counter { base: ModuleBase, clicks: usize }
//!
//! impl Module for Counter {
//!     fn base(&self) -> &ModuleBase { &self.base }
//!     fn base_mut(&mut self) -> &mut ModuleBase { &mut self.base }
//!
//!     fn definition() -> ModuleDefinition<Self> {
//!         ModuleDefinition::new().action("click", "increment", |c, _| {
//!             c.clicks += 1;
//!             Propagation::Continue
//!         })
//!     }
//! }
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use uuid::Uuid;

use super::definition::ModuleDefinition;
use crate::dom::{focus_first_field, Element};
use crate::error::{Error, Result};
use crate::events::{ActionEvent, Delegate, Delegator, Dispatched};
use crate::types::{merge_options, OptionBag};

// =============================================================================
// GUID
// =============================================================================

/// Registry key of a module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(String);

impl Guid {
    /// A fresh random (v4) guid.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Guid {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// MODULE TRAIT
// =============================================================================

/// Common module state: guid, element and merged options.
#[derive(Debug, Clone)]
pub struct ModuleBase {
    pub guid: Option<Guid>,
    pub element: Option<Element>,
    pub options: OptionBag,
}

impl Default for ModuleBase {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleBase {
    pub fn new() -> Self {
        Self::with_guid(Guid::generate())
    }

    pub fn with_guid(guid: impl Into<Guid>) -> Self {
        Self {
            guid: Some(guid.into()),
            element: None,
            options: OptionBag::new(),
        }
    }

    /// A base without a guid. Such modules cannot be registered.
    pub fn anonymous() -> Self {
        Self {
            guid: None,
            element: None,
            options: OptionBag::new(),
        }
    }
}

/// Behaviour attached to an element.
pub trait Module: 'static {
    fn base(&self) -> &ModuleBase;

    fn base_mut(&mut self) -> &mut ModuleBase;

    fn guid(&self) -> Option<Guid> {
        self.base().guid.clone()
    }

    fn element(&self) -> Option<&Element> {
        self.base().element.as_ref()
    }

    fn set_element(&mut self, element: Element) {
        self.base_mut().element = Some(element);
    }

    /// Receives the definition defaults already merged with the overrides.
    fn set_options(&mut self, options: OptionBag) {
        self.base_mut().options = options;
    }

    /// Runs between the `before_ready` and `after_ready` callbacks.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Focus the first form field, or with `anything` the first focusable
    /// element.
    fn focus(&mut self, anything: bool) {
        if let Some(element) = self.element() {
            focus_first_field(element, anything);
        }
    }

    fn destructor(&mut self, _keep_element: bool) {}

    /// The named sub-module slot, `None` if the module has no such slot.
    fn sub_module_property(&mut self, _name: &str) -> Option<&mut SubModuleProperty> {
        None
    }

    /// Declarative options, actions and callbacks for this type.
    fn definition() -> ModuleDefinition<Self>
    where
        Self: Sized,
    {
        ModuleDefinition::new()
    }
}

// =============================================================================
// SUB-MODULE PROPERTIES
// =============================================================================

/// A slot on a parent module receiving sub-modules.
#[derive(Clone, Debug, PartialEq)]
pub enum SubModuleProperty {
    /// Accepts exactly one sub-module.
    Single(Option<ModuleRef>),
    /// Accumulates sub-modules in document order.
    Many(Vec<ModuleRef>),
}

impl SubModuleProperty {
    pub fn single() -> Self {
        Self::Single(None)
    }

    pub fn many() -> Self {
        Self::Many(Vec::new())
    }

    pub fn assign(&mut self, name: &str, module: ModuleRef) -> Result<()> {
        match self {
            Self::Single(slot @ None) => {
                *slot = Some(module);
                Ok(())
            }
            Self::Single(Some(_)) => Err(Error::SubModulePropertyExists(name.to_string())),
            Self::Many(list) => {
                list.push(module);
                Ok(())
            }
        }
    }

    pub fn modules(&self) -> Vec<ModuleRef> {
        match self {
            Self::Single(slot) => slot.iter().cloned().collect(),
            Self::Many(list) => list.clone(),
        }
    }

    pub fn first(&self) -> Option<&ModuleRef> {
        match self {
            Self::Single(slot) => slot.as_ref(),
            Self::Many(list) => list.first(),
        }
    }
}

// =============================================================================
// TYPE-ERASED CELL
// =============================================================================

pub(crate) trait AnyModule {
    fn type_name(&self) -> &str;
    fn guid(&self) -> Option<Guid>;
    fn element(&self) -> Option<Element>;
    fn set_element(&self, element: Element);
    fn set_options(&self, overrides: OptionBag);
    fn init(&self) -> Result<()>;
    fn focus(&self, anything: bool);
    fn destructor(&self, keep_element: bool);
    fn assign_sub_module(&self, name: &str, module: ModuleRef) -> Result<()>;
    fn is_initialized(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
}

struct ModuleCell<M: Module> {
    this: Weak<ModuleCell<M>>,
    type_name: String,
    module: RefCell<M>,
    definition: Rc<ModuleDefinition<M>>,
    element: RefCell<Option<Element>>,
    action_prefix: RefCell<Option<String>>,
    delegator: RefCell<Option<Delegator>>,
}

impl<M: Module> ModuleCell<M> {
    fn busy(&self) -> Error {
        tracing::warn!(module = %self.type_name, "module already borrowed");
        Error::ModuleBusy(self.type_name.clone())
    }

    fn bind_delegator(&self) -> Result<()> {
        let element = self
            .element
            .borrow()
            .clone()
            .ok_or(Error::MissingArgument("element"))?;

        let mut delegator = Delegator::new(element.document().clone());
        delegator.set_node(element.node());
        delegator.set_delegate(Rc::new(ModuleDelegate {
            cell: self.this.clone(),
        }));
        if let Some(prefix) = self.action_prefix.borrow().as_deref() {
            delegator.set_action_prefix(prefix);
        }
        delegator.init()?;

        let actions = self.definition.actions();
        if !actions.is_empty() {
            delegator.set_event_action_mapping(actions.map().clone());
        }
        for event_type in self.definition.event_types() {
            delegator.add_event_type(event_type);
        }

        // Replacing an earlier delegator detaches its listeners on drop.
        *self.delegator.borrow_mut() = Some(delegator);
        Ok(())
    }
}

impl<M: Module> AnyModule for ModuleCell<M> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn guid(&self) -> Option<Guid> {
        self.module.try_borrow().ok().and_then(|m| m.guid())
    }

    fn element(&self) -> Option<Element> {
        self.element.borrow().clone()
    }

    fn set_element(&self, element: Element) {
        *self.element.borrow_mut() = Some(element.clone());
        if let Ok(mut module) = self.module.try_borrow_mut() {
            module.set_element(element);
        }
    }

    fn set_options(&self, overrides: OptionBag) {
        let merged = merge_options(self.definition.default_options(), &overrides);
        *self.action_prefix.borrow_mut() = merged
            .get("actionPrefix")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if let Ok(mut module) = self.module.try_borrow_mut() {
            module.set_options(merged);
        }
    }

    fn init(&self) -> Result<()> {
        self.bind_delegator()?;

        let mut module = self.module.try_borrow_mut().map_err(|_| self.busy())?;
        self.definition.run_before_ready(&mut *module);
        module.init()?;
        self.definition.run_after_ready(&mut *module);
        Ok(())
    }

    fn focus(&self, anything: bool) {
        match self.module.try_borrow_mut() {
            Ok(mut module) => module.focus(anything),
            Err(_) => {
                tracing::warn!(module = %self.type_name, "module already borrowed; focus skipped");
            }
        }
    }

    fn destructor(&self, keep_element: bool) {
        if let Some(mut delegator) = self.delegator.borrow_mut().take() {
            delegator.destructor();
        }
        if let Ok(mut module) = self.module.try_borrow_mut() {
            module.destructor(keep_element);
        }
        if !keep_element {
            if let Some(element) = self.element.borrow_mut().take() {
                element.remove();
            }
        }
    }

    fn assign_sub_module(&self, name: &str, sub_module: ModuleRef) -> Result<()> {
        let mut module = self.module.try_borrow_mut().map_err(|_| self.busy())?;
        module
            .sub_module_property(name)
            .ok_or_else(|| Error::IllegalSubModuleProperty(name.to_string()))?
            .assign(name, sub_module)
    }

    fn is_initialized(&self) -> bool {
        self.delegator.borrow().is_some()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Routes delegated actions into the cell's action table.
struct ModuleDelegate<M: Module> {
    cell: Weak<ModuleCell<M>>,
}

impl<M: Module> Delegate for ModuleDelegate<M> {
    fn dispatch(&self, method: &str, action: &ActionEvent<'_>) -> Dispatched {
        let Some(cell) = self.cell.upgrade() else {
            return Dispatched::Unhandled;
        };
        let Ok(mut module) = cell.module.try_borrow_mut() else {
            tracing::warn!(module = %cell.type_name, method, "action dropped, module busy");
            return Dispatched::Unhandled;
        };
        cell.definition.table().invoke(&mut *module, method, action)
    }
}

// =============================================================================
// MODULE REF
// =============================================================================

/// Shared, type-erased module handle. Equality is identity.
#[derive(Clone)]
pub struct ModuleRef(Rc<dyn AnyModule>);

impl ModuleRef {
    /// Wrap `module`, flattening `M::definition()` now.
    pub fn new<M: Module>(type_name: &str, module: M) -> Self {
        Self::with_definition(type_name, module, Rc::new(M::definition()))
    }

    /// Wrap `module` with an already flattened definition.
    pub fn with_definition<M: Module>(
        type_name: &str,
        module: M,
        definition: Rc<ModuleDefinition<M>>,
    ) -> Self {
        let cell = Rc::new_cyclic(|this| ModuleCell {
            this: this.clone(),
            type_name: type_name.to_string(),
            module: RefCell::new(module),
            definition,
            element: RefCell::new(None),
            action_prefix: RefCell::new(None),
            delegator: RefCell::new(None),
        });
        Self(cell)
    }

    pub fn type_name(&self) -> &str {
        self.0.type_name()
    }

    pub fn guid(&self) -> Option<Guid> {
        self.0.guid()
    }

    pub fn element(&self) -> Option<Element> {
        self.0.element()
    }

    pub fn set_element(&self, element: Element) {
        self.0.set_element(element);
    }

    /// Merge `overrides` over the definition defaults and hand them over.
    pub fn set_options(&self, overrides: OptionBag) {
        self.0.set_options(overrides);
    }

    pub fn init(&self) -> Result<()> {
        self.0.init()
    }

    pub fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }

    pub fn focus(&self, anything: bool) {
        self.0.focus(anything);
    }

    /// Unbind the delegator and tear the module down. Without
    /// `keep_element` the element is also removed from the document.
    pub fn destructor(&self, keep_element: bool) {
        self.0.destructor(keep_element);
    }

    pub(crate) fn assign_sub_module(&self, name: &str, module: ModuleRef) -> Result<()> {
        self.0.assign_sub_module(name, module)
    }

    /// Typed access to the module, `None` if it is not an `M` or is busy.
    pub fn with<M: Module, R>(&self, f: impl FnOnce(&mut M) -> R) -> Option<R> {
        let cell = self.0.as_any().downcast_ref::<ModuleCell<M>>()?;
        let mut module = cell.module.try_borrow_mut().ok()?;
        Some(f(&mut *module))
    }

    pub fn is<M: Module>(&self) -> bool {
        self.0.as_any().is::<ModuleCell<M>>()
    }

    pub fn ptr_eq(&self, other: &ModuleRef) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl PartialEq for ModuleRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRef")
            .field("type", &self.type_name())
            .field("guid", &self.guid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::events::Propagation;
    use serde_json::json;

    struct Counter {
        base: ModuleBase,
        clicks: usize,
        log: Vec<&'static str>,
        items: SubModuleProperty,
    }

    impl Counter {
        fn new() -> Self {
            Self {
                base: ModuleBase::with_guid("counter"),
                clicks: 0,
                log: Vec::new(),
                items: SubModuleProperty::many(),
            }
        }
    }

    fn before(c: &mut Counter) -> bool {
        c.log.push("before");
        true
    }

    fn after(c: &mut Counter) -> bool {
        c.log.push("after");
        true
    }

    impl Module for Counter {
        fn base(&self) -> &ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModuleBase {
            &mut self.base
        }

        fn init(&mut self) -> Result<()> {
            self.log.push("init");
            Ok(())
        }

        fn sub_module_property(&mut self, name: &str) -> Option<&mut SubModuleProperty> {
            (name == "items").then_some(&mut self.items)
        }

        fn definition() -> ModuleDefinition<Self> {
            ModuleDefinition::new()
                .option("step", json!(1))
                .action("click", "increment", |c: &mut Counter, _| {
                    c.clicks += 1;
                    Propagation::Continue
                })
                .before_ready(before)
                .after_ready(after)
        }
    }

    fn mounted() -> (Document, Element, ModuleRef) {
        let doc = Document::new();
        let element = doc.element(doc.create_element("div"));
        doc.append_child(doc.body(), element.node());
        let module = ModuleRef::new("Counter", Counter::new());
        module.set_element(element.clone());
        module.set_options(OptionBag::new());
        (doc, element, module)
    }

    #[test]
    fn test_guid_generate_is_unique() {
        assert_ne!(Guid::generate(), Guid::generate());
        assert_eq!(Guid::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_init_order_and_options() {
        let (_, _, module) = mounted();
        module.init().unwrap();
        assert!(module.is_initialized());

        let (log, step) = module
            .with(|c: &mut Counter| (c.log.clone(), c.base.options["step"].clone()))
            .unwrap();
        assert_eq!(log, vec!["before", "init", "after"]);
        assert_eq!(step, json!(1));
    }

    #[test]
    fn test_actions_reach_module() {
        let (doc, element, module) = mounted();
        let button = doc.create_element("button");
        doc.set_attribute(button, "data-action", "increment");
        doc.append_child(element.node(), button);
        module.init().unwrap();

        doc.dispatch_event(button, "click");
        doc.dispatch_event(button, "click");
        assert_eq!(module.with(|c: &mut Counter| c.clicks), Some(2));
    }

    #[test]
    fn test_action_prefix_from_options() {
        let (doc, element, module) = mounted();
        let mut options = OptionBag::new();
        options.insert("actionPrefix".into(), json!("counter"));
        module.set_options(options);

        let button = doc.create_element("button");
        doc.append_child(element.node(), button);
        module.init().unwrap();

        doc.set_attribute(button, "data-action", "increment");
        doc.dispatch_event(button, "click");
        doc.set_attribute(button, "data-action", "counter.increment");
        doc.dispatch_event(button, "click");
        assert_eq!(module.with(|c: &mut Counter| c.clicks), Some(1));
    }

    #[test]
    fn test_destructor_removes_element_unless_kept() {
        let (doc, element, module) = mounted();
        module.init().unwrap();
        module.destructor(true);
        assert!(doc.is_connected(element.node()));
        assert!(!module.is_initialized());

        let (doc, element, module) = mounted();
        module.init().unwrap();
        module.destructor(false);
        assert!(!doc.is_connected(element.node()));
    }

    #[test]
    fn test_focus_while_borrowed_is_skipped() {
        let (doc, element, module) = mounted();
        let input = doc.element(doc.create_element("input"));
        element.append_child(&input);
        module.init().unwrap();

        let handle = module.clone();
        module.with(|_: &mut Counter| handle.focus(false)).unwrap();
        assert!(!input.is_focused());

        module.focus(false);
        assert!(input.is_focused());
    }

    #[test]
    fn test_sub_module_property_assignment() {
        let mut single = SubModuleProperty::single();
        let a = ModuleRef::new("Counter", Counter::new());
        let b = ModuleRef::new("Counter", Counter::new());
        single.assign("child", a.clone()).unwrap();
        assert!(matches!(
            single.assign("child", b.clone()),
            Err(Error::SubModulePropertyExists(_))
        ));
        assert_eq!(single.first(), Some(&a));

        let parent = ModuleRef::new("Counter", Counter::new());
        parent.assign_sub_module("items", a.clone()).unwrap();
        parent.assign_sub_module("items", b.clone()).unwrap();
        assert!(matches!(
            parent.assign_sub_module("missing", a.clone()),
            Err(Error::IllegalSubModuleProperty(_))
        ));
        assert_eq!(parent.with(|c: &mut Counter| c.items.modules()), Some(vec![a, b]));
    }

    #[test]
    fn test_ref_identity_and_downcast() {
        let a = ModuleRef::new("Counter", Counter::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, ModuleRef::new("Counter", Counter::new()));
        assert!(a.is::<Counter>());
    }
}
