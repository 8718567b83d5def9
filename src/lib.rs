//! # module-manager
//!
//! Declarative module lifecycle for DOM documents.
//!
//! Behavior ("modules") is attached to elements through markup attributes.
//! The manager discovers `data-modules` declarations, resolves each type
//! through a factory, wires an event delegator to the new instance and
//! keeps a guid-keyed registry of everything it created. Off-screen
//! declarations marked `data-module-lazyload` wait until they scroll into
//! view.
//!
//! ## Architecture
//!
//! ```text
//! Manager.create_modules(element)
//!   → MetaData(element)
//!   → Provider.create_modules(meta)
//!   → Factory.get_instance(type) → Delegator wiring
//!   → Manager.register_module → Module.init
//! ```
//!
//! Everything runs on one thread. Shared state is `Rc<RefCell<_>>`;
//! listeners hold weak handles so nothing keeps itself alive.
//!
//! ## Modules
//!
//! - [`dom`] - Headless document, window, events and virtual-time timers
//! - [`events`] - Action tables and the event delegator
//! - [`module`] - Module trait, metadata, factory, provider and manager
//! - [`viewport`] - Visibility tracking and lazy loading
//! - [`config`] - serde-backed manager and loader options
//! - [`error`] - Error taxonomy
//! - [`types`] - Option bags and truthiness

pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod module;
pub mod types;
pub mod viewport;

// Re-export commonly used items
pub use types::*;

pub use config::{LazyLoaderOptions, ManagerOptions};

pub use error::{Error, Result};

pub use dom::{compute_offsets, Document, DomEvent, Element, NodeId, OffsetRect, Window};

pub use events::{
    ActionEvent, ActionMethod, ActionTable, Delegate, Delegator, Dispatched, EventActions,
    Propagation,
};

pub use module::{
    derive_class_name, Factory, Guid, Manager, MetaData, Module, ModuleBase, ModuleDefinition,
    ModuleObserver, ModuleRef, ObjectFactory, Provider, SubModuleProperty, WeakManager,
};

pub use viewport::{LazyLoader, Position, Triggers, Viewport};
