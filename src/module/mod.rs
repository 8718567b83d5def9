//! Module - Declarative module lifecycle
//!
//! - Base: The `Module` trait, `ModuleRef` handle, guids and sub-module slots
//! - Definition: Per-type options, actions and lifecycle callbacks
//! - MetaData: Parsed `data-modules` declarations
//! - Factory: Type name → instance registry
//! - Provider: Wires instances and builds sub-modules
//! - Manager: Registry, groups, discovery and teardown
//! - Observer: Lifecycle notifications

mod base;
mod definition;
mod factory;
mod manager;
mod meta_data;
mod observer;
mod provider;

pub use base::*;
pub use definition::*;
pub use factory::*;
pub use manager::*;
pub use meta_data::*;
pub use observer::*;
pub use provider::*;
