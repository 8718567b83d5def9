//! Events - Declarative action delegation
//!
//! - Actions: Typed action tables, propagation and event→action builders
//! - Delegator: Single native listener per event type, routed to a delegate

mod actions;
mod delegator;

pub use actions::*;
pub use delegator::*;
