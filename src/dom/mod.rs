//! DOM - Headless host environment
//!
//! The module core is written against a DOM. This directory provides one:
//! - Document: Arena element tree with attributes, focus and geometry
//! - Element: Node handle bound to its document
//! - Event: Listener registry with bubbling dispatch
//! - Selector: The CSS subset used for discovery
//! - Timers: Virtual-time timer queue for debouncing
//! - Window: Reactive scroll/size state, raw events, media capability
//! - Layout: Taffy bridge that computes offset rectangles

mod document;
mod element;
mod event;
mod layout;
mod selector;
mod timers;
mod window;

pub use document::*;
pub use element::*;
pub use event::{DomEvent, EventListener, ListenerId};
pub use layout::*;
pub use selector::*;
pub use timers::*;
pub use window::*;
