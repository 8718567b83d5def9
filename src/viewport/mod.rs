//! Viewport - Visibility tracking and lazy module creation
//!
//! - BrowserViewport: Geometry, visible-element queries and debounced
//!   `scroll:complete` / `resize:complete` events
//! - LazyLoader: Creates deferred modules as they become visible

mod browser_viewport;
mod lazy_loader;

pub use browser_viewport::*;
pub use lazy_loader::*;
