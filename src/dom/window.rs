//! Window - Scroll/size state, raw window events and host capabilities
//!
//! Geometry is reactive: scroll offsets and inner size are `Signal`s, so a
//! host can build deriveds or effects over them. `scroll_to` and `resize`
//! update the signals and then fire the raw `scroll` / `resize` window
//! events the viewport debounces.
//!
//! # Example
//!
//! ```ignore
//! let window = Window::new(1024.0, 768.0);
//! window.set_media_matcher(|query: &str| query == "(min-width: 600px)");
//! window.scroll_to(0.0, 400.0);
//! window.timers().advance(Duration::from_millis(300));
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::{signal, Signal};

use super::document::Document;
use super::event::ListenerId;
use super::timers::Timers;
use crate::error::{Error, Result};

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Host media-query evaluator.
pub trait MediaMatcher {
    fn matches(&self, query: &str) -> bool;
}

impl<F> MediaMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, query: &str) -> bool {
        self(query)
    }
}

/// Listener for raw window events. Receives the event type.
pub type WindowListener = Rc<dyn Fn(&str)>;

// =============================================================================
// WINDOW
// =============================================================================

struct WindowInner {
    document: Document,
    timers: Timers,
    media: RefCell<Option<Rc<dyn MediaMatcher>>>,
    scroll_x: Signal<f32>,
    scroll_y: Signal<f32>,
    inner_width: Signal<f32>,
    inner_height: Signal<f32>,
    listeners: RefCell<Vec<(ListenerId, String, WindowListener)>>,
    next_listener_id: Cell<u64>,
}

/// Shared window handle.
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("scroll", &(self.scroll_x(), self.scroll_y()))
            .field("size", &(self.inner_width(), self.inner_height()))
            .finish()
    }
}

impl Window {
    /// New window with a fresh document and timer queue.
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_document(Document::new(), Timers::new(), width, height)
    }

    pub fn with_document(document: Document, timers: Timers, width: f32, height: f32) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                document,
                timers,
                media: RefCell::new(None),
                scroll_x: signal(0.0),
                scroll_y: signal(0.0),
                inner_width: signal(width),
                inner_height: signal(height),
                listeners: RefCell::new(Vec::new()),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn timers(&self) -> &Timers {
        &self.inner.timers
    }

    // =========================================================================
    // MEDIA QUERIES
    // =========================================================================

    pub fn set_media_matcher<M>(&self, matcher: M)
    where
        M: MediaMatcher + 'static,
    {
        *self.inner.media.borrow_mut() = Some(Rc::new(matcher));
    }

    pub fn media_matcher(&self) -> Option<Rc<dyn MediaMatcher>> {
        self.inner.media.borrow().clone()
    }

    /// Evaluate a media query. Fails if the host installed no matcher.
    pub fn match_media(&self, query: &str) -> Result<bool> {
        let matcher = self.media_matcher().ok_or(Error::MediaQueriesUnsupported)?;
        Ok(matcher.matches(query))
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    pub fn scroll_x(&self) -> f32 {
        self.inner.scroll_x.get()
    }

    pub fn scroll_y(&self) -> f32 {
        self.inner.scroll_y.get()
    }

    pub fn inner_width(&self) -> f32 {
        self.inner.inner_width.get()
    }

    pub fn inner_height(&self) -> f32 {
        self.inner.inner_height.get()
    }

    pub fn scroll_y_signal(&self) -> Signal<f32> {
        self.inner.scroll_y.clone()
    }

    pub fn scroll_x_signal(&self) -> Signal<f32> {
        self.inner.scroll_x.clone()
    }

    pub fn inner_width_signal(&self) -> Signal<f32> {
        self.inner.inner_width.clone()
    }

    pub fn inner_height_signal(&self) -> Signal<f32> {
        self.inner.inner_height.clone()
    }

    /// Scroll the page and fire a raw `scroll` event.
    pub fn scroll_to(&self, x: f32, y: f32) {
        self.inner.scroll_x.set(x.max(0.0));
        self.inner.scroll_y.set(y.max(0.0));
        self.dispatch_event("scroll");
    }

    /// Resize the window and fire a raw `resize` event.
    pub fn resize(&self, width: f32, height: f32) {
        self.inner.inner_width.set(width.max(0.0));
        self.inner.inner_height.set(height.max(0.0));
        self.dispatch_event("resize");
    }

    // =========================================================================
    // RAW EVENTS
    // =========================================================================

    pub fn add_event_listener<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(&str) + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.get());
        self.inner.next_listener_id.set(id.0 + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, event_type.to_string(), Rc::new(listener)));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, t, _)| t == event_type)
            .count()
    }

    /// Fire a raw window event at every listener of `event_type`.
    pub fn dispatch_event(&self, event_type: &str) {
        let listeners: Vec<WindowListener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, t, _)| t == event_type)
            .map(|(_, _, l)| l.clone())
            .collect();

        for listener in listeners {
            listener(event_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_updates_signals_and_fires() {
        let window = Window::new(800.0, 600.0);
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        window.add_event_listener("scroll", move |_| f.set(f.get() + 1));

        window.scroll_to(10.0, 250.0);
        assert_eq!(window.scroll_x(), 10.0);
        assert_eq!(window.scroll_y(), 250.0);
        assert_eq!(window.scroll_y_signal().get(), 250.0);
        assert_eq!(fired.get(), 1);

        window.resize(640.0, 480.0);
        assert_eq!(fired.get(), 1);
        assert_eq!(window.inner_width(), 640.0);
    }

    #[test]
    fn test_match_media_requires_matcher() {
        let window = Window::new(800.0, 600.0);
        assert!(matches!(
            window.match_media("(min-width: 600px)"),
            Err(Error::MediaQueriesUnsupported)
        ));

        window.set_media_matcher(|query: &str| query.contains("min-width"));
        assert!(window.match_media("(min-width: 600px)").unwrap());
        assert!(!window.match_media("print").unwrap());
    }

    #[test]
    fn test_remove_listener() {
        let window = Window::new(800.0, 600.0);
        let id = window.add_event_listener("resize", |_| {});
        assert_eq!(window.listener_count("resize"), 1);
        assert!(window.remove_event_listener(id));
        assert_eq!(window.listener_count("resize"), 0);
    }
}
