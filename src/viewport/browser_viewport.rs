//! Viewport - Visible page rectangle and settled scroll/resize events
//!
//! Geometry comes from the window's reactive scroll and size signals. The
//! viewport rectangle is `(scroll_x, scroll_y, inner_width, inner_height)`;
//! elements are placed by accumulating offsets through their offset
//! parents.
//!
//! Two composite events are derived from the raw window events:
//!
//! | Event | Raw event | Default quiet period |
//! |---|---|---|
//! | `scroll:complete` | `scroll` | 300 ms |
//! | `resize:complete` | `resize` | 300 ms |
//!
//! Every raw event cancels the pending timer and schedules a new one, so a
//! burst produces a single notification timed from its last event. On
//! settle the first listener runs at once and each later one
//! `event_listener_delay` after the previous; a listener returning
//! [`Propagation::Stop`] ends the chain.

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::dom::{Element, ListenerId, TimerId, Window};
use crate::error::Result;
use crate::events::Propagation;

pub const SCROLL_COMPLETE: &str = "scroll:complete";
pub const RESIZE_COMPLETE: &str = "resize:complete";

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);
const DEFAULT_LISTENER_DELAY: Duration = Duration::from_millis(20);

/// Listener for a composite viewport event.
pub type ViewportListener = Rc<dyn Fn(&Viewport) -> Propagation>;

// =============================================================================
// GEOMETRY
// =============================================================================

/// A page-space rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Position {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            right: left + width,
            bottom: top + height,
        }
    }

    /// Strict overlap on both axes.
    pub fn overlaps(&self, other: &Position) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

// =============================================================================
// COMPOSITE EVENTS
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Scroll,
    Resize,
}

impl Kind {
    fn from_type(event_type: &str) -> Option<Self> {
        match event_type {
            SCROLL_COMPLETE => Some(Self::Scroll),
            RESIZE_COMPLETE => Some(Self::Resize),
            _ => None,
        }
    }

    fn raw_type(self) -> &'static str {
        match self {
            Self::Scroll => "scroll",
            Self::Resize => "resize",
        }
    }
}

#[derive(Default)]
struct CompositeEvent {
    listeners: Vec<(ListenerId, ViewportListener)>,
    /// Raw window listener, bound while `listeners` is non-empty.
    raw_listener: Option<ListenerId>,
    timer: Option<TimerId>,
    /// Delay before the next listener of a running chain.
    chain_timer: Option<TimerId>,
}

impl CompositeEvent {
    fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(lid, _)| *lid == id)
    }

    fn cancel_timers(&mut self, window: &Window) {
        for timer in [self.timer.take(), self.chain_timer.take()].into_iter().flatten() {
            window.timers().clear_timeout(timer);
        }
    }
}

struct ViewportInner {
    window: Window,
    scroll: RefCell<CompositeEvent>,
    resize: RefCell<CompositeEvent>,
    scroll_timeout: Cell<Duration>,
    resize_timeout: Cell<Duration>,
    event_listener_delay: Cell<Duration>,
    next_listener_id: Cell<u64>,
}

impl ViewportInner {
    fn event(&self, kind: Kind) -> &RefCell<CompositeEvent> {
        match kind {
            Kind::Scroll => &self.scroll,
            Kind::Resize => &self.resize,
        }
    }

    fn timeout(&self, kind: Kind) -> Duration {
        match kind {
            Kind::Scroll => self.scroll_timeout.get(),
            Kind::Resize => self.resize_timeout.get(),
        }
    }
}

/// Shared viewport handle.
#[derive(Clone)]
pub struct Viewport {
    inner: Rc<ViewportInner>,
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport").field("position", &self.position()).finish()
    }
}

/// Re-arm the debounce timer for `kind`.
fn handle_raw_event(weak: &Weak<ViewportInner>, kind: Kind) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let timers = inner.window.timers().clone();
    let mut event = inner.event(kind).borrow_mut();
    if let Some(timer) = event.timer.take() {
        timers.clear_timeout(timer);
    }
    let weak = weak.clone();
    event.timer = Some(timers.set_timeout(inner.timeout(kind), move || fire(&weak, kind)));
}

type Chain = Rc<Vec<(ListenerId, ViewportListener)>>;

fn fire(weak: &Weak<ViewportInner>, kind: Kind) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let listeners: Chain = {
        let mut event = inner.event(kind).borrow_mut();
        event.timer = None;
        // A new settle supersedes the rest of an older chain.
        if let Some(timer) = event.chain_timer.take() {
            inner.window.timers().clear_timeout(timer);
        }
        Rc::new(event.listeners.clone())
    };
    if listeners.is_empty() {
        return;
    }
    tracing::trace!(event = ?kind, listeners = listeners.len(), "viewport settled");
    run_chain(weak.clone(), kind, listeners, 0);
}

fn run_chain(weak: Weak<ViewportInner>, kind: Kind, listeners: Chain, index: usize) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let Some((id, listener)) = listeners.get(index).cloned() else {
        return;
    };
    {
        let mut event = inner.event(kind).borrow_mut();
        event.chain_timer = None;
        // Unsubscribed since the chain started.
        if !event.is_subscribed(id) {
            drop(event);
            return run_chain(weak, kind, listeners, index + 1);
        }
    }

    let viewport = Viewport { inner };
    if listener(&viewport) == Propagation::Stop {
        return;
    }
    if index + 1 >= listeners.len() {
        return;
    }
    let mut event = viewport.inner.event(kind).borrow_mut();
    if event.listeners.is_empty() {
        return;
    }
    let delay = viewport.inner.event_listener_delay.get();
    event.chain_timer = Some(
        viewport
            .inner
            .window
            .timers()
            .set_timeout(delay, move || run_chain(weak, kind, listeners, index + 1)),
    );
}

impl Viewport {
    pub fn new(window: Window) -> Self {
        Self {
            inner: Rc::new(ViewportInner {
                window,
                scroll: RefCell::new(CompositeEvent::default()),
                resize: RefCell::new(CompositeEvent::default()),
                scroll_timeout: Cell::new(DEFAULT_TIMEOUT),
                resize_timeout: Cell::new(DEFAULT_TIMEOUT),
                event_listener_delay: Cell::new(DEFAULT_LISTENER_DELAY),
                next_listener_id: Cell::new(0),
            }),
        }
    }

    pub fn window(&self) -> &Window {
        &self.inner.window
    }

    // =========================================================================
    // GEOMETRY
    // =========================================================================

    pub fn left(&self) -> f32 {
        self.inner.window.scroll_x()
    }

    pub fn top(&self) -> f32 {
        self.inner.window.scroll_y()
    }

    pub fn width(&self) -> f32 {
        self.inner.window.inner_width()
    }

    pub fn height(&self) -> f32 {
        self.inner.window.inner_height()
    }

    pub fn right(&self) -> f32 {
        self.left() + self.width()
    }

    pub fn bottom(&self) -> f32 {
        self.top() + self.height()
    }

    pub fn position(&self) -> Position {
        Position::new(self.left(), self.top(), self.width(), self.height())
    }

    /// Page position of `element`, summing offsets up the offset-parent chain.
    pub fn element_position(&self, element: &Element) -> Position {
        let rect = element.offset();
        let (mut left, mut top) = (rect.left, rect.top);
        let mut parent = element.offset_parent();
        while let Some(p) = parent {
            let offset = p.offset();
            left += offset.left;
            top += offset.top;
            parent = p.offset_parent();
        }
        Position::new(left, top, rect.width, rect.height)
    }

    /// True if any part of `element` is inside the viewport.
    pub fn contains(&self, element: &Element) -> bool {
        self.element_position(element).overlaps(&self.position())
    }

    /// Visible matches of `selector` under the body. `callback` sees each
    /// one with its index among all matches until it breaks; matching
    /// carries on regardless.
    pub fn query_selector_all<F>(&self, selector: &str, mut callback: F) -> Result<Vec<Element>>
    where
        F: FnMut(&Element, usize) -> ControlFlow<()>,
    {
        let document = self.inner.window.document();
        let body = document.element(document.body());
        let mut visible = Vec::new();
        let mut calling = true;

        for (index, element) in body.query_selector_all(selector)?.into_iter().enumerate() {
            if !self.contains(&element) {
                continue;
            }
            if calling && callback(&element, index).is_break() {
                calling = false;
            }
            visible.push(element);
        }
        Ok(visible)
    }

    /// First visible match of `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let mut first = None;
        self.query_selector_all(selector, |element, _| {
            first = Some(element.clone());
            ControlFlow::Break(())
        })?;
        Ok(first)
    }

    /// Media query result, false when the host has no media support.
    pub fn match_media(&self, query: &str) -> bool {
        self.inner.window.match_media(query).unwrap_or(false)
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    pub fn scroll_timeout(&self) -> Duration {
        self.inner.scroll_timeout.get()
    }

    pub fn set_scroll_timeout(&self, timeout: Duration) {
        self.inner.scroll_timeout.set(timeout);
    }

    pub fn resize_timeout(&self) -> Duration {
        self.inner.resize_timeout.get()
    }

    pub fn set_resize_timeout(&self, timeout: Duration) {
        self.inner.resize_timeout.set(timeout);
    }

    pub fn event_listener_delay(&self) -> Duration {
        self.inner.event_listener_delay.get()
    }

    pub fn set_event_listener_delay(&self, delay: Duration) {
        self.inner.event_listener_delay.set(delay);
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    /// Subscribe to `scroll:complete` or `resize:complete`. Other types
    /// are ignored and yield `None`.
    pub fn add_event_listener<F>(&self, event_type: &str, listener: F) -> Option<ListenerId>
    where
        F: Fn(&Viewport) -> Propagation + 'static,
    {
        let kind = Kind::from_type(&event_type.to_lowercase())?;
        let id = ListenerId(self.inner.next_listener_id.get());
        self.inner.next_listener_id.set(id.0 + 1);

        let mut event = self.inner.event(kind).borrow_mut();
        if event.raw_listener.is_none() {
            let weak = Rc::downgrade(&self.inner);
            event.raw_listener = Some(
                self.inner
                    .window
                    .add_event_listener(kind.raw_type(), move |_| handle_raw_event(&weak, kind)),
            );
        }
        event.listeners.push((id, Rc::new(listener)));
        Some(id)
    }

    /// Unsubscribe. The raw window listener goes with the last subscriber.
    pub fn remove_event_listener(&self, event_type: &str, id: ListenerId) -> bool {
        let Some(kind) = Kind::from_type(&event_type.to_lowercase()) else {
            return false;
        };
        let mut event = self.inner.event(kind).borrow_mut();
        let before = event.listeners.len();
        event.listeners.retain(|(lid, _)| *lid != id);
        let removed = event.listeners.len() != before;

        if removed && event.listeners.is_empty() {
            event.cancel_timers(&self.inner.window);
            if let Some(raw) = event.raw_listener.take() {
                self.inner.window.remove_event_listener(raw);
            }
        }
        removed
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        Kind::from_type(&event_type.to_lowercase())
            .map(|kind| self.inner.event(kind).borrow().listeners.len())
            .unwrap_or(0)
    }

    /// Cancel pending timers and unbind the raw listeners.
    pub fn destructor(&self) {
        for kind in [Kind::Scroll, Kind::Resize] {
            let mut event = self.inner.event(kind).borrow_mut();
            event.cancel_timers(&self.inner.window);
            if let Some(raw) = event.raw_listener.take() {
                self.inner.window.remove_event_listener(raw);
            }
            event.listeners.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::OffsetRect;

    fn viewport() -> (Window, Viewport) {
        let window = Window::new(800.0, 600.0);
        let viewport = Viewport::new(window.clone());
        (window, viewport)
    }

    fn counter(viewport: &Viewport, event_type: &str) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        viewport.add_event_listener(event_type, move |_| {
            c.set(c.get() + 1);
            Propagation::Continue
        });
        count
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_geometry_follows_window() {
        let (window, viewport) = viewport();
        window.scroll_to(10.0, 200.0);
        assert_eq!(viewport.position(), Position::new(10.0, 200.0, 800.0, 600.0));
        assert_eq!(viewport.right(), 810.0);
        assert_eq!(viewport.bottom(), 800.0);
    }

    #[test]
    fn test_contains_uses_strict_overlap() {
        let (window, viewport) = viewport();
        let doc = window.document();
        let wrapper = doc.element(doc.create_element("div"));
        let el = doc.element(doc.create_element("div"));
        doc.element(doc.body()).append_child(&wrapper);
        wrapper.append_child(&el);

        wrapper.set_offset(OffsetRect::new(0.0, 500.0, 800.0, 400.0));
        el.set_offset(OffsetRect::new(0.0, 100.0, 100.0, 50.0));
        assert_eq!(viewport.element_position(&el), Position::new(0.0, 600.0, 100.0, 50.0));
        // Touching the bottom edge is not overlapping.
        assert!(!viewport.contains(&el));

        window.scroll_to(0.0, 1.0);
        assert!(viewport.contains(&el));
        window.scroll_to(0.0, 650.0);
        assert!(!viewport.contains(&el));
    }

    #[test]
    fn test_scroll_burst_settles_once() {
        let (window, viewport) = viewport();
        let count = counter(&viewport, "scroll:complete");

        for y in 0..5 {
            window.scroll_to(0.0, y as f32 * 10.0);
            window.timers().advance(ms(100));
        }
        assert_eq!(count.get(), 0);

        window.timers().advance(ms(199));
        assert_eq!(count.get(), 0);
        window.timers().advance(ms(1));
        assert_eq!(count.get(), 1);

        window.timers().advance(ms(1000));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_chain_delay_and_stop() {
        let (window, viewport) = viewport();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, result) in [("a", Propagation::Continue), ("b", Propagation::Stop), ("c", Propagation::Continue)] {
            let o = order.clone();
            viewport.add_event_listener("RESIZE:COMPLETE", move |_| {
                o.borrow_mut().push(name);
                result
            });
        }

        window.resize(1024.0, 768.0);
        window.timers().advance(ms(300));
        assert_eq!(*order.borrow(), vec!["a"]);
        window.timers().advance(ms(20));
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        window.timers().advance(ms(100));
        assert_eq!(*order.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_pending_chain_honors_unsubscribe_and_destructor() {
        let (window, viewport) = viewport();
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut ids = Vec::new();
        for name in ["a", "b", "c"] {
            let o = order.clone();
            ids.push(
                viewport
                    .add_event_listener(RESIZE_COMPLETE, move |_| {
                        o.borrow_mut().push(name);
                        Propagation::Continue
                    })
                    .unwrap(),
            );
        }

        window.resize(1024.0, 768.0);
        window.timers().advance(ms(300));
        assert_eq!(*order.borrow(), vec!["a"]);

        // `b` is dropped from the running chain; `c` takes its slot.
        assert!(viewport.remove_event_listener(RESIZE_COMPLETE, ids[1]));
        window.timers().advance(ms(20));
        assert_eq!(*order.borrow(), vec!["a", "c"]);

        order.borrow_mut().clear();
        window.resize(800.0, 600.0);
        window.timers().advance(ms(300));
        assert_eq!(*order.borrow(), vec!["a"]);

        viewport.destructor();
        window.timers().advance(ms(1000));
        assert_eq!(*order.borrow(), vec!["a"]);
    }

    #[test]
    fn test_raw_listener_bound_while_subscribed() {
        let (window, viewport) = viewport();
        assert_eq!(window.listener_count("scroll"), 0);
        assert!(viewport.add_event_listener("orientation:change", |_| Propagation::Continue).is_none());

        let a = viewport.add_event_listener(SCROLL_COMPLETE, |_| Propagation::Continue).unwrap();
        let b = viewport.add_event_listener(SCROLL_COMPLETE, |_| Propagation::Continue).unwrap();
        assert_eq!(window.listener_count("scroll"), 1);

        assert!(viewport.remove_event_listener(SCROLL_COMPLETE, a));
        assert_eq!(window.listener_count("scroll"), 1);
        assert!(viewport.remove_event_listener(SCROLL_COMPLETE, b));
        assert_eq!(window.listener_count("scroll"), 0);
        assert!(!viewport.remove_event_listener(SCROLL_COMPLETE, b));
    }

    #[test]
    fn test_custom_timeout_and_destructor() {
        let (window, viewport) = viewport();
        viewport.set_scroll_timeout(ms(50));
        let count = counter(&viewport, SCROLL_COMPLETE);

        window.scroll_to(0.0, 10.0);
        window.timers().advance(ms(50));
        assert_eq!(count.get(), 1);

        window.scroll_to(0.0, 20.0);
        viewport.destructor();
        window.timers().advance(ms(1000));
        assert_eq!(count.get(), 1);
        assert_eq!(window.listener_count("scroll"), 0);
    }

    #[test]
    fn test_query_selector_all_filters_and_breaks() {
        let (window, viewport) = viewport();
        let doc = window.document();
        let body = doc.element(doc.body());
        let mut els = Vec::new();
        for top in [0.0, 700.0, 100.0, 200.0] {
            let el = doc.element(doc.create_element("div"));
            el.set_attribute("data-module-lazyload", "any");
            el.set_offset(OffsetRect::new(0.0, top, 100.0, 50.0));
            body.append_child(&el);
            els.push(el);
        }

        let mut seen = Vec::new();
        let visible = viewport
            .query_selector_all("[data-module-lazyload]", |_, index| {
                seen.push(index);
                if index == 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
            })
            .unwrap();

        assert_eq!(seen, vec![0, 2]);
        assert_eq!(visible, vec![els[0].clone(), els[2].clone(), els[3].clone()]);
        assert_eq!(viewport.query_selector("[data-module-lazyload]").unwrap(), Some(els[0].clone()));
    }
}
