//! DOM Events - Listener registry and bubbling dispatch
//!
//! Listeners are attached per node and event type. `dispatch_event` walks
//! from the target through its ancestors, invoking the listeners of each
//! node in registration order until one stops propagation.
//!
//! The listener list is snapshotted per node before invocation and no tree
//! borrow is held while a listener runs, so listeners may freely edit the
//! document, add listeners or remove themselves.

use std::rc::Rc;

use super::document::{Document, NodeId};

// =============================================================================
// TYPES
// =============================================================================

/// Handle returned by listener registration, used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// Listener callback for DOM events.
pub type EventListener = Rc<dyn Fn(&mut DomEvent)>;

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) node: NodeId,
    pub(crate) event_type: String,
    pub(crate) callback: EventListener,
}

/// An event travelling through the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    /// Event type, e.g. "click" or "mouseover".
    pub event_type: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Node whose listeners are currently running.
    pub current_target: NodeId,
    propagation_stopped: bool,
    default_prevented: bool,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            current_target: target,
            propagation_stopped: false,
            default_prevented: false,
        }
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    /// Stop propagation and prevent the default action.
    pub fn stop(&mut self) {
        self.stop_propagation();
        self.prevent_default();
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }
}

// =============================================================================
// LISTENER REGISTRY
// =============================================================================

impl Document {
    /// Attach a listener for `event_type` on `node`.
    pub fn add_event_listener<F>(&self, node: NodeId, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(&mut DomEvent) + 'static,
    {
        let mut tree = self.tree.borrow_mut();
        let id = ListenerId(tree.next_listener_id);
        tree.next_listener_id += 1;
        tree.listeners.push(ListenerEntry {
            id,
            node,
            event_type: event_type.to_string(),
            callback: Rc::new(listener),
        });
        id
    }

    /// Remove a listener. Returns false if it was not attached.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let before = tree.listeners.len();
        tree.listeners.retain(|entry| entry.id != id);
        tree.listeners.len() != before
    }

    /// Number of listeners attached to `node` for `event_type`.
    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.tree
            .borrow()
            .listeners
            .iter()
            .filter(|e| e.node == node && e.event_type == event_type)
            .count()
    }

    fn listeners_for(&self, node: NodeId, event_type: &str) -> Vec<(ListenerId, EventListener)> {
        self.tree
            .borrow()
            .listeners
            .iter()
            .filter(|e| e.node == node && e.event_type == event_type)
            .map(|e| (e.id, e.callback.clone()))
            .collect()
    }

    fn is_listener_attached(&self, id: ListenerId) -> bool {
        self.tree.borrow().listeners.iter().any(|e| e.id == id)
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Dispatch a new event of `event_type` at `target` and bubble it.
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> DomEvent {
        let mut event = DomEvent::new(event_type, target);
        self.dispatch(&mut event);
        event
    }

    /// Bubble an existing event from its target upward.
    pub fn dispatch(&self, event: &mut DomEvent) {
        for node in self.ancestors_inclusive(event.target) {
            event.current_target = node;

            for (id, listener) in self.listeners_for(node, &event.event_type) {
                // Removed by an earlier listener in this same pass.
                if !self.is_listener_attached(id) {
                    continue;
                }
                listener(event);
            }

            if event.is_propagation_stopped() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn tree() -> (Document, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("p");
        let button = doc.create_element("button");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);
        doc.append_child(inner, button);
        (doc, outer, inner, button)
    }

    #[test]
    fn test_bubbles_target_to_root() {
        let (doc, outer, inner, button) = tree();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for node in [outer, inner, button] {
            let seen = seen.clone();
            doc.add_event_listener(node, "click", move |event| {
                seen.borrow_mut().push(event.current_target);
            });
        }

        let event = doc.dispatch_event(button, "click");
        assert_eq!(*seen.borrow(), vec![button, inner, outer]);
        assert_eq!(event.target, button);
    }

    #[test]
    fn test_stop_propagation_halts_bubbling() {
        let (doc, outer, inner, button) = tree();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = seen.clone();
        doc.add_event_listener(inner, "click", move |event| {
            s.borrow_mut().push("inner");
            event.stop_propagation();
        });
        let s = seen.clone();
        doc.add_event_listener(outer, "click", move |_| s.borrow_mut().push("outer"));

        let event = doc.dispatch_event(button, "click");
        assert_eq!(*seen.borrow(), vec!["inner"]);
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn test_only_matching_type_runs() {
        let (doc, outer, _, button) = tree();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        doc.add_event_listener(outer, "mouseover", move |_| *c.borrow_mut() += 1);

        doc.dispatch_event(button, "click");
        assert_eq!(*count.borrow(), 0);
        doc.dispatch_event(button, "mouseover");
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_remove_listener() {
        let (doc, outer, _, button) = tree();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = doc.add_event_listener(outer, "click", move |_| *c.borrow_mut() += 1);

        assert!(doc.remove_event_listener(id));
        assert!(!doc.remove_event_listener(id));
        doc.dispatch_event(button, "click");
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_listener_may_mutate_document() {
        let (doc, outer, _, button) = tree();
        let d = doc.clone();
        doc.add_event_listener(outer, "click", move |event| {
            d.set_attribute(event.target, "data-clicked", "yes");
        });

        doc.dispatch_event(button, "click");
        assert_eq!(doc.attribute(button, "data-clicked").as_deref(), Some("yes"));
    }
}
