//! Delegator - One native listener per event type, routed to named actions
//!
//! A delegator is bound to a container node and a [`Delegate`]. For each
//! event type it needs it attaches exactly one listener to the container.
//! When an event fires, the listener walks from the event target up to the
//! container and resolves an action on every element it passes:
//!
//! - `data-action-<type>` wins over the generic `data-action`
//! - with an action prefix, only `prefix + method` matches
//! - with an event→action mapping, the method must be listed for the type
//! - the delegate's method runs if it has one, else its fallback
//!
//! A method returning [`Propagation::Stop`] ends the walk and stops the DOM
//! event, so delegators on ancestor containers never see it.
//!
//! # Example
//!
//! ```ignore
//! let mut delegator = Delegator::new(document.clone());
//! delegator.set_node(form);
//! delegator.set_delegate(delegate);
//! delegator.init()?;
//! delegator.set_action_prefix("blogPost");
//! delegator.add_event_type("click");
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::actions::{ActionEvent, Delegate, Dispatched, EventActionMap, Propagation};
use crate::dom::{Document, DomEvent, ListenerId, NodeId, WeakDocument};
use crate::error::{Error, Result};
use crate::types::OptionBag;

// =============================================================================
// SHARED STATE
// =============================================================================

#[derive(Default)]
struct DelegatorState {
    /// Always ends in "." when set.
    action_prefix: Option<String>,
    event_action_mapping: Option<EventActionMap>,
    /// Inverse of `event_action_mapping`: action → event type.
    action_event_mapping: IndexMap<String, String>,
}

/// State reachable from the native listeners. Holds the delegate weakly;
/// the owning [`Delegator`] keeps it alive.
#[derive(Default)]
struct Shared {
    state: RefCell<DelegatorState>,
    delegate: RefCell<Option<Weak<dyn Delegate>>>,
}

/// Resolve `action` to a method name under `prefix`.
fn method_from_action(prefix: Option<&str>, action: &str, method: &str) -> Option<String> {
    match prefix {
        None => Some(method.to_string()),
        Some(prefix) => {
            let expected = format!("{prefix}{method}");
            (action == expected).then(|| method.to_string())
        }
    }
}

/// Action declared on `node` for `event_type`. Empty values count as absent.
fn action_attribute(document: &Document, node: NodeId, event_type: &str) -> Option<String> {
    document
        .attribute(node, &format!("data-action-{event_type}"))
        .filter(|a| !a.is_empty())
        .or_else(|| document.attribute(node, "data-action").filter(|a| !a.is_empty()))
}

impl Shared {
    fn handle(&self, document: &Document, event: &DomEvent, node: NodeId) -> Propagation {
        let Some(action) = action_attribute(document, node, &event.event_type) else {
            return Propagation::Continue;
        };

        let method = {
            let state = self.state.borrow();
            let last_segment = action.rsplit('.').next().unwrap_or(action.as_str());
            let Some(method) = method_from_action(state.action_prefix.as_deref(), &action, last_segment)
            else {
                tracing::trace!(action = %action, "action outside prefix ignored");
                return Propagation::Continue;
            };

            if let Some(mapping) = &state.event_action_mapping {
                let listed = mapping
                    .get(&event.event_type)
                    .is_some_and(|actions| actions.iter().any(|a| *a == method));
                if !listed {
                    tracing::trace!(action = %action, event_type = %event.event_type, "unmapped action ignored");
                    return Propagation::Continue;
                }
            }
            method
        };

        let Some(delegate) = self.delegate.borrow().as_ref().and_then(Weak::upgrade) else {
            return Propagation::Continue;
        };

        let action_event = ActionEvent {
            event,
            element: document.element(node),
            params: OptionBag::new(),
            action: method.clone(),
        };

        match delegate.dispatch(&method, &action_event) {
            Dispatched::Unhandled => {
                tracing::trace!(method = %method, "no method or fallback for action");
                Propagation::Continue
            }
            dispatched => dispatched.propagation(),
        }
    }
}

// =============================================================================
// DELEGATOR
// =============================================================================

pub struct Delegator {
    document: Document,
    node: Option<NodeId>,
    delegate: Option<Rc<dyn Delegate>>,
    shared: Rc<Shared>,
    /// Event type → native listener, `None` while not yet attached.
    subscriptions: IndexMap<String, Option<ListenerId>>,
}

impl std::fmt::Debug for Delegator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delegator")
            .field("node", &self.node)
            .field("action_prefix", &self.action_prefix())
            .field("event_types", &self.subscriptions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Delegator {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            node: None,
            delegate: None,
            shared: Rc::new(Shared::default()),
            subscriptions: IndexMap::new(),
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Move the delegator to `node`, re-attaching existing subscriptions.
    pub fn set_node(&mut self, node: NodeId) {
        if self.node == Some(node) {
            return;
        }
        self.detach_all();
        self.node = Some(node);
        self.attach_all();
    }

    pub fn set_delegate(&mut self, delegate: Rc<dyn Delegate>) {
        *self.shared.delegate.borrow_mut() = Some(Rc::downgrade(&delegate));
        self.delegate = Some(delegate);
    }

    /// Verify the delegator is bound to both a node and a delegate.
    pub fn init(&mut self) -> Result<()> {
        if self.node.is_none() {
            return Err(Error::DelegatorNotReady("node"));
        }
        if self.delegate.is_none() {
            return Err(Error::DelegatorNotReady("delegate"));
        }
        self.attach_all();
        Ok(())
    }

    /// Unsubscribe every native listener and forget the delegate.
    pub fn destructor(&mut self) {
        self.detach_all();
        self.subscriptions.clear();
        *self.shared.delegate.borrow_mut() = None;
        self.delegate = None;
    }

    // =========================================================================
    // ACTION PREFIX
    // =========================================================================

    /// Namespace actions under `prefix`. A "." separator is appended when
    /// missing; an empty prefix clears it.
    pub fn set_action_prefix(&mut self, prefix: &str) {
        let prefix = prefix.trim();
        self.shared.state.borrow_mut().action_prefix = if prefix.is_empty() {
            None
        } else if prefix.ends_with('.') {
            Some(prefix.to_string())
        } else {
            Some(format!("{prefix}."))
        };
    }

    pub fn action_prefix(&self) -> Option<String> {
        self.shared.state.borrow().action_prefix.clone()
    }

    /// The method `action` dispatches to, or `None` when it falls outside
    /// the current prefix.
    pub fn get_method_from_action(&self, action: &str, method: &str) -> Option<String> {
        method_from_action(self.shared.state.borrow().action_prefix.as_deref(), action, method)
    }

    // =========================================================================
    // EVENT → ACTION MAPPING
    // =========================================================================

    /// Replace the mapping. Event types only the old mapping named are
    /// unsubscribed, newly named ones subscribed, shared ones left alone.
    pub fn set_event_action_mapping(&mut self, mapping: EventActionMap) {
        let old_types: Vec<String> = self
            .shared
            .state
            .borrow()
            .event_action_mapping
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        for event_type in &old_types {
            if !mapping.contains_key(event_type) {
                self.remove_event_type(event_type);
            }
        }
        for event_type in mapping.keys() {
            self.add_event_type(event_type);
        }

        let mut inverse = IndexMap::new();
        for (event_type, actions) in &mapping {
            for action in actions {
                inverse.insert(action.clone(), event_type.clone());
            }
        }

        let mut state = self.shared.state.borrow_mut();
        state.action_event_mapping = inverse;
        state.event_action_mapping = Some(mapping);
    }

    pub fn event_action_mapping(&self) -> Option<EventActionMap> {
        self.shared.state.borrow().event_action_mapping.clone()
    }

    /// Event type an action is mapped under.
    pub fn event_type_for_action(&self, action: &str) -> Option<String> {
        self.shared.state.borrow().action_event_mapping.get(action).cloned()
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    /// Listen for `event_type`. No-op when already subscribed.
    pub fn add_event_type(&mut self, event_type: &str) {
        if self.subscriptions.contains_key(event_type) {
            return;
        }
        let listener = self.node.map(|node| self.attach(node, event_type));
        self.subscriptions.insert(event_type.to_string(), listener);
    }

    /// Stop listening for `event_type`. No-op when not subscribed.
    pub fn remove_event_type(&mut self, event_type: &str) {
        if let Some(Some(id)) = self.subscriptions.shift_remove(event_type) {
            self.document.remove_event_listener(id);
        }
    }

    pub fn is_subscribed(&self, event_type: &str) -> bool {
        self.subscriptions.contains_key(event_type)
    }

    pub fn event_types(&self) -> Vec<String> {
        self.subscriptions.keys().cloned().collect()
    }

    /// Resolve and dispatch the action declared on `node` for `event`.
    pub fn handle_patched_event(&self, event: &DomEvent, node: NodeId) -> Propagation {
        self.shared.handle(&self.document, event, node)
    }

    fn attach(&self, root: NodeId, event_type: &str) -> ListenerId {
        let shared = self.shared.clone();
        let document: WeakDocument = self.document.downgrade();

        self.document.add_event_listener(root, event_type, move |event| {
            let Some(document) = document.upgrade() else {
                return;
            };
            let mut current = Some(event.target);
            while let Some(node) = current {
                if shared.handle(&document, event, node) == Propagation::Stop {
                    event.stop();
                    return;
                }
                if node == root {
                    return;
                }
                current = document.parent(node);
            }
        })
    }

    fn attach_all(&mut self) {
        let Some(node) = self.node else {
            return;
        };
        let pending: Vec<String> = self
            .subscriptions
            .iter()
            .filter(|(_, id)| id.is_none())
            .map(|(t, _)| t.clone())
            .collect();
        for event_type in pending {
            let id = self.attach(node, &event_type);
            self.subscriptions.insert(event_type, Some(id));
        }
    }

    fn detach_all(&mut self) {
        for id in self.subscriptions.values_mut() {
            if let Some(id) = id.take() {
                self.document.remove_event_listener(id);
            }
        }
    }
}

impl Drop for Delegator {
    fn drop(&mut self) {
        self.detach_all();
    }
}
