//! Actions - Typed action tables and event→action mappings
//!
//! An action table maps action names to plain function pointers on a module
//! type, plus an optional fallback handler. It is built once per module
//! type, so dispatch never probes an object for a method by name: a lookup
//! resolves to exactly one of "method", "fallback" or "unhandled".

use indexmap::IndexMap;

use crate::dom::{DomEvent, Element};
use crate::types::OptionBag;

// =============================================================================
// TYPES
// =============================================================================

/// Whether an action lets the event keep travelling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Propagation {
    #[default]
    Continue,
    /// Stop further actions for this dispatch, including ancestor delegators.
    Stop,
}

impl From<bool> for Propagation {
    /// `false` stops, like returning `false` from a DOM handler.
    fn from(keep_going: bool) -> Self {
        if keep_going { Self::Continue } else { Self::Stop }
    }
}

/// What an action method receives.
#[derive(Debug)]
pub struct ActionEvent<'a> {
    pub event: &'a DomEvent,
    /// Element carrying the `data-action*` attribute.
    pub element: Element,
    /// Always empty unless a parameter extension fills it.
    pub params: OptionBag,
    /// Resolved method name.
    pub action: String,
}

/// An action method on module type `M`.
pub type ActionMethod<M> = fn(&mut M, &ActionEvent<'_>) -> Propagation;

/// Outcome of handing an action to a delegate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    Method(Propagation),
    Fallback(Propagation),
    Unhandled,
}

impl Dispatched {
    pub fn propagation(self) -> Propagation {
        match self {
            Self::Method(p) | Self::Fallback(p) => p,
            Self::Unhandled => Propagation::Continue,
        }
    }
}

/// Receiver of delegated actions.
pub trait Delegate {
    fn dispatch(&self, method: &str, action: &ActionEvent<'_>) -> Dispatched;
}

// =============================================================================
// ACTION TABLE
// =============================================================================

/// Resolution of a method name against an [`ActionTable`].
pub enum ActionTarget<M> {
    Method(ActionMethod<M>),
    Fallback(ActionMethod<M>),
    Unhandled,
}

pub struct ActionTable<M> {
    methods: IndexMap<String, ActionMethod<M>>,
    fallback: Option<ActionMethod<M>>,
}

impl<M> Default for ActionTable<M> {
    fn default() -> Self {
        Self {
            methods: IndexMap::new(),
            fallback: None,
        }
    }
}

impl<M> Clone for ActionTable<M> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
            fallback: self.fallback,
        }
    }
}

impl<M> std::fmt::Debug for ActionTable<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<M> ActionTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` under `name`, replacing any earlier entry.
    pub fn on(mut self, name: &str, method: ActionMethod<M>) -> Self {
        self.methods.insert(name.to_string(), method);
        self
    }

    /// The `handle_action` fallback, used when no method matches.
    pub fn fallback(mut self, method: ActionMethod<M>) -> Self {
        self.fallback = Some(method);
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn resolve(&self, name: &str) -> ActionTarget<M> {
        match (self.methods.get(name), self.fallback) {
            (Some(&method), _) => ActionTarget::Method(method),
            (None, Some(fallback)) => ActionTarget::Fallback(fallback),
            (None, None) => ActionTarget::Unhandled,
        }
    }

    /// Resolve and run `name` on `target`.
    pub fn invoke(&self, target: &mut M, name: &str, action: &ActionEvent<'_>) -> Dispatched {
        match self.resolve(name) {
            ActionTarget::Method(method) => Dispatched::Method(method(target, action)),
            ActionTarget::Fallback(method) => Dispatched::Fallback(method(target, action)),
            ActionTarget::Unhandled => Dispatched::Unhandled,
        }
    }

    /// Overlay `child` on top of `self`: child methods win, a child
    /// fallback replaces the parent's.
    pub fn merge(&mut self, child: &ActionTable<M>) {
        for (name, &method) in &child.methods {
            self.methods.insert(name.clone(), method);
        }
        if child.fallback.is_some() {
            self.fallback = child.fallback;
        }
    }
}

// =============================================================================
// EVENT → ACTION MAPPING
// =============================================================================

/// Event type → ordered action names.
pub type EventActionMap = IndexMap<String, Vec<String>>;

/// Builder for an [`EventActionMap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventActions {
    map: EventActionMap,
}

impl EventActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `actions` to the list for `event_type`.
    pub fn add<I, S>(&mut self, event_type: &str, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map
            .entry(event_type.to_string())
            .or_default()
            .extend(actions.into_iter().map(Into::into));
        self
    }

    /// Remove `actions` from `event_type`, dropping the event once empty.
    pub fn remove<I, S>(&mut self, event_type: &str, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(list) = self.map.get_mut(event_type) {
            for action in actions {
                list.retain(|a| a != action.as_ref());
            }
            if list.is_empty() {
                self.map.shift_remove(event_type);
            }
        }
        self
    }

    /// Append every entry of `other`, skipping names already listed for
    /// the same event.
    pub fn extend(&mut self, other: &EventActions) -> &mut Self {
        for (event_type, actions) in &other.map {
            let list = self.map.entry(event_type.clone()).or_default();
            for action in actions {
                if !list.contains(action) {
                    list.push(action.clone());
                }
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn map(&self) -> &EventActionMap {
        &self.map
    }

    pub fn into_map(self) -> EventActionMap {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[derive(Default)]
    struct Counter {
        saves: usize,
        fallbacks: Vec<String>,
    }

    fn save(c: &mut Counter, _: &ActionEvent<'_>) -> Propagation {
        c.saves += 1;
        Propagation::Continue
    }

    fn handle_action(c: &mut Counter, action: &ActionEvent<'_>) -> Propagation {
        c.fallbacks.push(action.action.clone());
        Propagation::Stop
    }

    #[test]
    fn test_table_resolution() {
        let doc = Document::new();
        let node = doc.create_element("button");
        let event = DomEvent::new("click", node);
        let action = ActionEvent {
            event: &event,
            element: doc.element(node),
            params: OptionBag::new(),
            action: "cancel".into(),
        };

        let mut counter = Counter::default();
        let table = ActionTable::new().on("save", save);
        assert_eq!(table.invoke(&mut counter, "save", &action), Dispatched::Method(Propagation::Continue));
        assert_eq!(table.invoke(&mut counter, "cancel", &action), Dispatched::Unhandled);

        let table = table.fallback(handle_action);
        assert_eq!(table.invoke(&mut counter, "cancel", &action), Dispatched::Fallback(Propagation::Stop));
        assert_eq!(counter.saves, 1);
        assert_eq!(counter.fallbacks, vec!["cancel"]);
    }

    #[test]
    fn test_event_actions_add_remove() {
        let mut actions = EventActions::new();
        actions.add("click", ["view", "save"]).add("click", ["cancel"]).add("keypress", ["autoComplete"]);
        assert_eq!(actions.map()["click"], vec!["view", "save", "cancel"]);

        actions.remove("click", ["save"]);
        assert_eq!(actions.map()["click"], vec!["view", "cancel"]);

        actions.remove("keypress", ["autoComplete"]);
        assert!(!actions.map().contains_key("keypress"));
    }

    #[test]
    fn test_event_actions_extend_skips_duplicates() {
        let mut parent = EventActions::new();
        parent.add("click", ["view", "save"]);
        let mut child = EventActions::new();
        child.add("click", ["save", "cancel"]).add("submit", ["save"]);

        parent.extend(&child);
        assert_eq!(parent.map()["click"], vec!["view", "save", "cancel"]);
        assert_eq!(parent.map()["submit"], vec!["save"]);
    }

    #[test]
    fn test_propagation_from_bool() {
        assert_eq!(Propagation::from(false), Propagation::Stop);
        assert_eq!(Propagation::from(true), Propagation::Continue);
    }
}
