//! Module Definition - Declarative per-type descriptor
//!
//! Everything a module type contributes besides its own code: option
//! defaults, the event→action mapping, the action table and the lifecycle
//! callback lists. Definitions compose explicitly through [`extend`]
//! rather than by walking a type hierarchy, and are flattened once when
//! the type is registered.
//!
//! [`extend`]: ModuleDefinition::extend

use serde_json::Value;

use crate::events::{ActionMethod, ActionTable, EventActions};
use crate::types::{merge_options, OptionBag};

/// Lifecycle callback. Returning `false` skips the rest of its list.
pub type LifecycleCallback<M> = fn(&mut M) -> bool;

pub struct ModuleDefinition<M> {
    options: OptionBag,
    actions: EventActions,
    table: ActionTable<M>,
    /// Event types listened to in pure data-action mode.
    event_types: Vec<String>,
    before_ready: Vec<LifecycleCallback<M>>,
    after_ready: Vec<LifecycleCallback<M>>,
}

impl<M> Default for ModuleDefinition<M> {
    fn default() -> Self {
        Self {
            options: OptionBag::new(),
            actions: EventActions::new(),
            table: ActionTable::new(),
            event_types: Vec::new(),
            before_ready: Vec::new(),
            after_ready: Vec::new(),
        }
    }
}

impl<M> Clone for ModuleDefinition<M> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            actions: self.actions.clone(),
            table: self.table.clone(),
            event_types: self.event_types.clone(),
            before_ready: self.before_ready.clone(),
            after_ready: self.after_ready.clone(),
        }
    }
}

impl<M> std::fmt::Debug for ModuleDefinition<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("options", &self.options)
            .field("actions", &self.actions)
            .field("table", &self.table)
            .field("event_types", &self.event_types)
            .field("before_ready", &self.before_ready.len())
            .field("after_ready", &self.after_ready.len())
            .finish()
    }
}

impl<M> ModuleDefinition<M> {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // BUILDERS
    // =========================================================================

    /// Default for option `key`.
    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    pub fn options(mut self, defaults: OptionBag) -> Self {
        self.options = merge_options(&self.options, &defaults);
        self
    }

    /// Map `name` under `event_type` and route it to `method`.
    pub fn action(mut self, event_type: &str, name: &str, method: ActionMethod<M>) -> Self {
        self.actions.add(event_type, [name]);
        self.table = self.table.on(name, method);
        self
    }

    /// Map `name` under `event_type` without a method, so it reaches the
    /// fallback.
    pub fn mapped(mut self, event_type: &str, name: &str) -> Self {
        self.actions.add(event_type, [name]);
        self
    }

    /// A method reachable from `data-action` without any mapping.
    pub fn method(mut self, name: &str, method: ActionMethod<M>) -> Self {
        self.table = self.table.on(name, method);
        self
    }

    /// The `handle_action` fallback.
    pub fn fallback(mut self, method: ActionMethod<M>) -> Self {
        self.table = self.table.fallback(method);
        self
    }

    /// Listen for `event_type` even though no mapping names it.
    pub fn listen(mut self, event_type: &str) -> Self {
        if !self.event_types.iter().any(|t| t == event_type) {
            self.event_types.push(event_type.to_string());
        }
        self
    }

    pub fn before_ready(mut self, callback: LifecycleCallback<M>) -> Self {
        self.before_ready.push(callback);
        self
    }

    pub fn after_ready(mut self, callback: LifecycleCallback<M>) -> Self {
        self.after_ready.push(callback);
        self
    }

    /// Layer `self` over `parent`: child options and methods win, action
    /// lists and callbacks run parent first.
    pub fn extend(self, parent: &ModuleDefinition<M>) -> Self {
        let mut merged = parent.clone();
        merged.options = merge_options(&parent.options, &self.options);
        merged.actions.extend(&self.actions);
        merged.table.merge(&self.table);
        for event_type in &self.event_types {
            merged = merged.listen(event_type);
        }
        merged.before_ready.extend(self.before_ready);
        merged.after_ready.extend(self.after_ready);
        merged
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn default_options(&self) -> &OptionBag {
        &self.options
    }

    pub fn actions(&self) -> &EventActions {
        &self.actions
    }

    pub fn table(&self) -> &ActionTable<M> {
        &self.table
    }

    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    pub fn run_before_ready(&self, module: &mut M) -> bool {
        run_callbacks(&self.before_ready, module)
    }

    pub fn run_after_ready(&self, module: &mut M) -> bool {
        run_callbacks(&self.after_ready, module)
    }
}

fn run_callbacks<M>(callbacks: &[LifecycleCallback<M>], module: &mut M) -> bool {
    callbacks.iter().all(|callback| callback(module))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActionEvent, Propagation};
    use serde_json::json;

    #[derive(Default)]
    struct Log(Vec<&'static str>);

    fn parent_view(log: &mut Log, _: &ActionEvent<'_>) -> Propagation {
        log.0.push("parent view");
        Propagation::Continue
    }

    fn child_view(log: &mut Log, _: &ActionEvent<'_>) -> Propagation {
        log.0.push("child view");
        Propagation::Continue
    }

    fn parent_ready(log: &mut Log) -> bool {
        log.0.push("parent ready");
        true
    }

    fn abort(log: &mut Log) -> bool {
        log.0.push("abort");
        false
    }

    fn child_ready(log: &mut Log) -> bool {
        log.0.push("child ready");
        true
    }

    #[test]
    fn test_extend_merges_parent_first() {
        let parent = ModuleDefinition::<Log>::new()
            .option("a", json!(1))
            .option("b", json!(1))
            .action("click", "view", parent_view)
            .after_ready(parent_ready);
        let child = ModuleDefinition::<Log>::new()
            .option("b", json!(2))
            .action("click", "view", child_view)
            .action("submit", "save", child_view)
            .after_ready(child_ready)
            .extend(&parent);

        assert_eq!(child.default_options()["a"], json!(1));
        assert_eq!(child.default_options()["b"], json!(2));
        assert_eq!(child.actions().map()["click"], vec!["view"]);
        assert!(child.actions().map().contains_key("submit"));

        let mut log = Log::default();
        assert!(child.run_after_ready(&mut log));
        assert_eq!(log.0, vec!["parent ready", "child ready"]);
        assert!(child.table().has_method("save"));
    }

    #[test]
    fn test_callback_false_aborts_list() {
        let definition = ModuleDefinition::<Log>::new()
            .before_ready(parent_ready)
            .before_ready(abort)
            .before_ready(child_ready);

        let mut log = Log::default();
        assert!(!definition.run_before_ready(&mut log));
        assert_eq!(log.0, vec!["parent ready", "abort"]);
    }
}
