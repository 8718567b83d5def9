//! Factory - Type name → module instance
//!
//! Type names resolve through an explicit registry populated by the host at
//! startup. Registering `Blog.Post.EditModule` also records `Blog` and
//! `Blog.Post` as namespaces, so asking for those fails as "not a
//! constructor" rather than "does not exist".
//!
//! An [`ObjectFactory`] can be plugged in ahead of the registry. When it
//! returns nothing, resolution falls back to the registry.
//!
//! # Example
//!
//! ```ignore
//! let mut factory = Factory::new();
//! factory.register("Blog.Post.EditModule", EditModule::new)?;
//! let module = factory.get_instance("Blog.Post.EditModule")?;
//! ```

use std::rc::Rc;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use super::base::{Module, ModuleRef};
use crate::error::{Error, Result};

static TYPE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9.]+[A-Za-z0-9]$").expect("static pattern"));

/// Dependency injection hook consulted before the registry.
pub trait ObjectFactory {
    fn get_instance(&self, type_name: &str) -> Option<ModuleRef>;

    fn destructor(&self) {}
}

type Constructor = Rc<dyn Fn() -> ModuleRef>;

enum Entry {
    Constructor(Constructor),
    Namespace,
}

#[derive(Default)]
pub struct Factory {
    entries: IndexMap<String, Entry>,
    object_factory: Option<Rc<dyn ObjectFactory>>,
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("types", &self.registered_types())
            .field("object_factory", &self.object_factory.is_some())
            .finish()
    }
}

/// True if `type_name` is syntactically a valid module type.
pub fn is_valid_type(type_name: &str) -> bool {
    TYPE_PATTERN.is_match(type_name)
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `type_name`. The definition of `M` is
    /// flattened once here and shared by every instance.
    pub fn register<M, F>(&mut self, type_name: &str, constructor: F) -> Result<()>
    where
        M: Module,
        F: Fn() -> M + 'static,
    {
        if !is_valid_type(type_name) {
            return Err(Error::InvalidType(type_name.to_string()));
        }

        let definition = Rc::new(M::definition());
        let name = type_name.to_string();
        let constructor: Constructor =
            Rc::new(move || ModuleRef::with_definition(&name, constructor(), definition.clone()));

        for (index, _) in type_name.match_indices('.') {
            self.register_namespace(&type_name[..index]);
        }
        self.entries
            .insert(type_name.to_string(), Entry::Constructor(constructor));
        tracing::trace!(type_name, "module type registered");
        Ok(())
    }

    /// Record `name` as a namespace unless something is already there.
    pub fn register_namespace(&mut self, name: &str) {
        self.entries.entry(name.to_string()).or_insert(Entry::Namespace);
    }

    pub fn set_object_factory(&mut self, object_factory: Rc<dyn ObjectFactory>) {
        self.object_factory = Some(object_factory);
    }

    pub fn object_factory(&self) -> Option<Rc<dyn ObjectFactory>> {
        self.object_factory.clone()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        matches!(self.entries.get(type_name), Some(Entry::Constructor(_)))
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Constructor(_)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// A new instance of `type_name`.
    pub fn get_instance(&self, type_name: &str) -> Result<ModuleRef> {
        if let Some(instance) = self
            .object_factory
            .as_ref()
            .and_then(|factory| factory.get_instance(type_name))
        {
            return Ok(instance);
        }

        if !is_valid_type(type_name) {
            return Err(Error::InvalidType(type_name.to_string()));
        }

        let constructor = match self.entries.get(type_name) {
            Some(Entry::Constructor(constructor)) => constructor.clone(),
            Some(Entry::Namespace) => return Err(Error::NotAConstructor(type_name.to_string())),
            None => return Err(Error::TypeDoesNotExist(type_name.to_string())),
        };
        Ok(constructor())
    }

    /// Drop the object factory.
    pub fn destructor(&mut self) {
        if let Some(object_factory) = self.object_factory.take() {
            object_factory.destructor();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleBase;

    struct Widget {
        base: ModuleBase,
    }

    impl Widget {
        fn new() -> Self {
            Self { base: ModuleBase::new() }
        }
    }

    impl Module for Widget {
        fn base(&self) -> &ModuleBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ModuleBase {
            &mut self.base
        }
    }

    struct Injector;

    impl ObjectFactory for Injector {
        fn get_instance(&self, type_name: &str) -> Option<ModuleRef> {
            (type_name == "Injected").then(|| ModuleRef::new("Injected", Widget::new()))
        }
    }

    #[test]
    fn test_type_validation() {
        let factory = Factory::new();
        for bad in ["", "a", "ab.", "1Foo", "Foo-Bar", ".Foo", "Foo Bar"] {
            assert!(matches!(factory.get_instance(bad), Err(Error::InvalidType(_))), "{bad}");
        }
        assert!(is_valid_type("Foo"));
        assert!(is_valid_type("A.B.C.SomethingModule"));
    }

    #[test]
    fn test_resolution_errors() {
        let mut factory = Factory::new();
        factory.register("Blog.Post.Edit", Widget::new).unwrap();

        assert!(matches!(factory.get_instance("Blog.Post"), Err(Error::NotAConstructor(_))));
        assert!(matches!(factory.get_instance("Blog.Missing"), Err(Error::TypeDoesNotExist(_))));
        assert!(matches!(factory.get_instance("NoSuchThing"), Err(Error::TypeDoesNotExist(_))));

        let instance = factory.get_instance("Blog.Post.Edit").unwrap();
        assert_eq!(instance.type_name(), "Blog.Post.Edit");
        assert!(instance.is::<Widget>());
    }

    #[test]
    fn test_instances_are_distinct() {
        let mut factory = Factory::new();
        factory.register("Widget", Widget::new).unwrap();
        let a = factory.get_instance("Widget").unwrap();
        let b = factory.get_instance("Widget").unwrap();
        assert_ne!(a, b);
        assert_ne!(a.guid(), b.guid());
    }

    #[test]
    fn test_object_factory_first_then_fallback() {
        let mut factory = Factory::new();
        factory.register("Widget", Widget::new).unwrap();
        factory.set_object_factory(Rc::new(Injector));

        assert_eq!(factory.get_instance("Injected").unwrap().type_name(), "Injected");
        assert_eq!(factory.get_instance("Widget").unwrap().type_name(), "Widget");

        factory.destructor();
        assert!(factory.object_factory().is_none());
        assert!(matches!(factory.get_instance("Injected"), Err(Error::TypeDoesNotExist(_))));
    }
}
