//! Error taxonomy.
//!
//! Configuration errors (bad attributes, malformed type names, invalid
//! option JSON), registry invariant violations and capability absence are
//! all fatal and surface through this one enum. Resolution misses inside
//! the event delegator never become errors.

use thiserror::Error;

use crate::module::Guid;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required attribute is absent. `element` is `TAG.class.list#id`.
    #[error("Missing required attribute {attribute} on {element}")]
    MissingAttribute {
        attribute: &'static str,
        element: String,
    },

    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid JSON in data-module-options on {element}: {source}")]
    InvalidOptions {
        element: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("data-module-options on {element} must be a JSON object")]
    OptionsNotObject { element: String },

    #[error("Cannot instantiate invalid type: {0}")]
    InvalidType(String),

    #[error("Class name {0} does not exist")]
    TypeDoesNotExist(String),

    #[error("Class name {0} is not a constructor function")]
    NotAConstructor(String),

    #[error("Cannot register module {0} without a guid property")]
    MissingGuid(String),

    #[error("Module {0} has already been registered")]
    AlreadyRegistered(Guid),

    #[error("Sub module elements cannot have more than one type specified in data-modules")]
    SubModuleTypes,

    #[error("Error creating sub module. Property {0} already exists.")]
    SubModulePropertyExists(String),

    #[error("Cannot create sub module property '{0}'. Property is neither null nor an Array on the parent module.")]
    IllegalSubModuleProperty(String),

    #[error("This host does not support media queries. Install a MediaMatcher on the Window")]
    MediaQueriesUnsupported,

    #[error("Invalid data-module-lazyload pattern {pattern:?}: {source}")]
    InvalidLazyLoadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unsupported selector: {0}")]
    InvalidSelector(String),

    #[error("Layout failed: {0}")]
    Layout(String),

    /// The manager is already in the middle of a mutation.
    #[error("Module manager is busy; reentrant calls are not supported")]
    ManagerBusy,

    #[error("Delegator is missing its {0}")]
    DelegatorNotReady(&'static str),

    /// The module is already mutably borrowed further up the stack.
    #[error("Module {0} is busy")]
    ModuleBusy(String),
}
