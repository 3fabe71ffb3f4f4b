//! Error taxonomy of the view model bridge.

use thiserror::Error;

/// Result type of the update and render operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Static misconfiguration of a view model definition.
///
/// Not recoverable per request. Surfaces when a schema is first built, which
/// the host does for every page at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("prop '{name}' must be named differently from view model field '{field}'")]
    PropNameCollision { field: String, name: String },

    #[error("prop '{name}' is bound to unknown data field '{field}'")]
    UnknownPropField { field: String, name: String },

    #[error("action '{name}' is registered more than once")]
    DuplicateAction { name: String },

    #[error("action name must not be empty")]
    EmptyActionName,

    #[error("action '{name}' declares {count} attachment parameters, at most one is allowed")]
    MultipleAttachments { name: String, count: usize },

    #[error("action '{name}' names {declared} parameters but its handler takes {expected}")]
    ParameterCount {
        name: String,
        declared: usize,
        expected: usize,
    },

    #[error("computed entry '{name}' is registered more than once")]
    DuplicateComputed { name: String },

    #[error("computed entry '{name}' shadows a data field")]
    ComputedShadowsField { name: String },

    #[error("watcher '{action}' does not name a field to watch")]
    EmptyWatchField { action: String },

    #[error("watcher '{action}' watches unknown data field '{field}'")]
    UnknownWatchField { action: String, field: String },

    #[error("view model {type_name} must serialize to a JSON object")]
    NotAnObject { type_name: &'static str },

    #[error("method {name} does not exist or is not visible")]
    UnknownAction { name: String },
}

/// The caller may not invoke a role restricted action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("access denied on {action} method: no caller identity")]
    Anonymous { action: String },

    #[error("access denied on {action} method: requires one of [{}]", .required.join(", "))]
    MissingRole {
        action: String,
        required: Vec<String>,
    },
}

/// A client supplied argument does not fit the declared parameter type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("argument {index} ({expected}) is missing")]
    Missing { index: usize, expected: &'static str },

    #[error("argument {index}: cannot convert {found} to {expected}")]
    Incompatible {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("argument {index}: '{value}' is not a variant of {expected}")]
    UnknownVariant {
        index: usize,
        expected: &'static str,
        value: String,
    },

    #[error("argument {index}: invalid {expected}: {reason}")]
    Malformed {
        index: usize,
        expected: &'static str,
        reason: String,
    },
}

/// Any failure of a render or update cycle.
///
/// Every variant is terminal for the request: no change set is produced.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("action failed: {0:#}")]
    ActionFailed(anyhow::Error),
}
