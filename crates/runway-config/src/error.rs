//! Configuration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value does not match the declared type of its option.
    #[error("Type mismatch for '{name}': expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// An option has neither a stored value nor an allowed default.
    #[error("Option '{name}' is required but has no value")]
    Required { name: String },

    /// The attribute is not declared by the schema.
    #[error("Unknown option '{attr}'")]
    UnknownOption { attr: String },

    /// A subclass-style override disagrees with the inherited declaration.
    #[error("Mismatched override in '{schema}': {existing} != {declared} for {on}")]
    MismatchedOverride {
        schema: String,
        on: String,
        existing: String,
        declared: String,
    },

    /// Section options get an empty nested config as default; an explicit one is rejected.
    #[error("Option '{attr}' is a section and does not accept a default value")]
    DefaultNotAllowed { attr: String },

    /// Typed extraction of an option value failed.
    #[error("Cannot deserialize option '{attr}': {source}")]
    Deserialize {
        attr: String,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Figment(Box::new(error))
    }
}
