//! Declared option types and the runtime type checker.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigError;
use crate::schema::Schema;

/// Declared type of a configuration option.
///
/// Values are stored as JSON, so the checker works on [`Value`] kinds.
/// `Float` accepts integers, mirroring the numeric tower most config
/// formats assume.
#[derive(Debug, Clone)]
pub enum OptionType {
    Any,
    Bool,
    Integer,
    Float,
    String,
    List(Box<OptionType>),
    Map(Box<OptionType>),
    Optional(Box<OptionType>),
    Section(Arc<Schema>),
}

impl OptionType {
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    #[must_use]
    pub fn map(value: Self) -> Self {
        Self::Map(Box::new(value))
    }

    #[must_use]
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Whether `null` is a valid value of this type.
    #[must_use]
    pub const fn accepts_null(&self) -> bool {
        matches!(self, Self::Any | Self::Optional(_))
    }

    /// Ensure `value` matches this type.
    ///
    /// `name` is used in the error; nested failures extend it with the
    /// offending index or key (`servers[2]`, `db.url`).
    pub fn check(&self, name: &str, value: &Value) -> Result<(), ConfigError> {
        let mismatch = || ConfigError::TypeMismatch {
            name: name.to_string(),
            expected: self.to_string(),
            found: value_kind(value).to_string(),
        };

        match self {
            Self::Any => Ok(()),
            Self::Bool => value.is_boolean().then_some(()).ok_or_else(mismatch),
            Self::Integer => (value.is_i64() || value.is_u64())
                .then_some(())
                .ok_or_else(mismatch),
            Self::Float => value.is_number().then_some(()).ok_or_else(mismatch),
            Self::String => value.is_string().then_some(()).ok_or_else(mismatch),
            Self::List(item) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                for (idx, entry) in items.iter().enumerate() {
                    item.check(&format!("{name}[{idx}]"), entry)?;
                }
                Ok(())
            }
            Self::Map(inner) => {
                let entries = value.as_object().ok_or_else(mismatch)?;
                for (key, entry) in entries {
                    inner.check(&format!("{name}.{key}"), entry)?;
                }
                Ok(())
            }
            Self::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.check(name, value)
                }
            }
            Self::Section(schema) => {
                let entries = value.as_object().ok_or_else(mismatch)?;
                for (key, entry) in entries {
                    if let Some(option) = schema.option_by_name(key) {
                        option.ty().check(&format!("{name}.{key}"), entry)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::String => f.write_str("string"),
            Self::List(item) => write!(f, "list<{item}>"),
            Self::Map(value) => write!(f, "map<{value}>"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Section(schema) => write!(f, "section<{}>", schema.name()),
        }
    }
}

/// Short name of a JSON value's kind, used in mismatch errors.
#[must_use]
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
