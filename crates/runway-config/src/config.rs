//! The typed configuration object.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::schema::{OptionDef, Schema};

/// Configuration values validated against a [`Schema`].
///
/// There are three ways to reach a value:
///
/// - by attribute (`get`, `set`, `unset`): typed access that falls back to
///   option defaults;
/// - by key (`item`, `insert`, `remove`, `update`): map access over stored
///   values only, type checked for option keys;
/// - raw (`data`, `data_mut`): no checks at all. Attribute reads return such
///   values as stored, whatever their type.
#[derive(Debug, Clone)]
pub struct Config {
    schema: Arc<Schema>,
    data: Map<String, Value>,
}

impl Config {
    #[must_use]
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            data: Map::new(),
        }
    }

    /// Create a config with initial values, checked like [`Config::update`].
    pub fn with_values<K, I>(schema: Arc<Schema>, values: I) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut config = Self::new(schema);
        config.update(values)?;
        Ok(config)
    }

    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    // -----------------------------------------------------------------------
    // Attribute access
    // -----------------------------------------------------------------------

    /// Value of the option declared as `attr`, or its default.
    pub fn get(&self, attr: &str) -> Result<Value, ConfigError> {
        let option = self.option(attr)?;
        match self.data.get(option.name()) {
            Some(value) => Ok(value.clone()),
            None => option.default_value(),
        }
    }

    /// Deserialize the value of `attr` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, attr: &str) -> Result<T, ConfigError> {
        let value = self.get(attr)?;
        serde_json::from_value(value).map_err(|source| ConfigError::Deserialize {
            attr: attr.to_string(),
            source,
        })
    }

    /// Type-check and store a value for `attr`.
    pub fn set(&mut self, attr: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let name = self.option(attr)?.name().to_string();
        self.store_checked(name, value.into())
    }

    /// Forget the stored value of `attr`; it falls back to its default.
    pub fn unset(&mut self, attr: &str) -> Result<(), ConfigError> {
        let name = self.option(attr)?.name().to_string();
        self.data.remove(&name);
        Ok(())
    }

    /// Nested config of the section option `attr`.
    pub fn section(&self, attr: &str) -> Result<Self, ConfigError> {
        let option = self.option(attr)?;
        let crate::OptionType::Section(nested) = option.ty() else {
            return Err(ConfigError::InvalidValue {
                field: attr.to_string(),
                reason: "option is not a section".into(),
            });
        };

        let mut section = Self::new(Arc::clone(nested));
        match self.data.get(option.name()) {
            Some(Value::Object(values)) => section.data.clone_from(values),
            Some(other) => {
                return Err(ConfigError::TypeMismatch {
                    name: option.name().to_string(),
                    expected: option.ty().to_string(),
                    found: crate::kind::value_kind(other).to_string(),
                });
            }
            None => {}
        }
        Ok(section)
    }

    /// Store a nested config under the section option `attr`.
    pub fn set_section(&mut self, attr: &str, section: &Self) -> Result<(), ConfigError> {
        self.set(attr, Value::Object(section.data.clone()))
    }

    // -----------------------------------------------------------------------
    // Key access
    // -----------------------------------------------------------------------

    /// Stored value under `key`, ignoring defaults.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Store `value` under `key`, type-checked when `key` names an option.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<(), ConfigError> {
        let key = key.into();
        if self.schema.option_by_name(&key).is_some() {
            self.store_checked(key, value)
        } else {
            self.data.insert(key, value);
            Ok(())
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Insert every pair, stopping at the first type mismatch.
    ///
    /// Pairs inserted before the failing one stay in place.
    pub fn update<K, I>(&mut self, values: I) -> Result<(), ConfigError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (key, value) in values {
            self.insert(key, value)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    /// Check `value` against the option stored under `name`, if any.
    pub fn check_type(&self, name: &str, value: &Value) -> Result<(), ConfigError> {
        self.schema.check_type(name, value)
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    #[must_use]
    pub const fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Unchecked access to stored values.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Every option key with its effective value, plus stored unknown keys.
    ///
    /// Options without a value or allowed default are left out.
    #[must_use]
    pub fn resolved(&self) -> Map<String, Value> {
        let mut resolved = Map::new();
        for option in self.schema.options() {
            let value = if option.is_section() {
                self.section(option.attr())
                    .map(|section| Value::Object(section.resolved()))
            } else {
                self.get(option.attr())
            };
            if let Ok(value) = value {
                resolved.insert(option.name().to_string(), value);
            }
        }
        for (key, value) in &self.data {
            if !resolved.contains_key(key) {
                resolved.insert(key.clone(), value.clone());
            }
        }
        resolved
    }

    fn option(&self, attr: &str) -> Result<&OptionDef, ConfigError> {
        self.schema
            .option(attr)
            .ok_or_else(|| ConfigError::UnknownOption {
                attr: attr.to_string(),
            })
    }

    fn store_checked(&mut self, name: String, value: Value) -> Result<(), ConfigError> {
        self.schema.check_type(&name, &value)?;
        self.data.insert(name, value);
        Ok(())
    }
}

impl Serialize for Config {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
