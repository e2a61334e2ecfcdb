//! Lookup across several configs, first set value wins.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::error::ConfigError;

/// Ordered list of configs queried by attribute.
///
/// Lookup of `attr` starts at the first config whose schema declares it.
/// From there the first *stored* value under that option's key wins, even if
/// it comes from a later config. Only when nothing is stored does the first
/// usable default apply. Configs before the declaring one are never
/// consulted, not even their stored values.
#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    maps: Vec<Config>,
}

impl ChainConfig {
    pub fn new(maps: impl IntoIterator<Item = Config>) -> Self {
        Self {
            maps: maps.into_iter().collect(),
        }
    }

    pub fn push(&mut self, config: Config) {
        self.maps.push(config);
    }

    #[must_use]
    pub fn maps(&self) -> &[Config] {
        &self.maps
    }

    pub fn get(&self, attr: &str) -> Result<Value, ConfigError> {
        let unknown = || ConfigError::UnknownOption {
            attr: attr.to_string(),
        };

        let (start, name) = self
            .maps
            .iter()
            .enumerate()
            .find_map(|(idx, config)| {
                config
                    .schema()
                    .option(attr)
                    .map(|option| (idx, option.name().to_string()))
            })
            .ok_or_else(unknown)?;

        let tail = &self.maps[start..];

        if let Some(value) = tail.iter().find_map(|config| config.data().get(&name)) {
            return Ok(value.clone());
        }

        tail.iter()
            .filter_map(|config| config.schema().option(attr))
            .find_map(|option| option.default_value().ok())
            .ok_or_else(unknown)
    }

    pub fn get_as<T: DeserializeOwned>(&self, attr: &str) -> Result<T, ConfigError> {
        let value = self.get(attr)?;
        serde_json::from_value(value).map_err(|source| ConfigError::Deserialize {
            attr: attr.to_string(),
            source,
        })
    }
}
