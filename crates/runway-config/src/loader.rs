//! Layered loading of a [`Config`] with figment.
//!
//! Sources in priority order (highest wins):
//! 1. Programmatic overrides (`ConfigLoader::set`)
//! 2. Environment variables (`<APP>_*` prefix, `__` as separator)
//! 3. Explicit files (`ConfigLoader::file`), later files win
//! 4. Project-level `.<app>/config.toml`
//! 5. User-level `<config dir>/<app>/config.toml`
//!
//! Option defaults are not merged in: they stay in the schema, so a loaded
//! config only stores what a source actually provided.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::ConfigError;
use crate::runtime::RuntimeConfig;
use crate::schema::Schema;

/// Builder for the figment provider chain of one application.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    app_name: String,
    env_prefix: String,
    files: Vec<PathBuf>,
    default_files: bool,
    overrides: Vec<(String, Value)>,
}

impl ConfigLoader {
    /// Loader for `app_name`; env prefix is the upper-cased name plus `_`.
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        let env_prefix = format!("{}_", app_name.to_uppercase().replace('-', "_"));
        Self {
            app_name,
            env_prefix,
            files: Vec::new(),
            default_files: true,
            overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    #[must_use]
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Merge an explicit TOML file; it must exist at load time.
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Skip the user-level and project-level config files.
    #[must_use]
    pub const fn without_default_files(mut self) -> Self {
        self.default_files = false;
        self
    }

    /// Override a dotted key (`runtime.worker_threads`) above every other source.
    pub fn set(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self, ConfigError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| ConfigError::Deserialize {
            attr: key.clone(),
            source,
        })?;
        self.overrides.push((key, value));
        Ok(self)
    }

    /// Path to the user-global config file.
    #[must_use]
    pub fn global_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(&self.app_name).join("config.toml"))
    }

    /// Path to the project-local config file, relative to the working directory.
    #[must_use]
    pub fn local_config_path(&self) -> PathBuf {
        PathBuf::from(format!(".{}", self.app_name)).join("config.toml")
    }

    /// Build the figment provider chain.
    ///
    /// Public so callers and tests can inspect it or add providers on top.
    pub fn figment(&self) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new();

        if self.default_files {
            if let Some(global_path) = self.global_config_path() {
                if global_path.exists() {
                    tracing::debug!(path = %global_path.display(), "merging user config");
                    figment = figment.merge(Toml::file(global_path));
                }
            }

            let local_path = self.local_config_path();
            if local_path.exists() {
                tracing::debug!(path = %local_path.display(), "merging project config");
                figment = figment.merge(Toml::file(local_path));
            }
        }

        for path in &self.files {
            ensure_exists(path)?;
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        for (key, value) in &self.overrides {
            figment = figment.merge(Serialized::default(key, value));
        }

        Ok(figment)
    }

    /// Load a config of `schema` from every source.
    ///
    /// # Errors
    ///
    /// `ConfigError::Figment` for unreadable sources, `TypeMismatch` when a
    /// source provides a value of the wrong type.
    pub fn load(&self, schema: &Arc<Schema>) -> Result<Config, ConfigError> {
        let values: Map<String, Value> = self.figment()?.extract()?;
        Config::with_values(Arc::clone(schema), values)
    }

    /// Like [`ConfigLoader::load`], loading `.env` from the working directory first.
    pub fn load_with_dotenv(&self, schema: &Arc<Schema>) -> Result<Config, ConfigError> {
        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                tracing::warn!(%error, "failed to load .env file");
            }
        }
        self.load(schema)
    }

    /// Extract the `[runtime]` section, filling in defaults.
    pub fn runtime(&self) -> Result<RuntimeConfig, ConfigError> {
        Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(self.figment()?.focus("runtime"))
            .extract()
            .map_err(ConfigError::from)
    }
}

fn ensure_exists(path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field: "config file".into(),
            reason: format!("{} does not exist", path.display()),
        })
    }
}
