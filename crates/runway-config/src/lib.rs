//! # runway-config
//!
//! Typed, layered configuration for runway applications.
//!
//! A [`Schema`] declares options (type, default, doc, key name); a
//! [`Config`] stores values and checks them against the schema on every
//! checked write. [`ChainConfig`] looks values up across several configs and
//! [`ConfigLoader`] fills a config from TOML files and environment variables
//! through figment.
//!
//! # Usage
//!
//! ```
//! use runway_config::{Config, Opt, OptionType, Schema};
//!
//! let schema = Schema::builder("MyConfig")
//!     .option(Opt::new("name").ty(OptionType::String).default("foo"))
//!     .build()
//!     .expect("schema");
//!
//! let mut config = Config::new(schema);
//! assert_eq!(config.get("name").unwrap(), "foo");
//!
//! config.set("name", "bar").unwrap();
//! assert!(config.set("name", 42).is_err());
//! ```

mod chain;
mod config;
mod error;
mod kind;
mod loader;
mod runtime;
mod schema;

pub use chain::ChainConfig;
pub use config::Config;
pub use error::ConfigError;
pub use kind::{OptionType, value_kind};
pub use loader::ConfigLoader;
pub use runtime::RuntimeConfig;
pub use schema::{Opt, OptionDef, Schema, SchemaBuilder};
