use std::sync::Arc;

use anyhow::Context;
use runway_config::{Config, ConfigLoader, OptionType, Schema};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::{ConfigCommands, GlobalFlags};
use crate::demo;
use crate::output::output;

/// Handle `runway config ...`.
pub fn handle(
    action: &ConfigCommands,
    flags: &GlobalFlags,
    loader: &ConfigLoader,
) -> anyhow::Result<()> {
    let schema = demo::schema()?;
    match action {
        ConfigCommands::Show { raw } => {
            let config = load(loader, &schema)?;
            let values = if *raw {
                config.data().clone()
            } else {
                config.resolved()
            };
            output(&values, flags.format)
        }
        ConfigCommands::Schema => output(&describe(&schema), flags.format),
        ConfigCommands::Check => check(loader, &schema, flags),
    }
}

fn load(loader: &ConfigLoader, schema: &Arc<Schema>) -> anyhow::Result<Config> {
    loader
        .load_with_dotenv(schema)
        .context("failed to load configuration")
}

/// One option as printed by `runway config schema`.
#[derive(Debug, Serialize)]
struct OptionSummary {
    attr: String,
    key: String,
    #[serde(rename = "type")]
    ty: String,
    default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<OptionSummary>,
}

fn describe(schema: &Schema) -> Vec<OptionSummary> {
    schema
        .options()
        .map(|option| {
            let options = match option.ty() {
                OptionType::Section(nested) => describe(nested),
                _ => Vec::new(),
            };
            OptionSummary {
                attr: option.attr().to_string(),
                key: option.name().to_string(),
                ty: option.ty().to_string(),
                default: option.default_value().ok(),
                doc: option.doc().map(str::to_string),
                options,
            }
        })
        .collect()
}

fn validate(loader: &ConfigLoader, schema: &Arc<Schema>) -> anyhow::Result<demo::DemoSettings> {
    let config = load(loader, schema)?;
    loader
        .runtime()
        .context("invalid [runtime] section")?;
    demo::DemoSettings::from_config(&config).context("invalid demo settings")
}

fn check(loader: &ConfigLoader, schema: &Arc<Schema>, flags: &GlobalFlags) -> anyhow::Result<()> {
    match validate(loader, schema) {
        Ok(settings) => output(
            &json!({
                "valid": true,
                "app": settings.name,
                "workers": settings.workers,
            }),
            flags.format,
        ),
        Err(error) => {
            output(
                &json!({
                    "valid": false,
                    "error": format!("{error:#}"),
                }),
                flags.format,
            )?;
            anyhow::bail!("configuration is invalid")
        }
    }
}
