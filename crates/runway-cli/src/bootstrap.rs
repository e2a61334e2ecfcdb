use anyhow::Context;
use runway_config::ConfigLoader;
use serde_json::Value;

use crate::cli::GlobalFlags;

/// Build the config loader described by the global flags.
pub fn loader(flags: &GlobalFlags) -> anyhow::Result<ConfigLoader> {
    let mut loader = ConfigLoader::new(&flags.app_name);
    for path in &flags.config_files {
        loader = loader.file(path);
    }
    for raw in &flags.overrides {
        let (key, value) = parse_override(raw)?;
        loader = loader
            .set(key, value)
            .with_context(|| format!("invalid --set value '{raw}'"))?;
    }
    Ok(loader)
}

/// Split `key=value`; the value is read as JSON and falls back to a string.
fn parse_override(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("invalid --set '{raw}': expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("invalid --set '{raw}': key is empty");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
