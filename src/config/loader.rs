//! Config loading: defaults, overlaid by a file, overlaid by environment
//! variables of the form `SWARMKEEP_<SECTION>__<KEY>`.

use super::schema::Config;
#[cfg(test)]
use super::schema::SandboxConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Returns the platform-appropriate default config file path, if one exists
/// on disk. Does not create it.
pub fn default_config_path() -> Option<PathBuf> {
    let dir = dirs::config_dir()?.join("swarmkeep");
    let path = dir.join("config.toml");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Loads configuration from an explicit path, falling back to defaults when
/// `path` is `None`. Applies environment overrides afterward.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config = match path.map(|p| p.to_path_buf()).or_else(default_config_path) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&text)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config);

    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

/// Overlays every `SWARMKEEP_<SECTION>__<KEY>` environment variable onto
/// the matching scalar leaf of `config` (e.g. `SWARMKEEP_AGENT__TURN_CAP`
/// onto `config.agent.turn_cap`), covering every `[section]` table in the
/// schema rather than a fixed list. Round-trips `config` through a
/// `toml::Value` so each override lands on the right type (bool, int,
/// float, or string) without hand-written per-field parsing; a var naming
/// an unknown section/key, or one that would produce a value the schema
/// can't deserialize (e.g. a scalar onto a list/map field such as
/// `pool_caps`), is silently skipped and leaves that field at its prior
/// value.
fn apply_env_overrides(config: &mut Config) {
    let Ok(mut value) = toml::Value::try_from(&*config) else {
        return;
    };

    for (key, raw) in std::env::vars() {
        let Some(rest) = key.strip_prefix("SWARMKEEP_") else {
            continue;
        };
        let Some((section, field)) = rest.split_once("__") else {
            continue;
        };
        let Some(table) = value.get_mut(section.to_lowercase()).and_then(|v| v.as_table_mut()) else {
            continue;
        };
        table.insert(field.to_lowercase(), parse_env_scalar(&raw));
    }

    if let Ok(merged) = value.try_into() {
        *config = merged;
    }
}

/// Parses a raw environment value into the most specific TOML scalar it
/// looks like, falling back to a string — mirrors how `toml::from_str`
/// would have typed the same literal had it come from a config file.
fn parse_env_scalar(raw: &str) -> toml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        toml::Value::Boolean(b)
    } else if let Ok(i) = raw.parse::<i64>() {
        toml::Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        toml::Value::Float(f)
    } else {
        toml::Value::String(raw.to_string())
    }
}
