//! Configuration file loading.

use std::fs;
use std::path::Path;

use anyhow::Context;

use docdelta_types::DiffConfig;

/// Load the diff configuration from an optional TOML file, then apply the
/// command-line override.
pub fn load(path: Option<&Path>, identity_field: Option<&str>) -> anyhow::Result<DiffConfig> {
    let mut config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DiffConfig::default(),
    };
    if let Some(field) = identity_field {
        config.identity_field = field.to_string();
    }
    Ok(config)
}
