//! Configuration validation
//!
//! This module provides validation logic for configuration files.

use crate::config::types::{Alias, Config};
use crate::error::{ConfigError, ConfigResult};
use std::collections::BTreeMap;

/// Largest accepted callback chunk size
pub const MAX_BUFSIZE: usize = 16 * 1024 * 1024;

/// Validate a complete configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    validate_bufsize("out-bufsize", config.defaults.out_bufsize)?;
    validate_bufsize("err-bufsize", config.defaults.err_bufsize)?;

    for (name, alias) in &config.aliases {
        validate_alias(name, alias)?;
    }

    detect_circular_aliases(&config.aliases)?;

    Ok(())
}

/// Validate a single alias
pub fn validate_alias(name: &str, alias: &Alias) -> ConfigResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!(
            "Invalid alias name '{}': must be non-empty and contain no whitespace",
            name
        )));
    }
    if alias.program().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Alias '{}' has an empty program",
            name
        )));
    }
    Ok(())
}

fn validate_bufsize(key: &str, size: Option<usize>) -> ConfigResult<()> {
    match size {
        Some(n) if n > MAX_BUFSIZE => Err(ConfigError::Invalid(format!(
            "{} must be at most {} bytes, got {}",
            key, MAX_BUFSIZE, n
        ))),
        _ => Ok(()),
    }
}

/// Detect aliases that eventually point back to themselves
pub fn detect_circular_aliases(aliases: &BTreeMap<String, Alias>) -> ConfigResult<()> {
    for name in aliases.keys() {
        alias_chain(aliases, name)?;
    }
    Ok(())
}

/// Follow an alias to its final program, returning the aliases walked
/// (outermost first)
///
/// An alias whose program has its own name (`ls: ls -la`) shadows that
/// program and ends the chain.
pub fn alias_chain<'a>(
    aliases: &'a BTreeMap<String, Alias>,
    name: &str,
) -> ConfigResult<Vec<(&'a str, &'a Alias)>> {
    let mut chain: Vec<(&str, &Alias)> = Vec::new();
    let mut current = name;

    while let Some((key, alias)) = aliases.get_key_value(current) {
        if chain.iter().any(|(seen, _)| *seen == key.as_str()) {
            let mut path: Vec<&str> = chain.iter().map(|(n, _)| *n).collect();
            path.push(key);
            return Err(ConfigError::CircularAlias(path.join(" -> ")));
        }
        chain.push((key.as_str(), alias));

        if alias.program() == key.as_str() {
            break;
        }
        current = alias.program();
    }

    Ok(chain)
}
