//! Core configuration types
//!
//! This module defines the data structures that represent an xh.yml file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Defaults applied to every command created by the factory
    #[serde(default)]
    pub defaults: Defaults,

    /// Dotenv file whose variables are passed to every command
    #[serde(rename = "env-file", default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<String>,

    /// Default tracing filter for the CLI (e.g. "info", "xh=debug")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    /// Named shortcuts for programs with baked arguments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, Alias>,
}

/// Execution defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Defaults {
    /// Start children in their own process group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_session: Option<bool>,

    /// Callback buffering for stdout (0 unbuffered, 1 lines, N bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_bufsize: Option<usize>,

    /// Callback buffering for stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_bufsize: Option<usize>,

    /// Working directory, `${VAR}` references allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Extra environment variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// An alias definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Alias {
    /// Whitespace-separated command line, e.g. `git status --short`
    Simple(String),

    /// Full alias specification
    Detailed(AliasDetail),
}

/// Detailed alias specification
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AliasDetail {
    /// Program to run; may itself be another alias
    pub program: String,

    /// Arguments baked in front of call arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment variables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Working directory for this alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// One-line description shown by `xh aliases`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

impl Alias {
    /// Program this alias points to
    pub fn program(&self) -> &str {
        match self {
            Alias::Simple(line) => line.split_whitespace().next().unwrap_or(""),
            Alias::Detailed(detail) => &detail.program,
        }
    }

    /// Arguments baked into this alias
    pub fn args(&self) -> Vec<String> {
        match self {
            Alias::Simple(line) => line.split_whitespace().skip(1).map(String::from).collect(),
            Alias::Detailed(detail) => detail.args.clone(),
        }
    }

    pub fn env(&self) -> Option<&HashMap<String, String>> {
        match self {
            Alias::Simple(_) => None,
            Alias::Detailed(detail) => Some(&detail.env),
        }
    }

    pub fn cwd(&self) -> Option<&str> {
        match self {
            Alias::Simple(_) => None,
            Alias::Detailed(detail) => detail.cwd.as_deref(),
        }
    }

    pub fn usage(&self) -> Option<&str> {
        match self {
            Alias::Simple(_) => None,
            Alias::Detailed(detail) => detail.usage.as_deref(),
        }
    }

    /// Human-readable form used in listings
    pub fn describe(&self) -> String {
        let mut parts = vec![self.program().to_string()];
        parts.extend(self.args());
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(config.aliases.is_empty());
        assert!(config.defaults.new_session.is_none());
        assert!(config.env_file.is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let yaml = r#"
defaults:
  new-session: false
  out-bufsize: 0
  err-bufsize: 64
  cwd: /tmp
  env:
    LANG: C
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.defaults.new_session, Some(false));
        assert_eq!(config.defaults.out_bufsize, Some(0));
        assert_eq!(config.defaults.err_bufsize, Some(64));
        assert_eq!(config.defaults.cwd.as_deref(), Some("/tmp"));
        assert_eq!(config.defaults.env.get("LANG").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_deserialize_aliases() {
        let yaml = r#"
aliases:
  gs: git status --short
  ll:
    program: ls
    args: [-l, -a]
    usage: Long listing
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        let gs = config.aliases.get("gs").unwrap();
        assert_eq!(gs.program(), "git");
        assert_eq!(gs.args(), vec!["status", "--short"]);

        let ll = config.aliases.get("ll").unwrap();
        assert_eq!(ll.program(), "ls");
        assert_eq!(ll.args(), vec!["-l", "-a"]);
        assert_eq!(ll.usage(), Some("Long listing"));
        assert_eq!(ll.describe(), "ls -l -a");
    }
}
