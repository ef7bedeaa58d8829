//! Command factory
//!
//! [`Xh`] turns names into [`Command`]s. Names that match a configured alias
//! expand to the aliased program with its baked arguments; any other name is
//! used as the program itself.

use crate::config::{alias_chain, load_env_file, validate_alias, validate_config, Alias, Config};
use crate::error::{ConfigResult, Result};
use crate::runner::{interpolate, interpolate_list, interpolate_strict, Buffering, Command};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Builds commands with shared defaults and aliases
#[derive(Debug, Clone)]
pub struct Xh {
    new_session: bool,
    out_buffering: Buffering,
    err_buffering: Buffering,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    aliases: BTreeMap<String, Alias>,
    vars: HashMap<String, String>,
}

impl Xh {
    pub fn new() -> Self {
        Xh {
            new_session: true,
            out_buffering: Buffering::Line,
            err_buffering: Buffering::Line,
            cwd: None,
            env: Vec::new(),
            aliases: BTreeMap::new(),
            vars: HashMap::new(),
        }
    }

    /// Build a factory from a parsed configuration
    ///
    /// `config_path` is used to resolve a relative `env-file`.
    pub fn from_config(config: &Config, config_path: Option<&Path>) -> Result<Self> {
        validate_config(config)?;

        let defaults = &config.defaults;
        let mut xh = Xh::new()
            .with_new_session(defaults.new_session.unwrap_or(true))
            .with_buffering(
                defaults.out_bufsize.map_or(Buffering::Line, Buffering::from_size),
                defaults.err_bufsize.map_or(Buffering::Line, Buffering::from_size),
            );

        for (key, value) in load_env_file(config, config_path)? {
            xh = xh.with_env(key, value);
        }
        let mut env: Vec<_> = defaults.env.iter().collect();
        env.sort();
        for (key, value) in env {
            let value = interpolate(value, &xh.vars)?;
            xh = xh.with_env(key.clone(), value);
        }

        // An unresolved variable would leave a literal `${..}` directory
        if let Some(cwd) = &defaults.cwd {
            let cwd = interpolate_strict(cwd, &xh.vars)?;
            xh = xh.with_cwd(cwd);
        }

        xh.aliases = config.aliases.clone();
        debug!(aliases = xh.aliases.len(), env = xh.env.len(), "factory configured");
        Ok(xh)
    }

    pub fn with_new_session(mut self, enabled: bool) -> Self {
        self.new_session = enabled;
        self
    }

    pub fn with_buffering(mut self, out: Buffering, err: Buffering) -> Self {
        self.out_buffering = out;
        self.err_buffering = err;
        self
    }

    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Add or replace an alias
    pub fn with_alias(mut self, name: impl Into<String>, alias: Alias) -> ConfigResult<Self> {
        let name = name.into();
        validate_alias(&name, &alias)?;
        let previous = self.aliases.insert(name.clone(), alias);
        let checked = alias_chain(&self.aliases, &name).map(|_| ());
        if let Err(e) = checked {
            match previous {
                Some(old) => self.aliases.insert(name, old),
                None => self.aliases.remove(&name),
            };
            return Err(e);
        }
        Ok(self)
    }

    /// Variable available to `${name}` references in alias arguments
    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn aliases(&self) -> &BTreeMap<String, Alias> {
        &self.aliases
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Resolve a name to a command, failing on alias cycles
    pub fn resolve(&self, name: &str) -> Result<Command> {
        let chain = alias_chain(&self.aliases, name)?;

        let program = chain
            .last()
            .map(|(_, alias)| alias.program())
            .unwrap_or(name);
        let mut command = self.base(program);

        // Innermost alias binds its arguments first
        for (alias_name, alias) in chain.iter().rev() {
            let args = interpolate_list(&alias.args(), &self.vars)?;
            command = command.args(args);

            if let Some(env) = alias.env() {
                let mut env: Vec<_> = env.iter().collect();
                env.sort();
                for (key, value) in env {
                    command = command.env(key.clone(), interpolate(value, &self.vars)?);
                }
            }
            if let Some(dir) = alias.cwd() {
                command = command.current_dir(interpolate(dir, &self.vars)?);
            }
            debug!(alias = %alias_name, "expanded alias");
        }

        Ok(command)
    }

    /// Command for `name`
    ///
    /// Aliases are expanded. A broken alias falls back to using `name` as
    /// the program; use [`resolve`](Self::resolve) to see the error instead.
    pub fn cmd(&self, name: &str) -> Command {
        match self.resolve(name) {
            Ok(command) => command,
            Err(e) => {
                warn!(name, "alias resolution failed, running as program: {}", e);
                self.base(name)
            }
        }
    }

    fn base(&self, program: &str) -> Command {
        let mut command = Command::new(program)
            .with_new_session(self.new_session)
            .with_buffering(self.out_buffering, self.err_buffering)
            .envs(self.env.iter().cloned());
        if let Some(dir) = &self.cwd {
            command = command.current_dir(dir);
        }
        command
    }
}

impl Default for Xh {
    fn default() -> Self {
        Self::new()
    }
}

/// Command for `name` using a default factory
pub fn cmd(name: &str) -> Command {
    Xh::new().cmd(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, AliasDetail};
    use crate::error::{ConfigError, InterpolationError, XhError};

    #[test]
    fn test_plain_name_is_program() {
        let command = Xh::new().cmd("python");
        assert_eq!(command.program(), "python");
        assert!(command.get_args().is_empty());
        assert!(command.new_session());
    }

    #[test]
    fn test_free_function() {
        assert_eq!(cmd("ls").program(), "ls");
    }

    #[test]
    fn test_alias_chain_expands_inner_first() {
        let config = parse_config(
            r#"
aliases:
  gs: git status
  st: gs --short
"#,
        )
        .unwrap();
        let xh = Xh::from_config(&config, None).unwrap();

        let command = xh.cmd("st");
        assert_eq!(command.program(), "git");
        assert_eq!(command.get_args(), &["status", "--short"]);
    }

    #[test]
    fn test_self_named_alias() {
        let xh = Xh::new()
            .with_alias("ls", Alias::Simple("ls -la".to_string()))
            .unwrap();
        let command = xh.cmd("ls");
        assert_eq!(command.program(), "ls");
        assert_eq!(command.get_args(), &["-la"]);
    }

    #[test]
    fn test_alias_args_are_interpolated() {
        let mut xh = Xh::new()
            .with_alias(
                "co",
                Alias::Detailed(AliasDetail {
                    program: "git".to_string(),
                    args: vec!["checkout".to_string(), "${branch}".to_string()],
                    env: HashMap::from([("GIT_PAGER".to_string(), "cat".to_string())]),
                    cwd: Some("/tmp".to_string()),
                    usage: None,
                }),
            )
            .unwrap();
        xh.set_var("branch", "main");

        let command = xh.cmd("co");
        assert_eq!(command.get_args(), &["checkout", "main"]);
        assert_eq!(
            command.get_envs(),
            &[("GIT_PAGER".to_string(), "cat".to_string())]
        );
        assert_eq!(command.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_with_alias_rejects_cycle_and_restores() {
        let xh = Xh::new()
            .with_alias("a", Alias::Simple("git".to_string()))
            .unwrap()
            .with_alias("b", Alias::Simple("a".to_string()))
            .unwrap();

        let result = xh.clone().with_alias("a", Alias::Simple("b".to_string()));
        assert!(matches!(result, Err(ConfigError::CircularAlias(_))));
        assert_eq!(xh.cmd("b").program(), "git");
    }

    #[test]
    fn test_from_config_rejects_cycles() {
        let config = parse_config(
            r#"
aliases:
  a: b
  b: a
"#,
        )
        .unwrap();
        let result = Xh::from_config(&config, None);
        assert!(matches!(
            result,
            Err(XhError::Config(ConfigError::CircularAlias(_)))
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse_config(
            r#"
defaults:
  new-session: false
  out-bufsize: 0
  cwd: /tmp
  env:
    XH_A: "1"
"#,
        )
        .unwrap();
        let xh = Xh::from_config(&config, None).unwrap();
        let command = xh.cmd("env");

        assert!(!command.new_session());
        assert_eq!(command.get_current_dir(), Some(Path::new("/tmp")));
        assert_eq!(command.get_envs(), &[("XH_A".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_default_cwd_requires_defined_variables() {
        let config = parse_config(
            r#"
defaults:
  cwd: "${XH_SURELY_UNDEFINED_DIR}/work"
"#,
        )
        .unwrap();
        let result = Xh::from_config(&config, None);
        assert!(matches!(
            result,
            Err(XhError::Interpolation(InterpolationError::UndefinedVariable(ref name)))
                if name == "XH_SURELY_UNDEFINED_DIR"
        ));
    }
}
