//! Integration tests for configuration files and the command factory

mod common;

use common::{create_test_config, create_test_config_in_subdir};
use std::fs;
use xh::config::{find_config_file_from, load_config, parse_config_file, validate_config};
use xh::error::ConfigError;
use xh::{Xh, XhError};

const CONFIG: &str = r#"
defaults:
  new-session: false
  out-bufsize: 0
  env:
    XH_GREETING: hello
env-file: vars.env
log: info
aliases:
  greet:
    program: sh
    args: [-c, 'echo "$XH_GREETING $XH_NAME ${who}"']
    usage: Print a greeting
  hi: greet
"#;

#[test]
fn test_parse_full_config() {
    let (_dir, path) = create_test_config(CONFIG);
    let config = parse_config_file(&path).unwrap();

    validate_config(&config).unwrap();
    assert_eq!(config.defaults.new_session, Some(false));
    assert_eq!(config.env_file.as_deref(), Some("vars.env"));
    assert_eq!(config.log.as_deref(), Some("info"));
    assert_eq!(config.aliases.len(), 2);
}

#[test]
fn test_config_discovered_from_subdir() {
    let (_dir, path, sub_dir) = create_test_config_in_subdir(CONFIG);
    assert_eq!(find_config_file_from(sub_dir).unwrap(), path);
}

#[test]
fn test_factory_from_config_file() {
    let (dir, path) = create_test_config(CONFIG);
    fs::write(dir.path().join("vars.env"), "XH_NAME=world\n").unwrap();

    let (config, config_path) = load_config(Some(&path)).unwrap();
    let xh = Xh::from_config(&config, config_path.as_deref()).unwrap();

    let command = xh.cmd("hi");
    assert_eq!(command.program(), "sh");
    assert!(!command.new_session());
    assert!(command
        .get_envs()
        .contains(&("XH_NAME".to_string(), "world".to_string())));
    assert!(command
        .get_envs()
        .contains(&("XH_GREETING".to_string(), "hello".to_string())));
}

#[cfg(unix)]
#[test]
fn test_alias_runs_with_env_and_vars() {
    let (dir, path) = create_test_config(CONFIG);
    fs::write(dir.path().join("vars.env"), "XH_NAME=world\n").unwrap();

    let (config, config_path) = load_config(Some(&path)).unwrap();
    let mut xh = Xh::from_config(&config, config_path.as_deref()).unwrap();
    xh.set_var("who", "again");

    let output = xh.cmd("greet").run().unwrap();
    assert_eq!(output.trim(), "hello world again");
}

#[test]
fn test_missing_env_file_is_reported() {
    let (_dir, path) = create_test_config(CONFIG);
    let (config, config_path) = load_config(Some(&path)).unwrap();

    let result = Xh::from_config(&config, config_path.as_deref());
    assert!(matches!(
        result,
        Err(XhError::Config(ConfigError::EnvFile { .. }))
    ));
}

#[test]
fn test_circular_aliases_rejected() {
    let (_dir, path) = create_test_config(
        r#"
aliases:
  a: b --x
  b: c
  c: a
"#,
    );
    let config = parse_config_file(&path).unwrap();
    let result = validate_config(&config);
    assert!(matches!(result, Err(ConfigError::CircularAlias(ref p)) if p == "a -> b -> c -> a"));
}

#[test]
fn test_invalid_yaml_reported() {
    let (_dir, path) = create_test_config("aliases: [1, 2");
    assert!(matches!(parse_config_file(&path), Err(XhError::Yaml(_))));
}
