//! Error types for xh

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for xh operations
pub type Result<T> = std::result::Result<T, XhError>;

/// Main error type for xh
#[derive(Error, Debug)]
pub enum XhError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Process execution errors
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Variable interpolation errors
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Alias '{0}' is not defined")]
    UnknownAlias(String),

    #[error("Circular alias detected: {0}")]
    CircularAlias(String),

    #[error("Failed to load env file '{path}': {error}")]
    EnvFile { path: PathBuf, error: String },
}

/// Process execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' exited with code {code}{}", stderr_suffix(.stderr))]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Pipe error: {0}")]
    Io(String),

    #[error("Wait error: {0}")]
    Wait(String),

    #[error("{0} reader thread panicked")]
    ThreadPanicked(&'static str),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Variable interpolation errors
#[derive(Error, Debug)]
pub enum InterpolationError {
    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Recursive interpolation detected")]
    RecursiveInterpolation,
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Specialized result type for interpolation operations
pub type InterpolationResult<T> = std::result::Result<T, InterpolationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_message_includes_stderr() {
        let err = ExecutionError::NonZeroExit {
            program: "ls".to_string(),
            code: 2,
            stderr: "no such file\n".to_string(),
        };
        assert_eq!(err.to_string(), "'ls' exited with code 2: no such file");
    }

    #[test]
    fn test_non_zero_exit_message_without_stderr() {
        let err = ExecutionError::NonZeroExit {
            program: "false".to_string(),
            code: 1,
            stderr: String::new(),
        };
        assert_eq!(err.to_string(), "'false' exited with code 1");
    }

    #[test]
    fn test_config_error_converts() {
        let err: XhError = ConfigError::UnknownAlias("gs".to_string()).into();
        assert!(matches!(err, XhError::Config(ConfigError::UnknownAlias(_))));
    }
}
