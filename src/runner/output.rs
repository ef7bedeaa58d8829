//! Result of a synchronous run

use crate::error::{ExecutionError, ExecutionResult};
use std::fmt;
use std::ops::Deref;

/// Collected output of a finished command
///
/// Dereferences to the captured stdout so it can be used wherever a `&str`
/// is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub program: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit code into an error
    pub fn check(self) -> ExecutionResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ExecutionError::NonZeroExit {
                program: self.program,
                code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }

    /// Stdout split into lines without their terminators
    pub fn lines(&self) -> std::str::Lines<'_> {
        self.stdout.lines()
    }
}

impl Deref for CommandOutput {
    type Target = str;

    fn deref(&self) -> &str {
        &self.stdout
    }
}

impl AsRef<str> for CommandOutput {
    fn as_ref(&self) -> &str {
        &self.stdout
    }
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, code: i32) -> CommandOutput {
        CommandOutput {
            program: "prog".to_string(),
            stdout: stdout.to_string(),
            stderr: "boom".to_string(),
            exit_code: code,
        }
    }

    #[test]
    fn test_behaves_like_str() {
        let out = output("hello\n", 0);
        assert_eq!(out.trim(), "hello");
        assert!(out.contains("hell"));
        assert_eq!(out.to_string(), "hello\n");
        assert!(format!("{:?}", out).contains("hello"));
    }

    #[test]
    fn test_check() {
        assert!(output("", 0).check().is_ok());

        let err = output("", 4).check().unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExit { code: 4, .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_lines() {
        let out = output("a\nb\n", 0);
        assert_eq!(out.lines().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
