//! xh - run external programs as Rust values
//!
//! Any program name becomes a [`Command`](runner::Command). A command can be
//! run to completion, iterated line by line, streamed asynchronously, or
//! started in the background with output callbacks.
//!
//! ```no_run
//! let out = xh::cmd("echo").arg("hello").run()?;
//! assert_eq!(out.trim(), "hello");
//! # Ok::<(), xh::XhError>(())
//! ```

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod runner;

// Re-export commonly used types
pub use error::{Result, XhError};
pub use runner::{
    cmd, Buffering, Command, CommandOutput, Completion, Flow, Invocation, LineHandler,
    LineStream, Mode, OutputLines, ProcessHandle, RunOptions, RunningCommand, StdinHandle, Xh,
};

/// Current version of xh
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
