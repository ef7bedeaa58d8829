//! Process execution engine
//!
//! This module handles spawning programs and delivering their output in
//! sync, iterator, async and background modes.

pub mod callback;
pub mod command;
pub mod interpolate;
pub mod lines;
pub mod options;
pub mod output;
pub mod reader;
pub mod running;
pub mod shell;
pub mod stream;

// Re-export main types
pub use callback::*;
pub use command::*;
pub use interpolate::*;
pub use lines::OutputLines;
pub use options::*;
pub use output::*;
pub use reader::read_stream;
pub use running::{ProcessHandle, RunningCommand};
pub use shell::*;
pub use stream::*;

pub(crate) use running::status_code;
