//! Per-call execution options

use crate::runner::{Completion, DoneHandler, LineHandler};

/// How a command is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Wait for completion and collect stdout/stderr
    #[default]
    Sync,
    /// Yield stdout lines through a blocking iterator
    Iter,
    /// Yield stdout lines through an async stream
    Async,
    /// Return immediately; output goes to callbacks
    Background,
}

/// How output is cut into pieces before it reaches a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Buffering {
    /// Every OS read is delivered as-is
    Unbuffered,
    /// One line at a time, without the trailing newline
    #[default]
    Line,
    /// Fixed-size chunks; the last one may be shorter
    Chunk(usize),
}

impl Buffering {
    /// `0` is unbuffered, `1` is line buffered, anything larger is a chunk size
    pub fn from_size(size: usize) -> Self {
        match size {
            0 => Buffering::Unbuffered,
            1 => Buffering::Line,
            n => Buffering::Chunk(n),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Buffering::Unbuffered => 0,
            Buffering::Line => 1,
            Buffering::Chunk(n) => *n,
        }
    }
}

/// Options for a single invocation
#[derive(Debug, Default)]
pub struct RunOptions {
    pub mode: Mode,
    pub out: Option<LineHandler>,
    pub err: Option<LineHandler>,
    pub done: Option<DoneHandler>,
    /// `None` falls back to the factory default (which is `true`)
    pub new_session: Option<bool>,
    pub out_buffering: Option<Buffering>,
    pub err_buffering: Option<Buffering>,
    /// Bytes written to stdin before it is closed
    pub input: Option<Vec<u8>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn background(self) -> Self {
        self.mode(Mode::Background)
    }

    pub fn on_out(mut self, handler: LineHandler) -> Self {
        self.out = Some(handler);
        self
    }

    pub fn on_err(mut self, handler: LineHandler) -> Self {
        self.err = Some(handler);
        self
    }

    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        self.done = Some(DoneHandler::new(f));
        self
    }

    pub fn new_session(mut self, enabled: bool) -> Self {
        self.new_session = Some(enabled);
        self
    }

    pub fn out_bufsize(mut self, size: usize) -> Self {
        self.out_buffering = Some(Buffering::from_size(size));
        self
    }

    pub fn err_bufsize(mut self, size: usize) -> Self {
        self.err_buffering = Some(Buffering::from_size(size));
        self
    }

    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffering_from_size() {
        assert_eq!(Buffering::from_size(0), Buffering::Unbuffered);
        assert_eq!(Buffering::from_size(1), Buffering::Line);
        assert_eq!(Buffering::from_size(64), Buffering::Chunk(64));
        assert_eq!(Buffering::Chunk(64).size(), 64);
    }

    #[test]
    fn test_defaults() {
        let opts = RunOptions::new();
        assert_eq!(opts.mode, Mode::Sync);
        assert!(opts.new_session.is_none());
        assert!(opts.out.is_none());
        assert!(opts.done.is_none());
    }

    #[test]
    fn test_builder() {
        let opts = RunOptions::new()
            .background()
            .new_session(false)
            .out_bufsize(0)
            .input("data");
        assert_eq!(opts.mode, Mode::Background);
        assert_eq!(opts.new_session, Some(false));
        assert_eq!(opts.out_buffering, Some(Buffering::Unbuffered));
        assert_eq!(opts.input.as_deref(), Some(&b"data"[..]));
    }
}
