//! Output and completion callbacks
//!
//! Callbacks come in three shapes depending on how much of the process they
//! need to see: the line alone, the line plus the child's stdin, or the line
//! plus stdin plus a handle to the process itself.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::ProcessHandle;
use std::fmt;
use std::io::Write;
use std::process::ChildStdin;
use std::sync::{Arc, Mutex, PoisonError};

/// What a callback wants the reader to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
}

impl From<()> for Flow {
    fn from(_: ()) -> Self {
        Flow::Continue
    }
}

/// `true` stops reading, `false` keeps going
impl From<bool> for Flow {
    fn from(stop: bool) -> Self {
        if stop {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

type LineFn = Box<dyn FnMut(&str) -> Flow + Send>;
type InteractiveFn = Box<dyn FnMut(&str, &StdinHandle) -> Flow + Send>;
type FullFn = Box<dyn FnMut(&str, &StdinHandle, &ProcessHandle) -> Flow + Send>;

/// Callback invoked for each piece of output read from a stream
pub enum LineHandler {
    /// `callback(line)`
    Line(LineFn),
    /// `callback(line, stdin)`
    Interactive(InteractiveFn),
    /// `callback(line, stdin, process)`
    Full(FullFn),
}

impl LineHandler {
    pub fn line<F, R>(mut f: F) -> Self
    where
        F: FnMut(&str) -> R + Send + 'static,
        R: Into<Flow>,
    {
        LineHandler::Line(Box::new(move |line| f(line).into()))
    }

    pub fn interactive<F, R>(mut f: F) -> Self
    where
        F: FnMut(&str, &StdinHandle) -> R + Send + 'static,
        R: Into<Flow>,
    {
        LineHandler::Interactive(Box::new(move |line, stdin| f(line, stdin).into()))
    }

    pub fn full<F, R>(mut f: F) -> Self
    where
        F: FnMut(&str, &StdinHandle, &ProcessHandle) -> R + Send + 'static,
        R: Into<Flow>,
    {
        LineHandler::Full(Box::new(move |line, stdin, process| {
            f(line, stdin, process).into()
        }))
    }

    /// Dispatch one piece of output according to the callback's arity
    pub fn call(&mut self, line: &str, stdin: &StdinHandle, process: &ProcessHandle) -> Flow {
        match self {
            LineHandler::Line(f) => f(line),
            LineHandler::Interactive(f) => f(line, stdin),
            LineHandler::Full(f) => f(line, stdin, process),
        }
    }

    /// Number of parameters the callback takes
    pub fn arity(&self) -> usize {
        match self {
            LineHandler::Line(_) => 1,
            LineHandler::Interactive(_) => 2,
            LineHandler::Full(_) => 3,
        }
    }
}

impl fmt::Debug for LineHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineHandler(arity={})", self.arity())
    }
}

/// Summary passed to the done callback once the process has exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub pid: Option<u32>,
    pub success: bool,
    pub exit_code: i32,
}

impl Completion {
    pub fn new(pid: Option<u32>, exit_code: i32) -> Self {
        Completion {
            pid,
            success: exit_code == 0,
            exit_code,
        }
    }
}

/// Callback invoked exactly once when the process terminates
pub struct DoneHandler(Box<dyn FnOnce(Completion) + Send>);

impl DoneHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        DoneHandler(Box::new(f))
    }

    pub fn call(self, completion: Completion) {
        (self.0)(completion)
    }
}

impl fmt::Debug for DoneHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DoneHandler")
    }
}

/// Shared, writable access to a child's stdin
///
/// Cloning is cheap; all clones refer to the same pipe. Once closed, writes
/// fail with [`ExecutionError::Io`].
#[derive(Clone, Default)]
pub struct StdinHandle {
    inner: Arc<Mutex<Option<ChildStdin>>>,
}

impl StdinHandle {
    pub fn new(stdin: Option<ChildStdin>) -> Self {
        StdinHandle {
            inner: Arc::new(Mutex::new(stdin)),
        }
    }

    pub fn write(&self, data: &[u8]) -> ExecutionResult<()> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let stdin = guard
            .as_mut()
            .ok_or_else(|| ExecutionError::Io("stdin is closed".to_string()))?;
        stdin
            .write_all(data)
            .and_then(|_| stdin.flush())
            .map_err(|e| ExecutionError::Io(e.to_string()))
    }

    /// Write `line` followed by a newline
    pub fn write_line(&self, line: &str) -> ExecutionResult<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.write(&data)
    }

    /// Close the pipe so the child sees EOF
    pub fn close(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Take the pipe out of the handle, leaving it closed for other clones
    pub(crate) fn take(&self) -> Option<ChildStdin> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_open(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for StdinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdinHandle")
            .field("open", &self.is_open())
            .finish()
    }
}
