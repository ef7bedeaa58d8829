//! Iterator mode

use crate::runner::reader::{decode, trim_newline};
use crate::runner::{status_code, Completion, DoneHandler};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStdout};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Blocking iterator over the stdout lines of a running command
///
/// Stderr is drained on a helper thread so the child never blocks on it.
/// When stdout is exhausted the process is reaped and the done callback
/// runs. Dropping the iterator early kills the child.
#[derive(Debug)]
pub struct OutputLines {
    program: String,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_reader: Option<JoinHandle<Vec<u8>>>,
    stderr: String,
    done: Option<DoneHandler>,
    exit_code: Option<i32>,
}

impl OutputLines {
    pub(crate) fn new(
        program: String,
        mut child: Child,
        stderr_reader: Option<JoinHandle<Vec<u8>>>,
        done: Option<DoneHandler>,
    ) -> Self {
        let stdout = child.stdout.take().map(BufReader::new);
        OutputLines {
            program,
            child,
            stdout,
            stderr_reader,
            stderr: String::new(),
            done,
            exit_code: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Exit code, available once the iterator is exhausted
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Captured stderr, available once the iterator is exhausted
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    fn finish(&mut self) {
        self.stdout = None;
        if let Some(reader) = self.stderr_reader.take() {
            match reader.join() {
                Ok(bytes) => self.stderr = decode(bytes),
                Err(_) => warn!(program = %self.program, "stderr reader panicked"),
            }
        }

        let code = match self.child.wait() {
            Ok(status) => status_code(status),
            Err(e) => {
                warn!(program = %self.program, "wait failed: {}", e);
                -1
            }
        };
        self.exit_code = Some(code);
        debug!(program = %self.program, code, "iterated process exited");

        if let Some(done) = self.done.take() {
            done.call(Completion::new(Some(self.child.id()), code));
        }
    }
}

impl Iterator for OutputLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let stdout = self.stdout.as_mut()?;
        let mut buf = Vec::new();
        match stdout.read_until(b'\n', &mut buf) {
            Ok(0) => {
                self.finish();
                None
            }
            Ok(_) => Some(String::from_utf8_lossy(trim_newline(&buf)).into_owned()),
            Err(e) => {
                warn!(program = %self.program, "stdout read failed: {}", e);
                self.finish();
                None
            }
        }
    }
}

impl Drop for OutputLines {
    fn drop(&mut self) {
        if self.exit_code.is_none() {
            self.stdout = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
            debug!(program = %self.program, "iterator dropped before exhaustion, child killed");
        }
    }
}

/// Read a whole stream on a helper thread
pub(crate) fn drain<R>(name: String, stream: R) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let mut stream = stream;
            let mut buf = Vec::new();
            if let Err(e) = stream.read_to_end(&mut buf) {
                warn!(thread = %name, "drain failed: {}", e);
            }
            buf
        })
        .map_err(|e| warn!("failed to start drain thread: {}", e))
        .ok()
}
