//! Background process handle
//!
//! A [`RunningCommand`] owns a child process started in background mode
//! together with the threads that feed its output to callbacks.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{read_stream, Buffering, Completion, DoneHandler, LineHandler, StdinHandle};
use std::io::{Read, Write};
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Convert an exit status to a plain code
///
/// On unix a process killed by a signal reports `-signal`.
pub(crate) fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Cloneable handle used to signal a running child
#[derive(Clone, Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Option<Arc<Mutex<Child>>>,
}

impl ProcessHandle {
    pub(crate) fn new(child: Child) -> Self {
        ProcessHandle {
            pid: Some(child.id()),
            child: Some(Arc::new(Mutex::new(child))),
        }
    }

    /// A handle that is not attached to any process
    pub fn detached() -> Self {
        ProcessHandle {
            pid: None,
            child: None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn lock(&self) -> Option<MutexGuard<'_, Child>> {
        self.child
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Forcefully kill the process (SIGKILL on unix)
    pub fn kill(&self) -> ExecutionResult<()> {
        let Some(mut child) = self.lock() else {
            return Ok(());
        };
        if exited(&mut child)? {
            return Ok(());
        }
        debug!(pid = ?self.pid, "killing process");
        child
            .kill()
            .map_err(|e| ExecutionError::Wait(format!("kill failed: {}", e)))
    }

    /// Ask the process to exit (SIGTERM on unix, kill elsewhere)
    pub fn terminate(&self) -> ExecutionResult<()> {
        let Some(mut child) = self.lock() else {
            return Ok(());
        };
        if exited(&mut child)? {
            return Ok(());
        }
        debug!(pid = ?self.pid, "terminating process");
        terminate_child(&mut child)
    }

    /// Whether the process has not yet exited
    pub fn is_running(&self) -> bool {
        match self.lock() {
            Some(mut child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Block until the process exits, polling so the lock is never held
    /// across the whole wait
    pub(crate) fn wait(&self) -> ExecutionResult<i32> {
        loop {
            {
                let Some(mut child) = self.lock() else {
                    return Err(ExecutionError::Wait("no process attached".to_string()));
                };
                if let Some(status) = child
                    .try_wait()
                    .map_err(|e| ExecutionError::Wait(e.to_string()))?
                {
                    return Ok(status_code(status));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn exited(child: &mut Child) -> ExecutionResult<bool> {
    child
        .try_wait()
        .map(|status| status.is_some())
        .map_err(|e| ExecutionError::Wait(e.to_string()))
}

#[cfg(unix)]
fn terminate_child(child: &mut Child) -> ExecutionResult<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    match signal::kill(pid, Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(ExecutionError::Wait(format!("SIGTERM failed: {}", e))),
    }
}

#[cfg(not(unix))]
fn terminate_child(child: &mut Child) -> ExecutionResult<()> {
    child
        .kill()
        .map_err(|e| ExecutionError::Wait(format!("kill failed: {}", e)))
}

/// Output of a stream that had no callback attached
type Captured = Arc<Mutex<Vec<u8>>>;

/// A command running in the background
#[derive(Debug)]
pub struct RunningCommand {
    program: String,
    process: ProcessHandle,
    stdin: StdinHandle,
    readers: Vec<(&'static str, JoinHandle<()>)>,
    captured_stdout: Captured,
    captured_stderr: Captured,
    done: Option<DoneHandler>,
    exit_code: Option<i32>,
}

/// Settings for one output stream of a background command
pub(crate) struct StreamSetup {
    pub handler: Option<LineHandler>,
    pub buffering: Buffering,
}

impl RunningCommand {
    /// Take ownership of a freshly spawned child and start its reader threads
    pub(crate) fn start(
        program: String,
        mut child: Child,
        out: StreamSetup,
        err: StreamSetup,
        done: Option<DoneHandler>,
        input: Option<Vec<u8>>,
    ) -> ExecutionResult<Self> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = StdinHandle::new(child.stdin.take());
        let process = ProcessHandle::new(child);

        let mut running = RunningCommand {
            program,
            process,
            stdin,
            readers: Vec::new(),
            captured_stdout: Arc::default(),
            captured_stderr: Arc::default(),
            done,
            exit_code: None,
        };

        // Interactive callbacks keep writing after the initial input
        let keeps_stdin = [&out.handler, &err.handler]
            .into_iter()
            .flatten()
            .any(|handler| handler.arity() > 1);

        if let Some(stdout) = stdout {
            let captured = Arc::clone(&running.captured_stdout);
            running.spawn_reader("stdout", stdout, out, captured)?;
        }
        if let Some(stderr) = stderr {
            let captured = Arc::clone(&running.captured_stderr);
            running.spawn_reader("stderr", stderr, err, captured)?;
        }

        if let Some(data) = input {
            running.spawn_writer(data, keeps_stdin)?;
        }

        debug!(program = %running.program, pid = ?running.pid(), "started in background");
        Ok(running)
    }

    fn spawn_reader<R>(
        &mut self,
        name: &'static str,
        stream: R,
        setup: StreamSetup,
        captured: Captured,
    ) -> ExecutionResult<()>
    where
        R: Read + Send + 'static,
    {
        let stdin = self.stdin.clone();
        let process = self.process.clone();
        let program = self.program.clone();

        let handle = thread::Builder::new()
            .name(format!("xh-{}-{}", program, name))
            .spawn(move || {
                let result = match setup.handler {
                    Some(mut handler) => read_stream(stream, setup.buffering, |line| {
                        handler.call(line, &stdin, &process)
                    }),
                    None => {
                        let mut stream = stream;
                        let mut buf = Vec::new();
                        let result = stream.read_to_end(&mut buf).map(|_| ());
                        captured
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .extend_from_slice(&buf);
                        result
                    }
                };
                match result {
                    Ok(()) => debug!(program = %program, stream = name, "reader finished"),
                    Err(e) => warn!(program = %program, stream = name, "reader failed: {}", e),
                }
            })
            .map_err(|e| ExecutionError::Io(format!("failed to start {} reader: {}", name, e)))?;

        self.readers.push((name, handle));
        Ok(())
    }

    /// Feed `data` to stdin without blocking the caller
    ///
    /// Unless `keep_open` is set the pipe is closed once the data is written.
    fn spawn_writer(&mut self, data: Vec<u8>, keep_open: bool) -> ExecutionResult<()> {
        let stdin = self.stdin.clone();
        let program = self.program.clone();

        let handle = thread::Builder::new()
            .name(format!("xh-{}-stdin", program))
            .spawn(move || {
                let result = if keep_open {
                    stdin.write(&data)
                } else {
                    match stdin.take() {
                        Some(mut pipe) => pipe
                            .write_all(&data)
                            .map_err(|e| ExecutionError::Io(e.to_string())),
                        None => Ok(()),
                    }
                };
                if let Err(e) = result {
                    debug!(program = %program, "stdin write failed: {}", e);
                }
            })
            .map_err(|e| ExecutionError::Io(format!("failed to start stdin writer: {}", e)))?;

        self.readers.push(("stdin", handle));
        Ok(())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    /// Handle usable from other threads to kill or terminate the process
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    pub fn stdin(&self) -> &StdinHandle {
        &self.stdin
    }

    /// Wait for the output readers and the process, then run the done callback
    ///
    /// Returns the exit code. Calling it again returns the same code without
    /// invoking the callback a second time.
    pub fn wait(&mut self) -> ExecutionResult<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }

        let mut panicked = None;
        for (name, reader) in self.readers.drain(..) {
            if reader.join().is_err() {
                panicked.get_or_insert(name);
            }
        }
        self.stdin.close();

        let code = self.process.wait()?;
        self.exit_code = Some(code);
        debug!(program = %self.program, code, "background process exited");

        if let Some(done) = self.done.take() {
            done.call(Completion::new(self.pid(), code));
        }

        match panicked {
            Some(name) => Err(ExecutionError::ThreadPanicked(name)),
            None => Ok(code),
        }
    }

    pub fn kill(&self) -> ExecutionResult<()> {
        self.process.kill()
    }

    pub fn terminate(&self) -> ExecutionResult<()> {
        self.process.terminate()
    }

    pub fn is_running(&self) -> bool {
        self.process.is_running()
    }

    /// Exit code, once [`wait`](Self::wait) has returned
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Stdout collected because no `out` callback was given
    pub fn captured_stdout(&self) -> String {
        let captured = self
            .captured_stdout
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured).into_owned()
    }

    /// Stderr collected because no `err` callback was given
    pub fn captured_stderr(&self) -> String {
        let captured = self
            .captured_stderr
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&captured).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_handle_is_inert() {
        let handle = ProcessHandle::detached();
        assert_eq!(handle.pid(), None);
        assert!(!handle.is_running());
        assert!(handle.kill().is_ok());
        assert!(handle.terminate().is_ok());
        assert!(handle.wait().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_status_code_for_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status_code(ExitStatus::from_raw(9)), -9);
        assert_eq!(status_code(ExitStatus::from_raw(3 << 8)), 3);
    }
}
