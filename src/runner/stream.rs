//! Async mode
//!
//! Lines are read from a `tokio::process` child and exposed as a
//! [`futures_core::Stream`].

use crate::runner::reader::trim_newline;
use crate::runner::{status_code, Completion, DoneHandler};
use async_stream::stream;
use futures_core::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tracing::{debug, warn};

/// Async stream over the stdout lines of a running command
pub struct LineStream {
    pid: Option<u32>,
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
}

impl LineStream {
    pub(crate) fn new(
        program: String,
        mut child: Child,
        input: Option<Vec<u8>>,
        done: Option<DoneHandler>,
    ) -> Self {
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take();

        let inner = stream! {
            if let (Some(mut stdin), Some(data)) = (stdin, input) {
                tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(&data).await {
                        debug!("stdin write failed: {}", e);
                    }
                });
            }

            let stderr_task = stderr.map(|mut stderr| {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let _ = stderr.read_to_end(&mut buf).await;
                    buf.len()
                })
            });

            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    match reader.read_until(b'\n', &mut buf).await {
                        Ok(0) => break,
                        Ok(_) => yield String::from_utf8_lossy(trim_newline(&buf)).into_owned(),
                        Err(e) => {
                            warn!(program = %program, "stdout read failed: {}", e);
                            break;
                        }
                    }
                }
            }

            if let Some(task) = stderr_task {
                if let Ok(len) = task.await {
                    debug!(program = %program, bytes = len, "stderr drained");
                }
            }

            let code = match child.wait().await {
                Ok(status) => status_code(status),
                Err(e) => {
                    warn!(program = %program, "wait failed: {}", e);
                    -1
                }
            };
            debug!(program = %program, code, "streamed process exited");

            if let Some(done) = done {
                done.call(Completion::new(pid, code));
            }
        };

        LineStream {
            pid,
            inner: Box::pin(inner),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

impl Stream for LineStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<String>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for LineStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineStream").field("pid", &self.pid).finish()
    }
}
