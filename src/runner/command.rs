//! Command construction and execution
//!
//! A [`Command`] is a program name plus baked arguments, environment and
//! working directory. It can be run in any of the four [`Mode`]s.

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::lines::drain;
use crate::runner::running::StreamSetup;
use crate::runner::{
    Buffering, CommandOutput, Completion, LineStream, Mode, OutputLines, RunOptions,
    RunningCommand,
};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use tracing::{debug, warn};

/// A program ready to be run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    env_clear: bool,
    cwd: Option<PathBuf>,
    new_session: bool,
    out_buffering: Buffering,
    err_buffering: Buffering,
}

/// What [`Command::call`] produced, depending on the requested mode
#[derive(Debug)]
pub enum Invocation {
    Finished(CommandOutput),
    Lines(OutputLines),
    Stream(LineStream),
    Background(RunningCommand),
}

impl Invocation {
    pub fn mode(&self) -> Mode {
        match self {
            Invocation::Finished(_) => Mode::Sync,
            Invocation::Lines(_) => Mode::Iter,
            Invocation::Stream(_) => Mode::Async,
            Invocation::Background(_) => Mode::Background,
        }
    }
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Command {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            env_clear: false,
            cwd: None,
            new_session: true,
            out_buffering: Buffering::Line,
            err_buffering: Buffering::Line,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// A copy of this command with `args` bound in front of any later ones
    pub fn bake<I, S>(&self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clone().args(args)
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Do not inherit the parent's environment
    pub fn env_clear(mut self) -> Self {
        self.env_clear = true;
        self.envs.clear();
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Default for [`RunOptions::new_session`]
    pub fn with_new_session(mut self, enabled: bool) -> Self {
        self.new_session = enabled;
        self
    }

    /// Default buffering for callbacks attached to stdout and stderr
    pub fn with_buffering(mut self, out: Buffering, err: Buffering) -> Self {
        self.out_buffering = out;
        self.err_buffering = err;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_envs(&self) -> &[(String, String)] {
        &self.envs
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn new_session(&self) -> bool {
        self.new_session
    }

    /// Buffering used for stdout and stderr callbacks unless overridden
    pub fn buffering(&self) -> (Buffering, Buffering) {
        (self.out_buffering, self.err_buffering)
    }

    fn build(&self, new_session: bool) -> StdCommand {
        let mut command = StdCommand::new(&self.program);
        command.args(&self.args);

        if self.env_clear {
            command.env_clear();
        }
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        if new_session {
            set_new_session(&mut command);
        }

        command
    }

    fn spawn(&self, opts: &RunOptions) -> ExecutionResult<Child> {
        let new_session = opts.new_session.unwrap_or(self.new_session);
        let child = self.build(new_session).spawn().map_err(|source| {
            warn!(program = %self.program, "spawn failed: {}", source);
            ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;
        debug!(command = %self, pid = child.id(), mode = ?opts.mode, new_session, "spawned");
        Ok(child)
    }

    /// Run in whatever mode `opts` asks for
    pub fn call(&self, opts: RunOptions) -> ExecutionResult<Invocation> {
        match opts.mode {
            Mode::Sync => self.run_with(opts).map(Invocation::Finished),
            Mode::Iter => self.iter_with(opts).map(Invocation::Lines),
            Mode::Async => self.stream_with(opts).map(Invocation::Stream),
            Mode::Background => self.spawn_bg(opts).map(Invocation::Background),
        }
    }

    /// Run to completion and collect stdout, stderr and the exit code
    pub fn run(&self) -> ExecutionResult<CommandOutput> {
        self.run_with(RunOptions::new())
    }

    /// Synchronous run honouring `input`, `new_session` and `done`
    pub fn run_with(&self, opts: RunOptions) -> ExecutionResult<CommandOutput> {
        let mut child = self.spawn(&opts)?;

        let writer = match (child.stdin.take(), opts.input) {
            (Some(mut stdin), Some(data)) => Some(std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&data) {
                    debug!("stdin write failed: {}", e);
                }
            })),
            _ => None,
        };

        let pid = child.id();
        let output = child
            .wait_with_output()
            .map_err(|e| ExecutionError::Wait(e.to_string()))?;
        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| ExecutionError::ThreadPanicked("stdin"))?;
        }

        let exit_code = crate::runner::status_code(output.status);
        debug!(program = %self.program, exit_code, "finished");

        if let Some(done) = opts.done {
            done.call(Completion::new(Some(pid), exit_code));
        }

        Ok(CommandOutput {
            program: self.program.clone(),
            stdout: crate::runner::reader::decode(output.stdout),
            stderr: crate::runner::reader::decode(output.stderr),
            exit_code,
        })
    }

    /// Iterate over stdout lines as they are produced
    pub fn iter(&self) -> ExecutionResult<OutputLines> {
        self.iter_with(RunOptions::new().mode(Mode::Iter))
    }

    pub fn iter_with(&self, opts: RunOptions) -> ExecutionResult<OutputLines> {
        let mut child = self.spawn(&opts)?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(data) = opts.input {
                std::thread::spawn(move || {
                    if let Err(e) = stdin.write_all(&data) {
                        debug!("stdin write failed: {}", e);
                    }
                });
            }
        }

        let stderr_reader = child
            .stderr
            .take()
            .and_then(|stderr| drain(format!("xh-{}-stderr", self.program), stderr));

        Ok(OutputLines::new(
            self.program.clone(),
            child,
            stderr_reader,
            opts.done,
        ))
    }

    /// Stream stdout lines asynchronously; must be called inside a tokio runtime
    pub fn stream(&self) -> ExecutionResult<LineStream> {
        self.stream_with(RunOptions::new().mode(Mode::Async))
    }

    pub fn stream_with(&self, opts: RunOptions) -> ExecutionResult<LineStream> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ExecutionError::Io(
                "async mode requires a running tokio runtime".to_string(),
            ));
        }

        let new_session = opts.new_session.unwrap_or(self.new_session);
        let mut command = tokio::process::Command::from(self.build(new_session));
        command.kill_on_drop(true);
        let child = command.spawn().map_err(|source| {
            warn!(program = %self.program, "spawn failed: {}", source);
            ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            }
        })?;
        debug!(command = %self, pid = ?child.id(), "spawned for streaming");

        Ok(LineStream::new(
            self.program.clone(),
            child,
            opts.input,
            opts.done,
        ))
    }

    /// Start in the background; output goes to the `out`/`err` callbacks
    pub fn spawn_bg(&self, opts: RunOptions) -> ExecutionResult<RunningCommand> {
        let child = self.spawn(&opts)?;
        let out = StreamSetup {
            handler: opts.out,
            buffering: opts.out_buffering.unwrap_or(self.out_buffering),
        };
        let err = StreamSetup {
            handler: opts.err,
            buffering: opts.err_buffering.unwrap_or(self.err_buffering),
        };
        debug!(
            program = %self.program,
            out_bufsize = out.buffering.size(),
            err_bufsize = err.buffering.size(),
            "attaching callbacks"
        );
        RunningCommand::start(self.program.clone(), child, out, err, opts.done, opts.input)
    }
}

#[cfg(unix)]
fn set_new_session(command: &mut StdCommand) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn set_new_session(command: &mut StdCommand) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn set_new_session(_command: &mut StdCommand) {}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
