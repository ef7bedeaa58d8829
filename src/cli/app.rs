//! Main CLI application

use crate::config::{load_config, validate_config, Config};
use crate::error::{ExecutionError, XhError};
use crate::logging;
use crate::runner::{Buffering, Command as XhCommand, LineHandler, Mode, RunOptions, Xh};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command};
use clap_complete::Shell;
use colored::Colorize;
use futures_util::StreamExt;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;

/// Subcommands that aliases may not shadow
const BUILTINS: &[&str] = &["run", "aliases", "version", "completions", "help"];

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent = 0,
    Quiet = 1,
    Normal = 2,
    Verbose = 3,
}

/// CLI application
pub struct App {
    /// The clap command
    command: Command,
    /// Parsed configuration
    config: Config,
    /// Config file path, if one was found
    config_path: Option<PathBuf>,
}

impl App {
    /// Create a new app, discovering the config file
    pub fn new() -> Result<Self, XhError> {
        Self::with_config_file(None)
    }

    /// Create app with a specific config file
    pub fn with_config_file(path: Option<PathBuf>) -> Result<Self, XhError> {
        let (config, config_path) = load_config(path.as_deref())?;
        validate_config(&config)?;

        let command = build_command(&config);

        Ok(App {
            command,
            config,
            config_path,
        })
    }

    /// Run with the process arguments, returning the exit code to use
    pub fn run(self) -> Result<i32, XhError> {
        self.run_from(std::env::args_os())
    }

    /// Run with explicit arguments (the first one is the binary name)
    pub fn run_from<I, T>(mut self, args: I) -> Result<i32, XhError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().get_matches_from(args);

        let verbosity = get_verbosity(&matches);
        logging::init(verbosity, self.config.log.as_deref());

        let xh = Xh::from_config(&self.config, self.config_path.as_deref())?;
        let printer = Printer { verbosity };

        match matches.subcommand() {
            Some(("run", sub)) => {
                let mut words = sub
                    .get_many::<String>("command")
                    .map(|vals| vals.cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
                    .into_iter();
                let program = words.next().unwrap_or_default();
                let command = xh.cmd(&program).args(words);
                let opts = run_options(sub)?;
                execute(command, opts, printer, sub.get_flag("check"))
            }
            Some(("aliases", _)) => {
                print_aliases(&xh);
                Ok(0)
            }
            Some(("version", _)) => {
                println!("xh {}", crate::VERSION);
                Ok(0)
            }
            Some(("completions", sub)) => {
                if let Some(shell) = sub.get_one::<Shell>("shell").copied() {
                    clap_complete::generate(shell, &mut self.command, "xh", &mut io::stdout());
                }
                Ok(0)
            }
            Some((name, sub)) => {
                // Alias subcommands carry "args"; unknown names are external
                let args: Vec<String> = if xh.is_alias(name) {
                    sub.get_many::<String>("args")
                        .map(|vals| vals.cloned().collect())
                        .unwrap_or_default()
                } else {
                    sub.get_many::<OsString>("")
                        .map(|vals| vals.map(|v| v.to_string_lossy().into_owned()).collect())
                        .unwrap_or_default()
                };
                let command = xh.resolve(name)?.args(args);
                execute(command, RunOptions::new(), printer, false)
            }
            None => {
                self.command.print_help()?;
                println!();
                Ok(0)
            }
        }
    }
}

/// Build the clap command from configuration
fn build_command(config: &Config) -> Command {
    let mut cmd = Command::new("xh")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run external programs in sync, iterator, async or background mode")
        .allow_external_subcommands(true)
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Path to xh.yml config file")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print command output and errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Print no output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(run_subcommand())
        .subcommand(Command::new("aliases").about("List configured aliases"))
        .subcommand(Command::new("version").about("Print the xh version"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .value_name("SHELL")
                        .required(true)
                        .value_parser(value_parser!(Shell)),
                ),
        );

    // Add subcommands for each alias
    for (name, alias) in &config.aliases {
        if BUILTINS.contains(&name.as_str()) {
            tracing::warn!(alias = %name, "alias shadows a built-in subcommand and is ignored");
            continue;
        }

        let about = alias
            .usage()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Alias for `{}`", alias.describe()));

        cmd = cmd.subcommand(
            Command::new(name.clone()).about(about).arg(
                Arg::new("args")
                    .value_name("ARGS")
                    .num_args(0..)
                    .trailing_var_arg(true)
                    .allow_hyphen_values(true),
            ),
        );
    }

    cmd
}

fn run_subcommand() -> Command {
    Command::new("run")
        .about("Run a program")
        .arg(
            Arg::new("iter")
                .long("iter")
                .help("Print stdout line by line through the iterator interface")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("async")
                .long("async")
                .help("Print stdout line by line through the async stream interface")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bg")
                .long("bg")
                .help("Run in the background, printing output from callbacks")
                .action(ArgAction::SetTrue),
        )
        .group(ArgGroup::new("mode").args(["iter", "async", "bg"]).multiple(false))
        .arg(
            Arg::new("no-new-session")
                .long("no-new-session")
                .help("Keep the child in xh's process group")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("out-bufsize")
                .long("out-bufsize")
                .value_name("N")
                .help("Stdout callback buffering: 0 unbuffered, 1 lines, N bytes")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("err-bufsize")
                .long("err-bufsize")
                .value_name("N")
                .help("Stderr callback buffering: 0 unbuffered, 1 lines, N bytes")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("stdin")
                .long("stdin")
                .help("Forward xh's stdin to the program")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Fail when the program exits with a non-zero code")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("command")
                .value_name("PROGRAM")
                .help("Program to run followed by its arguments")
                .required(true)
                .num_args(1..)
                .trailing_var_arg(true)
                .allow_hyphen_values(true),
        )
}

/// Get verbosity level from matches
fn get_verbosity(matches: &ArgMatches) -> Verbosity {
    if matches.get_flag("silent") {
        Verbosity::Silent
    } else if matches.get_flag("quiet") {
        Verbosity::Quiet
    } else if matches.get_flag("verbose") {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    }
}

/// Translate `run` flags into options
fn run_options(matches: &ArgMatches) -> Result<RunOptions, XhError> {
    let mode = if matches.get_flag("bg") {
        Mode::Background
    } else if matches.get_flag("iter") {
        Mode::Iter
    } else if matches.get_flag("async") {
        Mode::Async
    } else {
        Mode::Sync
    };

    let mut opts = RunOptions::new().mode(mode);
    if matches.get_flag("no-new-session") {
        opts = opts.new_session(false);
    }
    if let Some(size) = matches.get_one::<usize>("out-bufsize") {
        opts = opts.out_bufsize(*size);
    }
    if let Some(size) = matches.get_one::<usize>("err-bufsize") {
        opts = opts.err_bufsize(*size);
    }
    if matches.get_flag("stdin") {
        let mut input = Vec::new();
        io::stdin().read_to_end(&mut input)?;
        opts = opts.input(input);
    }
    Ok(opts)
}

/// Writes child output according to verbosity
#[derive(Debug, Clone, Copy)]
struct Printer {
    verbosity: Verbosity,
}

impl Printer {
    fn shows_output(&self) -> bool {
        self.verbosity > Verbosity::Silent
    }

    fn command(&self, command: &XhCommand, mode: Mode) {
        if self.verbosity >= Verbosity::Verbose {
            eprintln!("{} {} ({:?})", "[RUN]".cyan(), command, mode);
        }
    }

    fn out(&self, text: &str) {
        if self.shows_output() {
            println!("{}", text);
        }
    }

    fn out_raw(&self, text: &str) {
        if self.shows_output() {
            print!("{}", text);
            let _ = io::stdout().flush();
        }
    }

    fn err(&self, text: &str) {
        if self.shows_output() {
            eprintln!("{}", text.red());
        }
    }

    fn err_raw(&self, text: &str) {
        if self.shows_output() && !text.is_empty() {
            eprint!("{}", text.red());
        }
    }
}

/// Run a command in the requested mode and return its exit code
fn execute(
    command: XhCommand,
    opts: RunOptions,
    printer: Printer,
    check: bool,
) -> Result<i32, XhError> {
    printer.command(&command, opts.mode);

    let (tx, rx) = mpsc::channel();
    let mode = opts.mode;
    let opts = opts.on_done(move |completion| {
        let _ = tx.send(completion.exit_code);
    });

    let code = match mode {
        Mode::Sync => {
            let output = command.run_with(opts)?;
            printer.out_raw(&output.stdout);
            printer.err_raw(&output.stderr);
            if check {
                return Ok(output.check()?.exit_code);
            }
            output.exit_code
        }
        Mode::Iter => {
            let mut lines = command.iter_with(opts)?;
            for line in lines.by_ref() {
                printer.out(&line);
            }
            printer.err_raw(lines.stderr());
            lines.exit_code().unwrap_or(-1)
        }
        Mode::Async => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(async {
                let mut stream = command.stream_with(opts)?;
                while let Some(line) = stream.next().await {
                    printer.out(&line);
                }
                Ok::<(), ExecutionError>(())
            })?;
            rx.recv().unwrap_or(-1)
        }
        Mode::Background => {
            // Only whole lines get their newline back; raw pieces print as-is
            let (out_default, err_default) = command.buffering();
            let out_lines = opts.out_buffering.unwrap_or(out_default) == Buffering::Line;
            let err_lines = opts.err_buffering.unwrap_or(err_default) == Buffering::Line;

            let opts = opts
                .on_out(LineHandler::line(move |piece: &str| {
                    if out_lines {
                        printer.out(piece)
                    } else {
                        printer.out_raw(piece)
                    }
                }))
                .on_err(LineHandler::line(move |piece: &str| {
                    if err_lines {
                        printer.err(piece)
                    } else {
                        printer.err_raw(piece)
                    }
                }));
            let mut running = command.spawn_bg(opts)?;
            running.wait()?
        }
    };

    if check && code != 0 {
        return Err(ExecutionError::NonZeroExit {
            program: command.program().to_string(),
            code,
            stderr: String::new(),
        }
        .into());
    }
    Ok(code)
}

/// Print configured aliases
fn print_aliases(xh: &Xh) {
    if xh.aliases().is_empty() {
        println!("No aliases configured");
        return;
    }
    let width = xh.aliases().keys().map(String::len).max().unwrap_or(0);
    for (name, alias) in xh.aliases() {
        let description = alias
            .usage()
            .map(|usage| format!("{} ({})", alias.describe(), usage))
            .unwrap_or_else(|| alias.describe());
        println!("{:width$}  {}", name.green(), description, width = width);
    }
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<i32, XhError> {
    let args: Vec<String> = std::env::args().collect();
    let file_path = extract_file_arg(&args);

    App::with_config_file(file_path)?.run()
}

/// Extract --file argument before clap parsing
///
/// Only global flags before the subcommand are considered; everything after
/// it belongs to the child program.
fn extract_file_arg(args: &[String]) -> Option<PathBuf> {
    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        if (arg == "--file" || arg == "-f") && i + 1 < args.len() {
            return Some(PathBuf::from(&args[i + 1]));
        }
        if let Some(path) = arg.strip_prefix("--file=") {
            return Some(PathBuf::from(path));
        }
        if !arg.starts_with('-') || arg == "--" {
            break;
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_get_verbosity_normal() {
        let matches = build_command(&Config::default()).get_matches_from(vec!["xh"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Normal);
    }

    #[test]
    fn test_get_verbosity_flags() {
        let matches = build_command(&Config::default()).get_matches_from(vec!["xh", "-s"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Silent);

        let matches = build_command(&Config::default()).get_matches_from(vec!["xh", "-v"]);
        assert_eq!(get_verbosity(&matches), Verbosity::Verbose);
    }

    #[test]
    fn test_verbosity_levels() {
        assert!(Verbosity::Verbose > Verbosity::Normal);
        assert!(Verbosity::Normal > Verbosity::Quiet);
        assert!(Verbosity::Quiet > Verbosity::Silent);
    }

    #[test]
    fn test_extract_file_arg() {
        let args = vec!["xh".to_string(), "--file".to_string(), "test.yml".to_string()];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("test.yml")));
    }

    #[test]
    fn test_extract_file_arg_short() {
        let args = vec!["xh".to_string(), "-f".to_string(), "test.yml".to_string()];
        assert_eq!(extract_file_arg(&args), Some(PathBuf::from("test.yml")));
    }

    #[test]
    fn test_extract_file_arg_ignores_child_args() {
        let to_args = |words: &[&str]| words.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            extract_file_arg(&to_args(&["xh", "run", "grep", "-f", "patterns.txt"])),
            None
        );
        assert_eq!(
            extract_file_arg(&to_args(&["xh", "grep", "-f", "patterns.txt"])),
            None
        );
        assert_eq!(
            extract_file_arg(&to_args(&["xh", "-v", "--file=my.yml", "run", "ls"])),
            Some(PathBuf::from("my.yml"))
        );
    }

    #[test]
    fn test_run_options_mode() {
        let matches = build_command(&Config::default())
            .get_matches_from(vec!["xh", "run", "--bg", "--out-bufsize", "0", "sleep", "1"]);
        let (_, sub) = matches.subcommand().unwrap();
        let opts = run_options(sub).unwrap();
        assert_eq!(opts.mode, Mode::Background);
        assert_eq!(opts.out_buffering, Some(crate::runner::Buffering::Unbuffered));
        let words: Vec<&String> = sub.get_many::<String>("command").unwrap().collect();
        assert_eq!(words, vec!["sleep", "1"]);
    }

    #[test]
    fn test_run_passes_hyphen_args_to_child() {
        let matches = build_command(&Config::default())
            .get_matches_from(vec!["xh", "run", "grep", "-f", "patterns.txt", "--color"]);
        let (_, sub) = matches.subcommand().unwrap();
        let words: Vec<&String> = sub.get_many::<String>("command").unwrap().collect();
        assert_eq!(words, vec!["grep", "-f", "patterns.txt", "--color"]);
    }

    #[test]
    fn test_aliases_become_subcommands() {
        let config = parse_config(
            r#"
aliases:
  gs:
    program: git
    args: [status]
    usage: Short status
  run: echo shadowed
"#,
        )
        .unwrap();
        let cmd = build_command(&config);
        assert!(cmd.find_subcommand("gs").is_some());
        let run = cmd.find_subcommand("run").unwrap();
        assert_eq!(run.get_about().map(|s| s.to_string()), Some("Run a program".to_string()));
    }

    #[test]
    fn test_external_subcommand() {
        let matches = build_command(&Config::default())
            .get_matches_from(vec!["xh", "echo", "hi"]);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "echo");
        let args: Vec<&OsString> = sub.get_many::<OsString>("").unwrap().collect();
        assert_eq!(args, vec![&OsString::from("hi")]);
    }
}
