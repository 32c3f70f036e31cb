//! Running `zoneadm` and `zonecfg`.
//!
//! Everything that touches the host goes through [`Executor`], so that the
//! prober and the reconcile engine can run against a simulated host in tests.

use std::borrow::Cow;
use std::fmt;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, error, info};

pub const ZONEADM: &str = "/usr/sbin/zoneadm";
pub const ZONECFG: &str = "/usr/sbin/zonecfg";

/// A command line. Arguments are passed verbatim, without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub program: String,
    pub args: Vec<String>,
}

impl Input {
    pub fn new(program: impl Into<String>) -> Self {
        Input {
            program: program.into(),
            args: Vec::new(),
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

    /// The file name of the program, e.g. `zonecfg` for `/usr/sbin/zonecfg`.
    pub fn program_name(&self) -> &str {
        self.program
            .rsplit('/')
            .next()
            .unwrap_or(self.program.as_str())
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Quotes `arg` for a POSIX shell, leaving it bare when nothing in it is special.
fn shell_quote(arg: &str) -> Cow<'_, str> {
    let plain = |c: char| c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c);
    if !arg.is_empty() && arg.chars().all(plain) {
        return Cow::Borrowed(arg);
    }
    Cow::Owned(format!("'{}'", arg.replace('\'', "'\\''")))
}

/// Renders as a command line that can be pasted into a shell.
impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// The result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Output {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Output {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn status_string(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "a signal".to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("failed to start '{command}': {err}")]
    Spawn {
        command: String,
        #[source]
        err: std::io::Error,
    },

    #[error("'{command}' terminated by {status}: {}", .stderr.trim_end())]
    CommandFailure {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },
}

impl ExecutionError {
    pub fn from_output(input: &Input, output: Output) -> Self {
        ExecutionError::CommandFailure {
            command: input.to_string(),
            status: output.status_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs commands on behalf of the engine.
///
/// - In production, this is a [`HostExecutor`].
/// - Under test, a simulated host answers instead.
pub trait Executor {
    /// Runs the command to completion. A non-zero exit is reported through the
    /// returned [`Output`]; only a failure to launch the program is an error.
    fn run(&self, input: &Input) -> Result<Output, ExecutionError>;

    /// Like [`Executor::run`], but a non-zero exit is an error.
    fn run_checked(&self, input: &Input) -> Result<Output, ExecutionError> {
        let output = self.run(input)?;
        if !output.success() {
            return Err(ExecutionError::from_output(input, output));
        }
        Ok(output)
    }
}

pub(crate) fn log_input(id: u64, input: &Input) {
    info!(id, command = %input, "running command");
}

pub(crate) fn log_output(id: u64, output: &Output) {
    info!(
        id,
        result = if output.success() { "OK" } else { "ERROR" },
        status = %output.code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()),
        "finished running command"
    );
    if !output.stdout.is_empty() {
        debug!(id, stdout = %output.stdout, "finished command stdout");
    }
    if !output.stderr.is_empty() {
        debug!(id, stderr = %output.stderr, "finished command stderr");
    }
}

/// Runs commands on the local host, blocking until each one exits.
#[derive(Debug, Default)]
pub struct HostExecutor {
    counter: AtomicU64,
}

impl HostExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for HostExecutor {
    fn run(&self, input: &Input) -> Result<Output, ExecutionError> {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        log_input(id, input);
        let output = input.to_command().output().map_err(|err| {
            error!(id, "could not start program");
            ExecutionError::Spawn {
                command: input.to_string(),
                err,
            }
        })?;
        let output = Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log_output(id, &output);
        Ok(output)
    }
}

/// Locations of the two zone administration tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub zoneadm: String,
    pub zonecfg: String,
}

impl Default for Tools {
    fn default() -> Self {
        Tools {
            zoneadm: ZONEADM.to_string(),
            zonecfg: ZONECFG.to_string(),
        }
    }
}

impl Tools {
    /// `zoneadm -z <zone>`, to be completed with a subcommand.
    pub fn zoneadm(&self, zone: &str) -> Input {
        Input::new(&self.zoneadm).args(["-z", zone])
    }

    /// `zonecfg -z <zone>`, to be completed with a subcommand or script.
    pub fn zonecfg(&self, zone: &str) -> Input {
        Input::new(&self.zonecfg).args(["-z", zone])
    }
}

/// The executor handle and tool locations that every probe and mutation needs.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub executor: &'a dyn Executor,
    pub tools: &'a Tools,
}

impl<'a> Host<'a> {
    pub fn new(executor: &'a dyn Executor, tools: &'a Tools) -> Self {
        Host { executor, tools }
    }
}
