//! Subprocess execution with concurrent output streaming.
//!
//! stdout and stderr are drained line by line on the calling task while the
//! exit status is awaited, so a child that fills one pipe before touching the
//! other never stalls. A child that cannot be started at all is reported as
//! [`ProcessOutcome::SpawnFailed`] instead of an error, so one broken
//! executable never tears down the caller.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::SpawnError;

/// A program, its arguments and working directory
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a subprocess ended
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The process ran; `code` is `None` when it was killed by a signal
    Exited { pid: Option<u32>, code: Option<i32> },
    /// The process never started
    SpawnFailed(SpawnError),
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ProcessOutcome::Exited { code: Some(0), .. })
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ProcessOutcome::Exited { code, .. } => *code,
            ProcessOutcome::SpawnFailed(_) => None,
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            ProcessOutcome::Exited { pid, .. } => *pid,
            ProcessOutcome::SpawnFailed(_) => None,
        }
    }

    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ProcessOutcome::SpawnFailed(_))
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Exited { code: Some(code), .. } => write!(f, "exited with code {code}"),
            ProcessOutcome::Exited { code: None, .. } => write!(f, "terminated by signal"),
            ProcessOutcome::SpawnFailed(e) => write!(f, "{e}"),
        }
    }
}

/// Run `invocation` with piped output, handing every line to the callbacks.
///
/// Lines are passed without their trailing newline; invalid UTF-8 is
/// replaced rather than rejected.
pub async fn stream_subprocess<O, E>(
    invocation: &Invocation,
    mut on_stdout: O,
    mut on_stderr: E,
) -> ProcessOutcome
where
    O: FnMut(&str),
    E: FnMut(&str),
{
    let program = invocation.program_name();
    let mut cmd = invocation.command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            warn!(program = %program, error = %source, "Failed to spawn process");
            return ProcessOutcome::SpawnFailed(SpawnError { program, source });
        }
    };

    let pid = child.id();
    debug!(program = %program, pid, "Process spawned");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout_lines, stderr_lines, status) = tokio::join!(
        drain_lines(stdout, &mut on_stdout),
        drain_lines(stderr, &mut on_stderr),
        child.wait(),
    );

    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(program = %program, error = %e, "Failed to wait for process");
            None
        }
    };

    debug!(program = %program, pid, code, stdout_lines, stderr_lines, "Process exited");
    ProcessOutcome::Exited { pid, code }
}

/// Run `invocation` attached to this process's stdin, stdout and stderr
pub async fn run_inherited(invocation: &Invocation) -> ProcessOutcome {
    let program = invocation.program_name();
    let mut cmd = invocation.command();
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            warn!(program = %program, error = %source, "Failed to spawn process");
            return ProcessOutcome::SpawnFailed(SpawnError { program, source });
        }
    };

    let pid = child.id();
    let code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            warn!(program = %program, error = %e, "Failed to wait for process");
            None
        }
    };
    ProcessOutcome::Exited { pid, code }
}

/// Read a stream to EOF, returning the number of lines seen
async fn drain_lines<R, F>(stream: Option<R>, on_line: &mut F) -> usize
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let Some(stream) = stream else {
        return 0;
    };

    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']));
                count += 1;
            }
            Err(e) => {
                debug!(error = %e, "Stopped reading process output");
                break;
            }
        }
    }

    count
}
