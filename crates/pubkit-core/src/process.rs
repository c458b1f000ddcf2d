//! Child process execution.
//!
//! Every git, npm, bundler and doc-generator invocation goes through a
//! [`ProcessRunner`]. The production runner registers each live child in a
//! [`SpawnedProcessSet`] so the CLI can hang up on anything still running
//! when it shuts down.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio as StdStdio;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// How a child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stdio {
    /// Share the parent's console; only the exit status matters.
    #[default]
    Inherit,

    /// Accumulate stdout for the caller. Stderr still reaches the console.
    Capture,
}

/// A command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,

    /// Arguments, in order
    pub args: Vec<String>,

    /// Working directory (inherits the parent's when unset)
    pub cwd: Option<PathBuf>,

    /// Stream handling
    pub stdio: Stdio,
}

impl CommandSpec {
    /// Create a command with no arguments that inherits the console.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdio: Stdio::Inherit,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in the given directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Capture stdout instead of inheriting it.
    pub fn capture(mut self) -> Self {
        self.stdio = Stdio::Capture;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Captured stdout (empty for inherited runs)
    pub stdout: String,
}

impl ProcessOutput {
    /// Captured stdout with surrounding whitespace removed.
    pub fn trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Errors from running a child process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Command `{command}` failed with {}", describe_exit(.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
    },

    #[error("Unable to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Lost track of `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Runs external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion.
    ///
    /// Resolves only on exit status 0.
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// A child that is still running.
#[derive(Debug, Clone)]
struct LiveProcess {
    pid: u32,
    command: String,
}

#[derive(Debug, Default)]
struct SetInner {
    next_id: u64,
    live: HashMap<u64, LiveProcess>,
}

/// The children currently owned by this CLI invocation.
#[derive(Debug, Clone, Default)]
pub struct SpawnedProcessSet {
    inner: Arc<Mutex<SetInner>>,
}

impl SpawnedProcessSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SetInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a live child. Dropping the guard removes the entry.
    pub fn register(&self, pid: u32, command: &str) -> ProcessGuard {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.live.insert(
            id,
            LiveProcess {
                pid,
                command: command.to_string(),
            },
        );

        ProcessGuard {
            set: self.clone(),
            id,
        }
    }

    /// Number of children still running.
    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    /// Whether no child is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `SIGHUP` to every live child.
    ///
    /// Returns how many children were signalled. Entries are left in place;
    /// they disappear when their runner observes the exit.
    pub fn terminate_all(&self) -> usize {
        let live: Vec<LiveProcess> = self.lock().live.values().cloned().collect();

        let mut signalled = 0;
        for process in live {
            tracing::debug!("Hanging up on `{}` (pid {})", process.command, process.pid);
            if hang_up(process.pid) {
                signalled += 1;
            } else {
                tracing::warn!(
                    "Failed to signal `{}` (pid {})",
                    process.command,
                    process.pid
                );
            }
        }

        signalled
    }
}

/// Keeps a child registered in a [`SpawnedProcessSet`] while alive.
#[derive(Debug)]
pub struct ProcessGuard {
    set: SpawnedProcessSet,
    id: u64,
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.set.lock().live.remove(&self.id);
    }
}

#[cfg(unix)]
fn hang_up(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    unsafe { libc::kill(pid, libc::SIGHUP) == 0 }
}

#[cfg(not(unix))]
fn hang_up(_pid: u32) -> bool {
    // Children are spawned with kill_on_drop, which covers this platform.
    false
}

/// Runner backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    processes: SpawnedProcessSet,
}

impl TokioProcessRunner {
    /// Create a runner that registers children in `processes`.
    pub fn new(processes: SpawnedProcessSet) -> Self {
        Self { processes }
    }

    /// The set this runner registers children in.
    pub fn processes(&self) -> &SpawnedProcessSet {
        &self.processes
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let command = spec.to_string();
        tracing::debug!("Running `{}`", command);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(StdStdio::inherit())
            .stderr(StdStdio::inherit())
            .kill_on_drop(true);

        match spec.stdio {
            Stdio::Inherit => cmd.stdout(StdStdio::inherit()),
            Stdio::Capture => cmd.stdout(StdStdio::piped()),
        };

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;

        let _guard = child.id().map(|pid| self.processes.register(pid, &command));

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)
                .await
                .map_err(|source| ProcessError::Io {
                    command: command.clone(),
                    source,
                })?;
        }

        let status = child.wait().await.map_err(|source| ProcessError::Io {
            command: command.clone(),
            source,
        })?;

        if status.success() {
            Ok(ProcessOutput { stdout })
        } else {
            Err(ProcessError::Failed {
                command,
                exit_code: status.code(),
            })
        }
    }
}
