use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use crate::ControllerError;

/// Unique identifier for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Liveness of the worker as seen by its owner.
///
/// Moves only forward: `Spawned -> Running -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerState {
    /// Process exists but is not yet accounted for by the control plane
    Spawned,
    /// Process is registered and being served
    Running,
    /// Process has exited and been reaped
    Terminated,
}

/// Command line of the worker process
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How the worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub status: ExitStatus,
}

impl WorkerExit {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    #[cfg(unix)]
    pub fn signal(&self) -> Option<i32> {
        use std::os::unix::process::ExitStatusExt;
        self.status.signal()
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)
    }
}

/// Handle to the spawned worker. Owned exclusively by the supervisor.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Process id, known from the moment the worker is spawned
    fn pid(&self) -> ProcessId;

    fn state(&self) -> WorkerState;

    /// Record that the worker is now served under an active resource group
    fn mark_running(&mut self);

    /// Forcefully kill the worker. Fails with `KillFailed` if it cannot be
    /// signalled, including when it has already been reaped.
    async fn terminate(&mut self) -> Result<(), ControllerError>;

    /// Block until the worker has exited and been reaped. Calling it again
    /// returns the same exit.
    async fn wait(&mut self) -> Result<WorkerExit, ControllerError>;
}

/// Starts worker processes
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// The type of handle this launcher produces
    type Handle: WorkerHandle;

    /// Start the worker; fails with `SpawnFailed` if it cannot be launched.
    async fn spawn(&self, command: &WorkerCommand) -> Result<Self::Handle, ControllerError>;
}
