use async_trait::async_trait;
use scope_controller_core::{
    ControllerError, ProcessId, WorkerCommand, WorkerExit, WorkerHandle, WorkerLauncher,
    WorkerState,
};

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use crate::signals::reset_ignored_dispositions;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use tokio::process::{Child, Command};
    use tracing::{info, warn};

    /// Unix-specific worker handle implementation
    pub struct UnixWorkerHandle {
        child: Child,
        pid: ProcessId,
        command: String,
        state: WorkerState,
        exit: Option<WorkerExit>,
    }

    impl UnixWorkerHandle {
        pub fn new(child: Child, command: String) -> Result<Self, ControllerError> {
            let pid = child.id().map(ProcessId::from).ok_or_else(|| {
                ControllerError::SpawnFailed(format!("{command} exited before its pid was read"))
            })?;

            Ok(Self {
                child,
                pid,
                command,
                state: WorkerState::Spawned,
                exit: None,
            })
        }

        pub fn command(&self) -> &str {
            &self.command
        }
    }

    #[async_trait]
    impl WorkerHandle for UnixWorkerHandle {
        fn pid(&self) -> ProcessId {
            self.pid
        }

        fn state(&self) -> WorkerState {
            self.state
        }

        fn mark_running(&mut self) {
            if self.state == WorkerState::Spawned {
                self.state = WorkerState::Running;
            }
        }

        async fn terminate(&mut self) -> Result<(), ControllerError> {
            // A reaped pid may already belong to someone else.
            if self.state == WorkerState::Terminated {
                return Err(ControllerError::KillFailed(format!(
                    "process {} has already been reaped",
                    self.pid
                )));
            }

            let nix_pid = NixPid::from_raw(self.pid.0 as i32);
            match signal::kill(nix_pid, Signal::SIGKILL) {
                Ok(()) => {
                    info!("Sent SIGKILL to worker {}", self.pid);
                    Ok(())
                }
                Err(nix::errno::Errno::ESRCH) => {
                    warn!("Worker {} not found", self.pid);
                    Err(ControllerError::KillFailed(format!(
                        "process {} not found",
                        self.pid
                    )))
                }
                Err(nix::errno::Errno::EPERM) => {
                    warn!("Permission denied to kill worker {}", self.pid);
                    Err(ControllerError::KillFailed(format!(
                        "permission denied to kill process {}",
                        self.pid
                    )))
                }
                Err(e) => {
                    warn!("Failed to send SIGKILL to worker {}: {}", self.pid, e);
                    Err(ControllerError::KillFailed(format!("SIGKILL failed: {e}")))
                }
            }
        }

        async fn wait(&mut self) -> Result<WorkerExit, ControllerError> {
            if let Some(exit) = self.exit {
                return Ok(exit);
            }

            let status = self.child.wait().await.map_err(|e| {
                ControllerError::WaitFailed(format!("process {}: {e}", self.pid))
            })?;

            let exit = WorkerExit { status };
            self.exit = Some(exit);
            self.state = WorkerState::Terminated;
            info!("Worker {} exited: {}", self.pid, exit);
            Ok(exit)
        }
    }

    /// Launches workers as direct children of the supervisor.
    ///
    /// Each worker gets its own process group, so a terminal interrupt reaches
    /// only the supervisor, and starts with default signal dispositions even
    /// though the supervisor ignores most signals. Dropping a handle kills the
    /// worker.
    #[derive(Debug, Clone)]
    pub struct UnixWorkerLauncher {
        _private: (),
    }

    impl Default for UnixWorkerLauncher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UnixWorkerLauncher {
        pub fn new() -> Self {
            Self { _private: () }
        }
    }

    #[async_trait]
    impl WorkerLauncher for UnixWorkerLauncher {
        type Handle = UnixWorkerHandle;

        async fn spawn(&self, command: &WorkerCommand) -> Result<UnixWorkerHandle, ControllerError> {
            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args);

            if let Some(dir) = &command.working_directory {
                cmd.current_dir(dir);
            }

            for (key, value) in &command.env {
                cmd.env(key, value);
            }

            cmd.process_group(0);
            cmd.kill_on_drop(true);

            // SAFETY: the hook only calls sigaction(2), which is async-signal-safe,
            // and touches no memory shared with the parent.
            unsafe {
                cmd.pre_exec(reset_ignored_dispositions);
            }

            let child = cmd
                .spawn()
                .map_err(|e| ControllerError::SpawnFailed(format!("{command}: {e}")))?;
            let handle = UnixWorkerHandle::new(child, command.to_string())?;

            info!(
                "Spawned worker: {} (PID: {}) with args: {:?}",
                command.program,
                handle.pid(),
                command.args
            );
            Ok(handle)
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixWorkerHandle, UnixWorkerLauncher};
