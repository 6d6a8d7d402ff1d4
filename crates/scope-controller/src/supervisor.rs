//! The supervisor lifecycle.
//!
//! `Starting -> Registering -> Serving -> Stopping -> Stopped`, strictly in
//! that order. Any failed step aborts the run with the error for that step;
//! the worker, if one exists, is killed when its handle is dropped.

use scope_controller_core::{
    ControlBus, ControlPlane, ControllerError, ProcessId, ResourceGroupDescriptor, SignalFilter,
    StopSource, StopTrigger, SupervisorConfig, TerminationSignal, WorkerExit, WorkerHandle,
    WorkerLauncher,
};
use scope_controller_unix::ProcessTable;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SupervisorState {
    /// Claiming the bus name and subscribing to stop requests
    Starting,
    /// Worker spawned, waiting for the control plane to account for it
    Registering,
    /// Worker registered; waiting for a stop request
    Serving,
    /// Killing and reaping the worker
    Stopping,
    Stopped,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Starting => "starting",
            SupervisorState::Registering => "registering",
            SupervisorState::Serving => "serving",
            SupervisorState::Stopping => "stopping",
            SupervisorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How a completed run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub source: StopSource,
    pub worker_pid: ProcessId,
    pub exit: WorkerExit,
}

/// Runs one worker inside a control-plane resource group until asked to stop.
pub struct Supervisor<B, P, L>
where
    B: ControlBus,
    P: ControlPlane,
    L: WorkerLauncher,
{
    config: SupervisorConfig,
    bus: Arc<B>,
    control_plane: P,
    launcher: L,
    process_table: ProcessTable,
    state: watch::Sender<SupervisorState>,
}

impl<B, P, L> Supervisor<B, P, L>
where
    B: ControlBus,
    P: ControlPlane,
    L: WorkerLauncher,
{
    pub fn new(config: SupervisorConfig, bus: Arc<B>, control_plane: P, launcher: L) -> Self {
        let (state, _) = watch::channel(SupervisorState::Starting);
        Self {
            config,
            bus,
            control_plane,
            launcher,
            process_table: ProcessTable::new(),
            state,
        }
    }

    /// Observe lifecycle transitions. The last state stays readable after the
    /// run finishes.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Drive the whole lifecycle. `signals` is the OS stop queue, routed
    /// before this is called so that early signals are not lost.
    ///
    /// The bus is borrowed, not closed; the caller releases it.
    pub async fn run(
        self,
        signals: mpsc::Receiver<TerminationSignal>,
    ) -> Result<ShutdownReport, ControllerError> {
        self.config.validate()?;

        // Starting
        self.bus.claim_name(&self.config.bus_name).await?;
        let filter = SignalFilter::request_stop(&self.config.scope_name, &self.config.control_plane);
        let requests = self.bus.subscribe(&filter).await?;
        let trigger = StopTrigger::new(signals, requests);

        self.enter(SupervisorState::Registering);
        let mut worker = self.launcher.spawn(&self.config.worker_command()).await?;
        let pid = worker.pid();
        info!("Worker running as PID {}", pid);

        let descriptor = ResourceGroupDescriptor::for_worker(&self.config, pid)?;
        let job = self
            .control_plane
            .start_resource_group(&descriptor, self.config.job_mode)
            .await?;
        debug!("Waiting for job {}", job.job_path());

        job.outcome().await?.into_result()?;
        info!("{} started", self.config.scope_name);

        worker.mark_running();
        self.enter(SupervisorState::Serving);
        let source = trigger.await_stop().await?;
        info!("Stop requested by {}", source);

        self.enter(SupervisorState::Stopping);
        info!("About to stop {}", self.config.scope_name);
        worker.terminate().await?;
        let exit = worker.wait().await?;

        if self.process_table.is_alive(pid) {
            warn!("PID {} is still listed after being reaped", pid);
        }
        info!("Worker {} killed ({})", pid, exit);

        self.enter(SupervisorState::Stopped);
        info!("{} exiting", self.config.unit_name);

        Ok(ShutdownReport {
            source,
            worker_pid: pid,
            exit,
        })
    }

    fn enter(&self, next: SupervisorState) {
        let previous = self.state.send_replace(next);
        info!("Supervisor state: {} -> {}", previous, next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_order() {
        assert!(SupervisorState::Starting < SupervisorState::Registering);
        assert!(SupervisorState::Registering < SupervisorState::Serving);
        assert!(SupervisorState::Serving < SupervisorState::Stopping);
        assert!(SupervisorState::Stopping < SupervisorState::Stopped);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SupervisorState::Serving.to_string(), "serving");
        assert_eq!(SupervisorState::Stopped.to_string(), "stopped");
    }
}
