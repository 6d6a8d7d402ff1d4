//! Scope Controller - run one worker process inside a transient systemd scope
//!
//! The supervisor claims a well-known bus name, listens for `RequestStop` on
//! its scope, spawns the worker and asks systemd to account for it. It then
//! waits for either an OS termination signal or the bus request, kills and
//! reaps the worker, and exits.

pub mod cli;
pub mod dbus;
pub mod logging;
pub mod platform;
pub mod supervisor;
pub mod systemd;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

pub use dbus::SystemBusClient;
pub use platform::PlatformFactory;
pub use supervisor::{ShutdownReport, Supervisor, SupervisorState};
pub use systemd::SystemdClient;

// Re-export core functionality
pub use scope_controller_core::*;

/// Connect to the configured bus and run the supervisor to completion.
///
/// The bus name is released before returning, whether the run succeeded or not.
pub async fn run(config: SupervisorConfig) -> Result<ShutdownReport, ControllerError> {
    info!(
        "Starting {} on {} ({:?} bus)",
        config.unit_name,
        PlatformFactory::platform_name(),
        config.bus
    );

    let bus = Arc::new(SystemBusClient::connect(config.bus).await?);

    // The router is held until the run returns; dropping it stops signal delivery.
    let (_router, signals, control_plane) = match prepare(&bus).await {
        Ok(prepared) => prepared,
        Err(e) => {
            bus.close().await;
            return Err(e);
        }
    };

    supervise(
        config,
        bus,
        control_plane,
        PlatformFactory::create_launcher(),
        signals,
    )
    .await
}

async fn prepare(
    bus: &SystemBusClient,
) -> Result<
    (
        platform::PlatformSignalRouter,
        mpsc::Receiver<TerminationSignal>,
        SystemdClient,
    ),
    ControllerError,
> {
    let (router, signals) = PlatformFactory::route_signals()?;
    let control_plane = SystemdClient::new(bus.connection()).await?;
    Ok((router, signals, control_plane))
}

/// Run a supervisor over `bus` and close the bus afterwards, on success and on
/// every error.
pub async fn supervise<B, P, L>(
    config: SupervisorConfig,
    bus: Arc<B>,
    control_plane: P,
    launcher: L,
    signals: mpsc::Receiver<TerminationSignal>,
) -> Result<ShutdownReport, ControllerError>
where
    B: ControlBus,
    P: ControlPlane,
    L: WorkerLauncher,
{
    let outcome = Supervisor::new(config, Arc::clone(&bus), control_plane, launcher)
        .run(signals)
        .await;
    bus.close().await;
    outcome
}
