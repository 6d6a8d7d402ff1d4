use scope_controller_core::{ControllerError, TerminationSignal};
use tokio::sync::mpsc;

#[cfg(not(unix))]
compile_error!("scope-controller needs a Unix process model");

/// Worker launcher for the platform this binary was built for
#[cfg(unix)]
pub type PlatformLauncher = scope_controller_unix::UnixWorkerLauncher;

/// Keeps OS signals routed into the stop queue while alive
#[cfg(unix)]
pub type PlatformSignalRouter = scope_controller_unix::SignalRouter;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformFactory;

impl PlatformFactory {
    #[cfg(unix)]
    pub fn create_launcher() -> PlatformLauncher {
        scope_controller_unix::UnixWorkerLauncherFactory::create_launcher()
    }

    /// Route SIGINT, SIGTERM and SIGHUP into a stop queue and ignore the
    /// other asynchronous signals.
    #[cfg(unix)]
    pub fn route_signals()
    -> Result<(PlatformSignalRouter, mpsc::Receiver<TerminationSignal>), ControllerError> {
        scope_controller_unix::SignalRouter::install()
    }

    pub fn platform_name() -> &'static str {
        #[cfg(unix)]
        return scope_controller_unix::UnixWorkerLauncherFactory::platform_name();

        #[cfg(not(unix))]
        return "unsupported";
    }
}
