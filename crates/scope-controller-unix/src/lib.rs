//! Unix implementations of the scope controller's worker handling and OS
//! signal routing.

mod process_table;
#[cfg(unix)]
mod signals;
mod unix_worker;

pub use process_table::ProcessTable;
#[cfg(unix)]
pub use signals::{SignalRouter, reset_ignored_dispositions};
#[cfg(unix)]
pub use unix_worker::{UnixWorkerHandle, UnixWorkerLauncher};

#[cfg(unix)]
pub struct UnixWorkerLauncherFactory;

#[cfg(unix)]
impl UnixWorkerLauncherFactory {
    pub fn create_launcher() -> UnixWorkerLauncher {
        UnixWorkerLauncher::new()
    }

    pub fn platform_name() -> &'static str {
        "Unix"
    }
}
