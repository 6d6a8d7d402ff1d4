//! Delivers real signals to the test process, so it lives in its own binary.
#![cfg(unix)]

use nix::sys::signal::{Signal, raise};
use scope_controller::PlatformFactory;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

#[tokio::test]
async fn test_non_stop_signals_neither_kill_nor_stop() {
    let (_router, mut signals) = PlatformFactory::route_signals().unwrap();

    raise(Signal::SIGUSR1).unwrap();
    raise(Signal::SIGALRM).unwrap();

    #[cfg(target_os = "linux")]
    {
        raise(Signal::SIGPWR).unwrap();
        #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
        raise(Signal::SIGSTKFLT).unwrap();

        for raw in [nix::libc::SIGRTMIN(), nix::libc::SIGRTMAX()] {
            // SAFETY: raise(3) only delivers a signal to this thread.
            assert_eq!(unsafe { nix::libc::raise(raw) }, 0);
        }
    }

    // Still alive here; none of them may reach the stop queue either.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(signals.try_recv(), Err(TryRecvError::Empty)));
}
