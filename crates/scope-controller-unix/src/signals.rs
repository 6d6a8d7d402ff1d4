//! OS signal routing.
//!
//! SIGINT, SIGTERM and SIGHUP are routed into a one-slot stop queue. The other
//! asynchronous signals, including the Linux-only ones and the real-time range,
//! are ignored for the lifetime of the supervisor, so the stop wait is the only
//! place termination signals are observed. Synchronous fault signals, SIGCHLD
//! (needed to reap the worker), SIGKILL and SIGSTOP keep their dispositions.

use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use scope_controller_core::{ControllerError, STOP_QUEUE_CAPACITY, TerminationSignal};
use tokio::signal::unix::{SignalKind, signal as listen};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const IGNORED: &[Signal] = &[
    Signal::SIGQUIT,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGPIPE,
    Signal::SIGALRM,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
    Signal::SIGVTALRM,
    Signal::SIGPROF,
    Signal::SIGIO,
    Signal::SIGXCPU,
    Signal::SIGXFSZ,
    Signal::SIGWINCH,
    Signal::SIGURG,
];

#[cfg(any(target_os = "linux", target_os = "android"))]
const PLATFORM_IGNORED: &[Signal] = &[
    Signal::SIGPWR,
    #[cfg(not(any(
        target_arch = "mips",
        target_arch = "mips32r6",
        target_arch = "mips64",
        target_arch = "mips64r6",
        target_arch = "sparc64"
    )))]
    Signal::SIGSTKFLT,
];

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const PLATFORM_IGNORED: &[Signal] = &[];

fn ignored_signals() -> impl Iterator<Item = Signal> {
    IGNORED.iter().chain(PLATFORM_IGNORED).copied()
}

/// Listener that forwards the first termination signal into the stop queue.
///
/// Dropping the router stops the listener; the stop queue then reports its
/// source as closed.
pub struct SignalRouter {
    listener: JoinHandle<()>,
}

impl SignalRouter {
    /// Install the routing. Must be called from within a tokio runtime.
    pub fn install() -> Result<(Self, mpsc::Receiver<TerminationSignal>), ControllerError> {
        // Stop signals get their handlers before anything else changes disposition.
        let mut interrupt = listen(SignalKind::interrupt()).map_err(setup_error)?;
        let mut terminate = listen(SignalKind::terminate()).map_err(setup_error)?;
        let mut hangup = listen(SignalKind::hangup()).map_err(setup_error)?;

        ignore_asynchronous_signals()?;

        let (tx, rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let listener = tokio::spawn(async move {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => TerminationSignal::Interrupt,
                Some(()) = terminate.recv() => TerminationSignal::Terminate,
                Some(()) = hangup.recv() => TerminationSignal::HangUp,
                else => {
                    warn!("All signal streams closed");
                    return;
                }
            };

            info!("Received {}", received);
            if tx.send(received).await.is_err() {
                debug!("Stop already requested; dropping {}", received);
            }
        });

        debug!(
            "Routing {:?} into the stop queue; ignoring {} other signals and the real-time range",
            TerminationSignal::ALL,
            ignored_signals().count()
        );
        Ok((Self { listener }, rx))
    }
}

impl Drop for SignalRouter {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

fn setup_error(e: std::io::Error) -> ControllerError {
    ControllerError::SignalSetup(e.to_string())
}

fn ignore_asynchronous_signals() -> Result<(), ControllerError> {
    for sig in ignored_signals() {
        // SAFETY: SIG_IGN installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigIgn) }
            .map_err(|e| ControllerError::SignalSetup(format!("{}: {e}", sig.as_str())))?;
    }
    set_realtime_dispositions(libc::SIG_IGN)
        .map_err(|e| ControllerError::SignalSetup(format!("real-time signals: {e}")))
}

/// Apply `handler` to every real-time signal. `Signal` has no variants for
/// them, so the raw numbers go straight to libc.
#[cfg(target_os = "linux")]
fn set_realtime_dispositions(handler: libc::sighandler_t) -> std::io::Result<()> {
    for raw in libc::SIGRTMIN()..=libc::SIGRTMAX() {
        // SAFETY: only SIG_IGN and SIG_DFL are passed, neither runs code.
        if unsafe { libc::signal(raw, handler) } == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_realtime_dispositions(_handler: libc::sighandler_t) -> std::io::Result<()> {
    Ok(())
}

/// Restore default dispositions for every signal the supervisor ignores.
///
/// Ignored dispositions survive exec, so this runs in the worker between fork
/// and exec.
pub fn reset_ignored_dispositions() -> std::io::Result<()> {
    for sig in ignored_signals() {
        // SAFETY: SIG_DFL installs no handler code.
        unsafe { signal::signal(sig, SigHandler::SigDfl) }.map_err(std::io::Error::from)?;
    }
    set_realtime_dispositions(libc::SIG_DFL)
}
