use thiserror::Error;

/// Error types for every fallible supervisor step.
///
/// None of these are retried. Each one aborts the supervisor with a single
/// diagnostic line naming the failed step.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to connect to the message bus: {0}")]
    BusUnavailable(String),

    #[error("Bus name {name} is already taken ({reply})")]
    NameTaken { name: String, reply: String },

    #[error("Failed to subscribe to bus signal: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to install signal routing: {0}")]
    SignalSetup(String),

    #[error("Failed to start worker: {0}")]
    SpawnFailed(String),

    #[error("Resource group registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Failed to kill worker process: {0}")]
    KillFailed(String),

    #[error("Failed to reap worker process: {0}")]
    WaitFailed(String),

    #[error("All stop sources closed before a stop was requested")]
    StopSourcesClosed,
}

impl ControllerError {
    /// Name of the supervisor step this error aborts.
    pub fn step(&self) -> &'static str {
        match self {
            ControllerError::Config(_) => "configure",
            ControllerError::BusUnavailable(_) => "connect",
            ControllerError::NameTaken { .. } => "claim-name",
            ControllerError::SubscriptionFailed(_) => "subscribe",
            ControllerError::SignalSetup(_) => "route-signals",
            ControllerError::SpawnFailed(_) => "spawn",
            ControllerError::RegistrationFailed(_) => "register",
            ControllerError::KillFailed(_) => "terminate",
            ControllerError::WaitFailed(_) => "wait",
            ControllerError::StopSourcesClosed => "await-stop",
        }
    }

    /// Whether the error was raised before the worker was spawned.
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            ControllerError::Config(_)
                | ControllerError::BusUnavailable(_)
                | ControllerError::NameTaken { .. }
                | ControllerError::SubscriptionFailed(_)
                | ControllerError::SignalSetup(_)
        )
    }
}
