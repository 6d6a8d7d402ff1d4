use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::ControllerError;

const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";

/// Interface of the control plane's scope objects.
pub const SCOPE_INTERFACE: &str = "org.freedesktop.systemd1.Scope";

/// Member the control plane emits when it wants a controlled scope stopped.
pub const REQUEST_STOP_MEMBER: &str = "RequestStop";

/// Exact-match filter for signals delivered on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFilter {
    pub object_path: String,
    pub interface: String,
    pub sender: String,
    pub member: String,
}

impl SignalFilter {
    /// Filter for `RequestStop` on the given scope, sent only by `control_plane`.
    pub fn request_stop(scope_name: &str, control_plane: &str) -> Self {
        Self {
            object_path: unit_object_path(scope_name),
            interface: SCOPE_INTERFACE.to_string(),
            sender: control_plane.to_string(),
            member: REQUEST_STOP_MEMBER.to_string(),
        }
    }
}

impl fmt::Display for SignalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type='signal',sender='{}',path='{}',interface='{}',member='{}'",
            self.sender, self.object_path, self.interface, self.member
        )
    }
}

/// A signal delivered through a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSignal {
    pub object_path: String,
    pub member: String,
    pub sender: Option<String>,
}

/// Connection to the IPC bus.
///
/// Implementations own the connection; dropping or closing them releases the
/// claimed name.
#[async_trait]
pub trait ControlBus: Send + Sync {
    /// Claim `name` as primary owner. Never queues behind another owner.
    async fn claim_name(&self, name: &str) -> Result<(), ControllerError>;

    /// Register `filter` with the bus. Matching deliveries are pushed onto the
    /// returned queue, which holds at most one signal.
    async fn subscribe(
        &self,
        filter: &SignalFilter,
    ) -> Result<mpsc::Receiver<BusSignal>, ControllerError>;

    /// Release everything acquired through this connection.
    async fn close(&self);
}

/// Object path under which the control plane exposes `unit`.
///
/// Every byte outside `[A-Za-z0-9]` (and a leading digit) is written as `_xx`
/// in lowercase hex.
pub fn unit_object_path(unit: &str) -> String {
    let mut path = String::from(UNIT_PATH_PREFIX);
    if unit.is_empty() {
        path.push('_');
        return path;
    }

    for (i, byte) in unit.bytes().enumerate() {
        let plain = byte.is_ascii_alphabetic() || (byte.is_ascii_digit() && i > 0);
        if plain {
            path.push(byte as char);
        } else {
            path.push_str(&format!("_{byte:02x}"));
        }
    }
    path
}
