use async_trait::async_trait;
use futures::StreamExt;
use scope_controller_core::{
    BusKind, BusSignal, ControlBus, ControllerError, STOP_QUEUE_CAPACITY, SignalFilter,
};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::fdo::{RequestNameFlags, RequestNameReply};
use zbus::message::Type as MessageType;
use zbus::{Connection, MatchRule, MessageStream};

/// D-Bus implementation of [`ControlBus`]
pub struct SystemBusClient {
    connection: Connection,
    claimed: Mutex<Option<String>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl SystemBusClient {
    /// Open a connection to the requested bus
    pub async fn connect(kind: BusKind) -> Result<Self, ControllerError> {
        let connection = match kind {
            BusKind::System => Connection::system().await,
            BusKind::Session => Connection::session().await,
        }
        .map_err(|e| ControllerError::BusUnavailable(e.to_string()))?;

        info!(
            "Connected to {:?} bus as {}",
            kind,
            connection
                .unique_name()
                .map(|name| name.to_string())
                .unwrap_or_default()
        );

        Ok(Self {
            connection,
            claimed: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    fn take_listeners(&self) -> Vec<JoinHandle<()>> {
        let mut listeners = self.listeners.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *listeners)
    }
}

#[async_trait]
impl ControlBus for SystemBusClient {
    async fn claim_name(&self, name: &str) -> Result<(), ControllerError> {
        let reply = self
            .connection
            .request_name_with_flags(name, RequestNameFlags::DoNotQueue.into())
            .await;

        name_reply(name, reply)?;
        info!("Claimed bus name {}", name);
        *self.claimed.lock().unwrap_or_else(|p| p.into_inner()) = Some(name.to_string());
        Ok(())
    }

    async fn subscribe(
        &self,
        filter: &SignalFilter,
    ) -> Result<mpsc::Receiver<BusSignal>, ControllerError> {
        let rule = match_rule(filter).map_err(subscription_error)?;
        let mut stream =
            MessageStream::for_match_rule(rule, &self.connection, Some(STOP_QUEUE_CAPACITY))
                .await
                .map_err(subscription_error)?;
        info!("Subscribed to {}", filter);

        let (tx, rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let listener = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        warn!("Dropping unreadable bus message: {}", e);
                        continue;
                    }
                };

                let header = message.header();
                let signal = BusSignal {
                    object_path: header.path().map(|p| p.to_string()).unwrap_or_default(),
                    member: header.member().map(|m| m.to_string()).unwrap_or_default(),
                    sender: header.sender().map(|s| s.to_string()),
                };

                info!(
                    "Received {} on {} from {}",
                    signal.member,
                    signal.object_path,
                    signal.sender.as_deref().unwrap_or("<unknown>")
                );
                if tx.send(signal).await.is_err() {
                    debug!("Stop already requested; dropping bus signal");
                }
                return;
            }
            debug!("Bus signal stream ended");
        });

        self.listeners
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(listener);
        Ok(rx)
    }

    async fn close(&self) {
        for listener in self.take_listeners() {
            listener.abort();
        }

        let claimed = self.claimed.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(name) = claimed {
            match self.connection.release_name(name.as_str()).await {
                Ok(_) => info!("Released bus name {}", name),
                Err(e) => warn!("Failed to release bus name {}: {}", name, e),
            }
        }
    }
}

impl Drop for SystemBusClient {
    fn drop(&mut self) {
        for listener in self.take_listeners() {
            listener.abort();
        }
    }
}

/// Only primary ownership counts; a queued or foreign owner is `NameTaken`.
fn name_reply(
    name: &str,
    reply: zbus::Result<RequestNameReply>,
) -> Result<(), ControllerError> {
    match reply {
        Ok(RequestNameReply::PrimaryOwner) => Ok(()),
        Ok(other) => Err(ControllerError::NameTaken {
            name: name.to_string(),
            reply: format!("{other:?}"),
        }),
        Err(zbus::Error::NameTaken) => Err(ControllerError::NameTaken {
            name: name.to_string(),
            reply: "Exists".to_string(),
        }),
        Err(e) => Err(ControllerError::BusUnavailable(format!(
            "RequestName({name}) failed: {e}"
        ))),
    }
}

fn match_rule(filter: &SignalFilter) -> zbus::Result<MatchRule<'_>> {
    Ok(MatchRule::builder()
        .msg_type(MessageType::Signal)
        .sender(filter.sender.as_str())?
        .path(filter.object_path.as_str())?
        .interface(filter.interface.as_str())?
        .member(filter.member.as_str())?
        .build())
}

fn subscription_error(e: zbus::Error) -> ControllerError {
    ControllerError::SubscriptionFailed(e.to_string())
}
