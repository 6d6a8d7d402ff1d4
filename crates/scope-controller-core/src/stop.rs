//! Stop-trigger multiplexer.
//!
//! Two independent listeners each deposit at most one event into their own
//! single-slot queue: the OS signal router and the bus `RequestStop`
//! subscription. [`StopTrigger::await_stop`] blocks until either queue yields
//! and reports which one fired. The trigger is consumed by the wait, so it
//! cannot be re-armed.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ControllerError;
use crate::bus::BusSignal;

/// Capacity of each stop source queue.
pub const STOP_QUEUE_CAPACITY: usize = 1;

/// OS signals that request a shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
    HangUp,
}

impl TerminationSignal {
    pub const ALL: [TerminationSignal; 3] = [
        TerminationSignal::Interrupt,
        TerminationSignal::Terminate,
        TerminationSignal::HangUp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::HangUp => "SIGHUP",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which source fired. The shutdown that follows is the same either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopSource {
    Signal(TerminationSignal),
    BusRequest(BusSignal),
}

impl fmt::Display for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSource::Signal(signal) => write!(f, "signal {signal}"),
            StopSource::BusRequest(signal) => {
                write!(f, "{} on {}", signal.member, signal.object_path)
            }
        }
    }
}

/// One-shot merge of the OS signal queue and the bus stop queue
pub struct StopTrigger {
    signals: mpsc::Receiver<TerminationSignal>,
    bus: mpsc::Receiver<BusSignal>,
}

impl StopTrigger {
    pub fn new(
        signals: mpsc::Receiver<TerminationSignal>,
        bus: mpsc::Receiver<BusSignal>,
    ) -> Self {
        Self { signals, bus }
    }

    /// Wait until one source yields. A source whose listener goes away is
    /// dropped from the wait; if both go away the wait fails.
    pub async fn await_stop(mut self) -> Result<StopSource, ControllerError> {
        let mut signals_open = true;
        let mut bus_open = true;

        loop {
            tokio::select! {
                biased;

                event = self.signals.recv(), if signals_open => match event {
                    Some(signal) => {
                        debug!("Stop trigger fired by {}", signal);
                        return Ok(StopSource::Signal(signal));
                    }
                    None => {
                        warn!("OS signal listener closed; waiting on bus only");
                        signals_open = false;
                    }
                },
                event = self.bus.recv(), if bus_open => match event {
                    Some(signal) => {
                        debug!("Stop trigger fired by bus signal {}", signal.member);
                        return Ok(StopSource::BusRequest(signal));
                    }
                    None => {
                        warn!("Bus signal listener closed; waiting on OS signals only");
                        bus_open = false;
                    }
                },
                else => return Err(ControllerError::StopSourcesClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request_stop() -> BusSignal {
        BusSignal {
            object_path: "/org/freedesktop/systemd1/unit/scope_2dworker_2escope".to_string(),
            member: "RequestStop".to_string(),
            sender: Some(":1.1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_signal_without_bus_event() {
        let (signal_tx, signal_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let (_bus_tx, bus_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let trigger = StopTrigger::new(signal_rx, bus_rx);

        signal_tx.send(TerminationSignal::Interrupt).await.unwrap();

        let source = trigger.await_stop().await.unwrap();
        assert_eq!(source, StopSource::Signal(TerminationSignal::Interrupt));
    }

    #[tokio::test]
    async fn test_bus_event_without_signal() {
        let (_signal_tx, signal_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let (bus_tx, bus_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let trigger = StopTrigger::new(signal_rx, bus_rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            bus_tx.send(request_stop()).await.unwrap();
        });

        let source = trigger.await_stop().await.unwrap();
        assert_eq!(source, StopSource::BusRequest(request_stop()));
    }

    #[tokio::test]
    async fn test_only_first_event_consumed() {
        let (signal_tx, signal_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let (bus_tx, bus_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let trigger = StopTrigger::new(signal_rx, bus_rx);

        signal_tx.send(TerminationSignal::HangUp).await.unwrap();
        bus_tx.send(request_stop()).await.unwrap();

        let source = trigger.await_stop().await.unwrap();
        assert_eq!(source, StopSource::Signal(TerminationSignal::HangUp));

        // The trigger is gone; late events have nowhere to go.
        assert!(bus_tx.send(request_stop()).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_source_falls_back_to_other() {
        let (signal_tx, signal_rx) = mpsc::channel::<TerminationSignal>(STOP_QUEUE_CAPACITY);
        let (bus_tx, bus_rx) = mpsc::channel(STOP_QUEUE_CAPACITY);
        let trigger = StopTrigger::new(signal_rx, bus_rx);

        drop(signal_tx);
        bus_tx.send(request_stop()).await.unwrap();

        assert!(matches!(
            trigger.await_stop().await,
            Ok(StopSource::BusRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_all_sources_closed() {
        let (signal_tx, signal_rx) = mpsc::channel::<TerminationSignal>(STOP_QUEUE_CAPACITY);
        let (bus_tx, bus_rx) = mpsc::channel::<BusSignal>(STOP_QUEUE_CAPACITY);
        let trigger = StopTrigger::new(signal_rx, bus_rx);

        drop(signal_tx);
        drop(bus_tx);

        assert!(matches!(
            trigger.await_stop().await,
            Err(ControllerError::StopSourcesClosed)
        ));
    }

    #[test]
    fn test_stop_source_display() {
        assert_eq!(
            StopSource::Signal(TerminationSignal::Terminate).to_string(),
            "signal SIGTERM"
        );
        assert!(
            StopSource::BusRequest(request_stop())
                .to_string()
                .starts_with("RequestStop on /org/freedesktop")
        );
    }
}
