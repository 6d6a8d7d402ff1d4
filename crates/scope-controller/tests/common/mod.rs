#![allow(dead_code)]

use async_trait::async_trait;
use scope_controller::{
    BusSignal, ControlBus, ControlPlane, ControllerError, JobMode, PendingJob, ProcessId,
    ResourceGroupDescriptor, SignalFilter, SupervisorConfig,
};
use scope_controller_unix::ProcessTable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

/// Supervisor configuration with a short-lived `sleep` worker
pub fn sleeper_config() -> SupervisorConfig {
    SupervisorConfig::builder()
        .bus_name("com.example.scopetest1")
        .scope_name("scope-test.scope")
        .command("sleep")
        .args(["30"])
        .build()
        .unwrap()
}

/// Poll the process table until `pid` is gone
pub async fn wait_until_gone(pid: ProcessId) -> bool {
    let table = ProcessTable::new();
    for _ in 0..100 {
        if !table.is_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[derive(Default)]
pub struct MockBus {
    name_taken: bool,
    subscription_fails: bool,
    claimed: Mutex<Vec<String>>,
    filters: Mutex<Vec<SignalFilter>>,
    requests: Mutex<Option<mpsc::Sender<BusSignal>>>,
    closed: AtomicBool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_taken() -> Self {
        Self {
            name_taken: true,
            ..Self::default()
        }
    }

    pub fn with_failing_subscription() -> Self {
        Self {
            subscription_fails: true,
            ..Self::default()
        }
    }

    pub fn claimed(&self) -> Vec<String> {
        self.claimed.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<SignalFilter> {
        self.filters.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver `RequestStop` from the control plane on the subscribed scope
    pub async fn request_stop(&self) {
        let filter = self.filters().pop().expect("no subscription");
        let tx = self.requests.lock().unwrap().clone().expect("no subscription");
        tx.send(BusSignal {
            object_path: filter.object_path,
            member: filter.member,
            sender: Some(":1.1".to_string()),
        })
        .await
        .unwrap();
    }

    /// Drop the subscription as if the bus connection went away
    pub fn hang_up(&self) {
        self.requests.lock().unwrap().take();
    }
}

#[async_trait]
impl ControlBus for MockBus {
    async fn claim_name(&self, name: &str) -> Result<(), ControllerError> {
        if self.name_taken {
            return Err(ControllerError::NameTaken {
                name: name.to_string(),
                reply: "Exists".to_string(),
            });
        }
        self.claimed.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn subscribe(
        &self,
        filter: &SignalFilter,
    ) -> Result<mpsc::Receiver<BusSignal>, ControllerError> {
        if self.subscription_fails {
            return Err(ControllerError::SubscriptionFailed(
                "AddMatch rejected".to_string(),
            ));
        }
        let (tx, rx) = mpsc::channel(1);
        self.filters.lock().unwrap().push(filter.clone());
        *self.requests.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub descriptor: ResourceGroupDescriptor,
    pub mode: JobMode,
    /// Whether the member pid was live when the call was made
    pub member_alive: bool,
}

/// Control plane that answers every job with a fixed result token
#[derive(Clone)]
pub struct MockControlPlane {
    result: String,
    registrations: Arc<Mutex<Vec<Registration>>>,
}

impl MockControlPlane {
    pub fn with_result(result: &str) -> Self {
        Self {
            result: result.to_string(),
            registrations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn succeeding() -> Self {
        Self::with_result("done")
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn start_resource_group(
        &self,
        descriptor: &ResourceGroupDescriptor,
        mode: JobMode,
    ) -> Result<PendingJob, ControllerError> {
        let member_alive = ProcessTable::new().is_alive(descriptor.member());
        self.registrations.lock().unwrap().push(Registration {
            descriptor: descriptor.clone(),
            mode,
            member_alive,
        });

        let (tx, rx) = oneshot::channel();
        tx.send(self.result.clone()).unwrap();
        Ok(PendingJob::new("/org/freedesktop/systemd1/job/42", rx))
    }
}
