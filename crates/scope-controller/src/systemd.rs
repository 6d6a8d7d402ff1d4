//! systemd manager client.
//!
//! Creates the transient scope that accounts for the worker and follows its
//! job through `JobRemoved`. The manager's stop calls are not exposed here.

use async_trait::async_trait;
use futures::StreamExt;
use scope_controller_core::{
    ControlPlane, ControllerError, JobMode, PendingJob, ResourceGroupDescriptor,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use zbus::Connection;
use zbus::proxy;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, Value};

#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    gen_blocking = false
)]
trait Manager {
    /// Enable delivery of job and unit signals to this connection
    fn subscribe(&self) -> zbus::Result<()>;

    #[allow(clippy::type_complexity)]
    fn start_transient_unit(
        &self,
        name: &str,
        mode: &str,
        properties: &[(&str, Value<'_>)],
        aux: &[(&str, &[(&str, Value<'_>)])],
    ) -> zbus::Result<OwnedObjectPath>;

    #[zbus(signal)]
    fn job_removed(
        &self,
        id: u32,
        job: ObjectPath<'_>,
        unit: &str,
        result: &str,
    ) -> zbus::Result<()>;
}

/// [`ControlPlane`] backed by the systemd manager
pub struct SystemdClient {
    manager: ManagerProxy<'static>,
}

impl SystemdClient {
    pub async fn new(connection: &Connection) -> Result<Self, ControllerError> {
        let manager = ManagerProxy::new(connection)
            .await
            .map_err(|e| ControllerError::BusUnavailable(format!("systemd manager: {e}")))?;

        // Without it JobRemoved is only delivered when another client subscribed.
        subscription_outcome(manager.subscribe().await)?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl ControlPlane for SystemdClient {
    async fn start_resource_group(
        &self,
        descriptor: &ResourceGroupDescriptor,
        mode: JobMode,
    ) -> Result<PendingJob, ControllerError> {
        // Listen before submitting, or a fast job can finish unobserved.
        let mut removed = self
            .manager
            .receive_job_removed()
            .await
            .map_err(registration_error)?;

        let properties = [
            ("Slice", Value::from(descriptor.slice())),
            ("PIDs", Value::from(vec![descriptor.member().as_u32()])),
            ("Controller", Value::from(descriptor.controller())),
        ];
        let aux: [(&str, &[(&str, Value<'_>)]); 0] = [];

        let job = self
            .manager
            .start_transient_unit(descriptor.name(), mode.as_str(), &properties, &aux)
            .await
            .map_err(registration_error)?;
        let job_path = job.as_str().to_string();
        info!(
            "Submitted job {} for {} (PID {}, mode {})",
            job_path,
            descriptor.name(),
            descriptor.member(),
            mode
        );

        let (tx, rx) = oneshot::channel();
        let watched = job_path.clone();
        tokio::spawn(async move {
            while let Some(signal) = removed.next().await {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(e) => {
                        warn!("Unreadable JobRemoved signal: {}", e);
                        continue;
                    }
                };
                if args.job().as_str() != watched {
                    continue;
                }

                debug!(
                    "Job {} for {} removed with result {}",
                    watched,
                    args.unit(),
                    args.result()
                );
                let _ = tx.send(args.result().to_string());
                return;
            }
            warn!("JobRemoved stream ended before job {} finished", watched);
        });

        Ok(PendingJob::new(job_path, rx))
    }
}

fn registration_error(e: zbus::Error) -> ControllerError {
    ControllerError::RegistrationFailed(e.to_string())
}

/// A refused `Subscribe` would leave registration waiting forever.
fn subscription_outcome(result: zbus::Result<()>) -> Result<(), ControllerError> {
    result.map_err(|e| ControllerError::BusUnavailable(format!("Manager.Subscribe failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_subscription_is_fatal() {
        assert!(subscription_outcome(Ok(())).is_ok());

        let error = subscription_outcome(Err(zbus::Error::Failure("access denied".to_string())))
            .unwrap_err();
        assert!(matches!(error, ControllerError::BusUnavailable(_)));
        assert!(error.is_startup_failure());
        assert!(error.to_string().contains("Manager.Subscribe"));
    }

    #[test]
    fn test_transport_errors_fail_registration() {
        let error = registration_error(zbus::Error::Failure("unit exists".to_string()));
        assert!(matches!(error, ControllerError::RegistrationFailed(_)));
        assert_eq!(error.step(), "register");
    }
}
