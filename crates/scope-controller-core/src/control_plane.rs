use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

use crate::ControllerError;
use crate::descriptor::ResourceGroupDescriptor;

/// Completion token the control plane reports for a successful job.
pub const JOB_SUCCESS_TOKEN: &str = "done";

/// How the control plane treats a conflicting job already queued for the same unit
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Supersede the conflicting job
    #[default]
    Replace,
    /// Fail instead of touching the conflicting job
    Fail,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Replace => "replace",
            JobMode::Fail => "fail",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobMode {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(JobMode::Replace),
            "fail" => Ok(JobMode::Fail),
            other => Err(ControllerError::Config(format!("unknown job mode: {other}"))),
        }
    }
}

/// Terminal outcome of a control-plane job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Done,
    Canceled,
    Timeout,
    Failed,
    Dependency,
    Skipped,
    /// Any token this client does not know about
    Other(String),
}

impl JobResult {
    pub fn from_token(token: &str) -> Self {
        match token {
            JOB_SUCCESS_TOKEN => JobResult::Done,
            "canceled" => JobResult::Canceled,
            "timeout" => JobResult::Timeout,
            "failed" => JobResult::Failed,
            "dependency" => JobResult::Dependency,
            "skipped" => JobResult::Skipped,
            other => JobResult::Other(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            JobResult::Done => JOB_SUCCESS_TOKEN,
            JobResult::Canceled => "canceled",
            JobResult::Timeout => "timeout",
            JobResult::Failed => "failed",
            JobResult::Dependency => "dependency",
            JobResult::Skipped => "skipped",
            JobResult::Other(token) => token,
        }
    }

    /// Only the literal success token counts as success.
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Done)
    }

    /// Convert into a `Result`, failing with `RegistrationFailed` on anything but success.
    pub fn into_result(self) -> Result<(), ControllerError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(ControllerError::RegistrationFailed(self.token().to_string()))
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A submitted control-plane job whose outcome has not been observed yet
#[derive(Debug)]
pub struct PendingJob {
    job_path: String,
    outcome: oneshot::Receiver<String>,
}

impl PendingJob {
    pub fn new(job_path: impl Into<String>, outcome: oneshot::Receiver<String>) -> Self {
        Self {
            job_path: job_path.into(),
            outcome,
        }
    }

    pub fn job_path(&self) -> &str {
        &self.job_path
    }

    /// Wait for the job to finish. No timeout is applied.
    pub async fn outcome(self) -> Result<JobResult, ControllerError> {
        let token = self.outcome.await.map_err(|_| {
            ControllerError::RegistrationFailed(format!(
                "job {} vanished without a result",
                self.job_path
            ))
        })?;
        Ok(JobResult::from_token(&token))
    }
}

/// Client of the control plane that owns resource-group accounting.
///
/// There is no way to stop a resource group here: stopping it
/// through the same job queue as its creation can deadlock against the pending
/// creation job. The group is reclaimed by the control plane once its only
/// member process exits.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Submit a creation job for the described resource group.
    async fn start_resource_group(
        &self,
        descriptor: &ResourceGroupDescriptor,
        mode: JobMode,
    ) -> Result<PendingJob, ControllerError>;
}
