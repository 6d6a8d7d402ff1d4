use anyhow::Context;
use clap::Parser;
use scope_controller_core::{BusKind, JobMode, SupervisorConfig};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Run a worker inside a transient systemd scope and kill it when asked to stop.
///
/// Values are taken from the JSON file given with `--config` first, then
/// overridden by flags and `SCOPE_CONTROLLER_*` environment variables.
#[derive(Parser, Debug)]
#[command(name = "scope-controller", version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "SCOPE_CONTROLLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Well-known bus name to claim
    #[arg(long, env = "SCOPE_CONTROLLER_BUS_NAME")]
    pub bus_name: Option<String>,

    /// Bus to connect to: system or session
    #[arg(long, env = "SCOPE_CONTROLLER_BUS")]
    pub bus: Option<BusKind>,

    /// The supervisor's own unit name
    #[arg(long, env = "SCOPE_CONTROLLER_UNIT_NAME")]
    pub unit_name: Option<String>,

    /// Name of the transient scope created for the worker
    #[arg(long, env = "SCOPE_CONTROLLER_SCOPE_NAME")]
    pub scope_name: Option<String>,

    #[arg(long, env = "SCOPE_CONTROLLER_SLICE")]
    pub slice: Option<String>,

    /// Bus name of the control plane, the only accepted RequestStop sender
    #[arg(long, env = "SCOPE_CONTROLLER_CONTROL_PLANE")]
    pub control_plane: Option<String>,

    /// Job mode for the scope start: replace or fail
    #[arg(long, env = "SCOPE_CONTROLLER_JOB_MODE")]
    pub job_mode: Option<JobMode>,

    #[arg(long, env = "SCOPE_CONTROLLER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, env = "SCOPE_CONTROLLER_LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Worker command line, after `--`
    #[arg(last = true)]
    pub worker: Vec<String>,
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<SupervisorConfig> {
        let mut config = match &self.config {
            Some(path) => SupervisorConfig::from_json_file(path)
                .with_context(|| format!("reading configuration from {}", path.display()))?,
            None => SupervisorConfig::default(),
        };

        if let Some(bus_name) = self.bus_name {
            config.bus_name = bus_name;
        }
        if let Some(bus) = self.bus {
            config.bus = bus;
        }
        if let Some(unit_name) = self.unit_name {
            config.unit_name = unit_name;
        }
        if let Some(scope_name) = self.scope_name {
            config.scope_name = scope_name;
        }
        if let Some(slice) = self.slice {
            config.slice = slice;
        }
        if let Some(control_plane) = self.control_plane {
            config.control_plane = control_plane;
        }
        if let Some(job_mode) = self.job_mode {
            config.job_mode = job_mode;
        }

        let mut worker = self.worker.into_iter();
        if let Some(program) = worker.next() {
            config.command = program;
            config.args = worker.collect();
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}
