use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ControllerError;
use crate::control_plane::JobMode;
use crate::worker::WorkerCommand;

/// Which message bus the supervisor connects to
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    #[default]
    System,
    Session,
}

impl std::str::FromStr for BusKind {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(BusKind::System),
            "session" => Ok(BusKind::Session),
            other => Err(ControllerError::Config(format!("unknown bus: {other}"))),
        }
    }
}

/// Main supervisor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into, strip_option))]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisorConfig {
    /// Well-known name claimed exclusively on the bus
    #[builder(default = "default_bus_name()")]
    pub bus_name: String,
    #[builder(default)]
    pub bus: BusKind,
    /// The supervisor's own unit, used for logging only
    #[builder(default = "default_unit_name()")]
    pub unit_name: String,
    /// Name of the transient scope the worker is placed in
    #[builder(default = "default_scope_name()")]
    pub scope_name: String,
    #[builder(default = "default_slice()")]
    pub slice: String,
    /// Bus identity of the control plane; the only trusted RequestStop sender
    #[builder(default = "default_control_plane()")]
    pub control_plane: String,
    #[builder(default)]
    pub job_mode: JobMode,
    #[builder(default = "default_command()")]
    pub command: String,
    #[builder(default = "default_args()")]
    #[builder(setter(custom))]
    pub args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            bus_name: default_bus_name(),
            bus: BusKind::default(),
            unit_name: default_unit_name(),
            scope_name: default_scope_name(),
            slice: default_slice(),
            control_plane: default_control_plane(),
            job_mode: JobMode::default(),
            command: default_command(),
            args: default_args(),
            env: HashMap::new(),
            working_directory: None,
        }
    }
}

impl SupervisorConfig {
    pub fn builder() -> SupervisorConfigBuilder {
        SupervisorConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.command.trim().is_empty() {
            return Err(ControllerError::Config(
                "worker command cannot be empty".to_string(),
            ));
        }

        if self.bus_name.starts_with(':') || !self.bus_name.contains('.') {
            return Err(ControllerError::Config(format!(
                "bus name {} is not a well-known name",
                self.bus_name
            )));
        }

        if !self.scope_name.ends_with(".scope") || self.scope_name.len() <= ".scope".len() {
            return Err(ControllerError::Config(format!(
                "scope name {} must end in .scope",
                self.scope_name
            )));
        }

        if !self.slice.ends_with(".slice") {
            return Err(ControllerError::Config(format!(
                "slice {} must end in .slice",
                self.slice
            )));
        }

        if self.control_plane.is_empty() {
            return Err(ControllerError::Config(
                "control plane identity cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The worker command line described by this configuration
    pub fn worker_command(&self) -> WorkerCommand {
        WorkerCommand {
            program: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            working_directory: self.working_directory.clone(),
        }
    }
}

impl SupervisorConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }
}

// Default value functions for serde and the builder
fn default_bus_name() -> String {
    "com.example.scopecontroller1".to_string()
}
fn default_unit_name() -> String {
    "scope-controller.service".to_string()
}
fn default_scope_name() -> String {
    "scope-worker.scope".to_string()
}
fn default_slice() -> String {
    "system.slice".to_string()
}
fn default_control_plane() -> String {
    "org.freedesktop.systemd1".to_string()
}
fn default_command() -> String {
    "sleep".to_string()
}
fn default_args() -> Vec<String> {
    vec!["infinity".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupervisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bus, BusKind::System);
        assert_eq!(config.job_mode, JobMode::Replace);
        assert_eq!(config.command, "sleep");
        assert_eq!(config.args, vec!["infinity".to_string()]);
    }

    #[test]
    fn test_builder_matches_default() {
        let config = SupervisorConfig::builder().build().unwrap();
        assert_eq!(config, SupervisorConfig::default());
    }

    #[test]
    fn test_builder_overrides() {
        let config = SupervisorConfig::builder()
            .scope_name("batch-worker.scope")
            .command("python3")
            .args(["-m", "worker"])
            .env("MODE", "batch")
            .bus(BusKind::Session)
            .build()
            .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.args, vec!["-m".to_string(), "worker".to_string()]);
        assert_eq!(config.env.get("MODE").map(String::as_str), Some("batch"));

        let command = config.worker_command();
        assert_eq!(command.program, "python3");
        assert_eq!(command.args.len(), 2);
    }

    #[test]
    fn test_invalid_config() {
        let config = SupervisorConfig {
            command: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ControllerError::Config(_))));

        let config = SupervisorConfig {
            bus_name: ":1.42".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SupervisorConfig {
            scope_name: "worker.service".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SupervisorConfig {
            slice: "system".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bus_kind_from_str() {
        assert_eq!("session".parse::<BusKind>().unwrap(), BusKind::Session);
        assert_eq!("system".parse::<BusKind>().unwrap(), BusKind::System);
        assert!("starter".parse::<BusKind>().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SupervisorConfig =
            serde_json::from_str(r#"{"scopeName": "db-worker.scope", "bus": "session"}"#).unwrap();
        assert_eq!(config.scope_name, "db-worker.scope");
        assert_eq!(config.bus, BusKind::Session);
        assert_eq!(config.slice, "system.slice");
        assert_eq!(config.job_mode, JobMode::Replace);
    }
}
