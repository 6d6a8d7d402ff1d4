use crate::ControllerError;
use crate::config::SupervisorConfig;
use crate::worker::ProcessId;

/// Immutable record submitted once to the control plane to create a resource group.
///
/// After submission the control plane owns the group; the supervisor only keeps
/// the name around to address the stop-signal subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupDescriptor {
    name: String,
    slice: String,
    member: ProcessId,
    controller: String,
}

impl ResourceGroupDescriptor {
    /// Build a descriptor. The member must be a real process id; zero is rejected.
    pub fn new(
        name: impl Into<String>,
        slice: impl Into<String>,
        member: ProcessId,
        controller: impl Into<String>,
    ) -> Result<Self, ControllerError> {
        if member.as_u32() == 0 {
            return Err(ControllerError::Config(
                "resource group member process id cannot be 0".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            slice: slice.into(),
            member,
            controller: controller.into(),
        })
    }

    /// Descriptor placing `member` in the configured scope, controlled by our bus name.
    pub fn for_worker(config: &SupervisorConfig, member: ProcessId) -> Result<Self, ControllerError> {
        Self::new(
            config.scope_name.clone(),
            config.slice.clone(),
            member,
            config.bus_name.clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slice(&self) -> &str {
        &self.slice
    }

    pub fn member(&self) -> ProcessId {
        self.member
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_from_config() {
        let config = SupervisorConfig::default();
        let descriptor = ResourceGroupDescriptor::for_worker(&config, ProcessId(4242)).unwrap();

        assert_eq!(descriptor.name(), "scope-worker.scope");
        assert_eq!(descriptor.slice(), "system.slice");
        assert_eq!(descriptor.member(), ProcessId(4242));
        assert_eq!(descriptor.controller(), "com.example.scopecontroller1");
    }

    #[test]
    fn test_zero_pid_rejected() {
        let result = ResourceGroupDescriptor::new(
            "scope-worker.scope",
            "system.slice",
            ProcessId(0),
            "com.example.scopecontroller1",
        );
        assert!(matches!(result, Err(ControllerError::Config(_))));
    }
}
