use scope_controller_core::ProcessId;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// Read-only view of the OS process table
pub struct ProcessTable {
    system: std::sync::Mutex<System>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }

    /// Whether `pid` is present in the process table and not a zombie.
    pub fn is_alive(&self, pid: ProcessId) -> bool {
        let sys_pid = Pid::from_u32(pid.as_u32());
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);

        match system.process(sys_pid) {
            Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
            None => false,
        }
    }
}
