use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Host-level facts reported in the broker's state-of-health broadcast.
///
/// Passed into the queue at construction so embedders and tests can inject
/// a fake instead of relying on process-wide state.
pub trait HostMonitor: Send {
    fn hostname(&self) -> String;
    fn program_name(&self) -> String;
    fn pid(&self) -> u32;
    /// Total memory of the machine in bytes.
    fn total_memory(&self) -> u64;
    /// Current CPU usage of this process as a fraction of one core.
    fn cpu_usage(&self) -> f64;
    /// Resident memory of this process in bytes.
    fn memory_usage(&self) -> u64;
}

/// Default monitor backed by `sysinfo`.
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    program_name: String,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let program_name = std::env::current_exe()
            .ok()
            .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
            program_name,
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMonitor for SystemMonitor {
    fn hostname(&self) -> String {
        System::host_name().unwrap_or_default()
    }

    fn program_name(&self) -> String {
        self.program_name.clone()
    }

    fn pid(&self) -> u32 {
        self.pid.map(|pid| pid.as_u32()).unwrap_or_default()
    }

    fn total_memory(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.total_memory()
    }

    fn cpu_usage(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_cpu();
        f64::from(system.global_cpu_info().cpu_usage()) / 100.0
    }

    fn memory_usage(&self) -> u64 {
        let Some(pid) = self.pid else { return 0 };
        let mut system = self.system.lock();
        system.refresh_process(pid);
        system.process(pid).map(|process| process.memory()).unwrap_or_default()
    }
}
