use sysinfo::{Pid, ProcessesToUpdate, System};

/// Samples memory and CPU of one process.
pub(crate) struct ResourceMonitor {
    system: System,
    pid: Pid,
}

impl ResourceMonitor {
    pub(crate) fn new(pid: u32) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
        }
    }

    /// Resident memory in MB and CPU in percent; `(0.0, 0.0)` when the process cannot be read.
    ///
    /// CPU usage is relative to the previous sample, so the first one is always 0.
    pub(crate) fn sample(&mut self) -> (f64, f64) {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        match self.system.process(self.pid) {
            Some(process) => (
                process.memory() as f64 / 1024.0 / 1024.0,
                f64::from(process.cpu_usage()),
            ),
            None => (0.0, 0.0),
        }
    }
}
