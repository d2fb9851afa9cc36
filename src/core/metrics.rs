/// Metric sources sampled by the background sampler
///
/// A source reports an ordered list of series names once and then produces
/// one value per series every time it is sampled.
///
/// Implemented sources:
/// - `ProcessMemory`: resident and virtual size of this process plus
///   system-wide used memory and swap, in MB (via sysinfo)

use parking_lot::Mutex;
use sysinfo::{Pid, System};

use crate::error::SourceError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub trait MetricsSource: Send + Sync {
    /// Series names, in the order `sample` returns values
    fn series(&self) -> &[String];

    fn sample(&self) -> Result<Vec<f64>, SourceError>;
}

pub struct ProcessMemory {
    pid: Pid,
    system: Mutex<System>,
    series: Vec<String>,
}

impl ProcessMemory {
    /// Track the current process
    pub fn current() -> Result<Self, SourceError> {
        let pid = sysinfo::get_current_pid().map_err(|e| SourceError::Other(e.to_string()))?;
        Ok(Self::for_pid(pid))
    }

    pub fn for_pid(pid: Pid) -> Self {
        Self {
            pid,
            system: Mutex::new(System::new()),
            series: ["Resident", "Virtual", "System Used", "Swap Used"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MetricsSource for ProcessMemory {
    fn series(&self) -> &[String] {
        &self.series
    }

    fn sample(&self) -> Result<Vec<f64>, SourceError> {
        let mut system = self.system.lock();

        if !system.refresh_process(self.pid) {
            return Err(SourceError::ProcessNotFound(self.pid.as_u32()));
        }
        system.refresh_memory();

        let process = system
            .process(self.pid)
            .ok_or(SourceError::ProcessNotFound(self.pid.as_u32()))?;

        Ok(vec![
            process.memory() as f64 / BYTES_PER_MB,
            process.virtual_memory() as f64 / BYTES_PER_MB,
            system.used_memory() as f64 / BYTES_PER_MB,
            system.used_swap() as f64 / BYTES_PER_MB,
        ])
    }
}
