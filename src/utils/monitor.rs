#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// Samples CPU and resident memory of the current process between job phases.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    state: Option<Mutex<MonitorState>>,
    start_time: Instant,
}

#[cfg(feature = "cli")]
struct MonitorState {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let state = if enabled {
            match sysinfo::get_current_pid() {
                Ok(pid) => {
                    let mut system = System::new();
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    Some(Mutex::new(MonitorState {
                        system,
                        pid,
                        peak_memory_mb: 0,
                    }))
                }
                Err(e) => {
                    tracing::warn!("System monitoring disabled, cannot resolve own pid: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            state,
            start_time: Instant::now(),
        }
    }

    pub fn get_stats(&self) -> Option<SystemStats> {
        let mut state = self.state.as_ref()?.lock().ok()?;
        let pid = state.pid;
        state
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = state.system.process(pid)?;
        let cpu_usage = process.cpu_usage();
        let memory_mb = process.memory() / 1024 / 1024;

        state.peak_memory_mb = state.peak_memory_mb.max(memory_mb);

        Some(SystemStats {
            cpu_usage,
            memory_usage_mb: memory_mb,
            peak_memory_mb: state.peak_memory_mb,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }

    pub fn log_final_stats(&self) {
        if let Some(stats) = self.get_stats() {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                stats.elapsed_time,
                stats.peak_memory_mb
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// No sysinfo without the cli feature: keep the same surface, do nothing.
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
