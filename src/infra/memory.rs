// ============================================================
// Layer 6 — Memory Tracker
// ============================================================
// Samples this process's resident memory with sysinfo and keeps
// the peak. Sampled once per epoch by the trainer; the peak ends
// up in the run summary and on stdout.

use sysinfo::{get_current_pid, Pid, ProcessesToUpdate, System};

pub struct MemoryTracker {
    sys:  System,
    pid:  Option<Pid>,
    peak: u64,
}

impl MemoryTracker {
    pub fn new() -> Self {
        let pid = get_current_pid()
            .map_err(|e| tracing::warn!("Cannot resolve own pid, memory stays 0: {e}"))
            .ok();
        Self { sys: System::new(), pid, peak: 0 }
    }

    /// Refresh the resident set size and return it in bytes
    pub fn sample(&mut self) -> u64 {
        let Some(pid) = self.pid else { return 0 };

        self.sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let current = self.sys.process(pid).map(|p| p.memory()).unwrap_or(0);

        self.peak = self.peak.max(current);
        current
    }

    /// Highest value returned by `sample` so far
    pub fn peak_bytes(&self) -> u64 {
        self.peak
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_samples() {
        let mut tracker = MemoryTracker::new();
        assert_eq!(tracker.peak_bytes(), 0);

        let current = tracker.sample();
        assert!(current > 0);
        assert!(tracker.peak_bytes() >= current);
    }
}
