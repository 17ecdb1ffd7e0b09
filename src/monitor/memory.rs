//! Host memory introspection.
//!
//! Not every host can report process memory. The probe returns `None` in
//! that case, and consumers treat it as "unknown" rather than zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use sysinfo::{Pid, System};

/// Source of the current process memory footprint
pub trait MemoryProbe: Send + Sync {
    /// Resident memory of this process in bytes, if the host reports it
    fn memory_usage(&self) -> Option<u64>;
}

/// sysinfo-backed probe for the current process
pub struct SysinfoProbe {
    sys: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    /// Create a probe for the current process
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn memory_usage(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut sys = self.sys.lock().ok()?;
        if !sys.refresh_process(pid) {
            return None;
        }
        sys.process(pid).map(|process| process.memory())
    }
}

/// Probe for hosts without memory introspection
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn memory_usage(&self) -> Option<u64> {
        None
    }
}

/// Probe reporting a settable value
#[derive(Debug, Default)]
pub struct FixedMemoryProbe {
    bytes: AtomicU64,
}

impl FixedMemoryProbe {
    /// Create a probe reporting `bytes`
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: AtomicU64::new(bytes),
        }
    }

    /// Change the reported value
    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Relaxed);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn memory_usage(&self) -> Option<u64> {
        Some(self.bytes.load(Ordering::Relaxed))
    }
}
