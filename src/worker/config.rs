//! Worker process configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bytecode::VmOptions;

/// Settings fixed at worker start-up, before any arguments are read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Orchestrator address.
    pub host: IpAddr,
    /// Watchdog threshold as a percentage of each pool's capacity.
    pub memory_threshold_percent: u8,
    /// Watchdog poll interval.
    pub watchdog_interval: Duration,
    /// Interpreter heap capacity.
    pub heap_limit_bytes: u64,
    /// Interpreter call depth limit.
    pub max_call_depth: usize,
    /// How long a cancelled test may keep running before it is abandoned.
    pub cancel_grace: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Optional resident-set limit watched next to the interpreter heap.
    pub process_memory_limit_bytes: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let vm = VmOptions::default();
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            memory_threshold_percent: 90,
            watchdog_interval: Duration::from_millis(50),
            heap_limit_bytes: vm.heap_limit_bytes,
            max_call_depth: vm.max_call_depth,
            cancel_grace: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            process_memory_limit_bytes: None,
        }
    }
}

impl WorkerConfig {
    /// Set orchestrator address.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Set watchdog threshold percentage.
    pub fn with_memory_threshold_percent(mut self, percent: u8) -> Self {
        self.memory_threshold_percent = percent;
        self
    }

    /// Set watchdog poll interval.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    /// Set interpreter heap capacity.
    pub fn with_heap_limit_bytes(mut self, bytes: u64) -> Self {
        self.heap_limit_bytes = bytes;
        self
    }

    /// Set interpreter call depth limit.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set cancellation grace period.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Also watch the process resident set against `bytes`.
    pub fn with_process_memory_limit_bytes(mut self, bytes: u64) -> Self {
        self.process_memory_limit_bytes = Some(bytes);
        self
    }

    /// Interpreter options derived from this configuration.
    pub fn vm_options(&self) -> VmOptions {
        VmOptions {
            heap_limit_bytes: self.heap_limit_bytes,
            max_call_depth: self.max_call_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_builder_overrides_work() {
        let default = WorkerConfig::default();
        assert_eq!(default.memory_threshold_percent, 90);
        assert!(default.host.is_loopback());
        assert_eq!(default.vm_options(), VmOptions::default());

        let cfg = WorkerConfig::default()
            .with_memory_threshold_percent(75)
            .with_heap_limit_bytes(65_536)
            .with_max_call_depth(32)
            .with_cancel_grace(Duration::from_millis(10))
            .with_watchdog_interval(Duration::from_millis(1))
            .with_connect_timeout(Duration::from_secs(1))
            .with_process_memory_limit_bytes(1 << 30);

        assert_eq!(cfg.memory_threshold_percent, 75);
        assert_eq!(
            cfg.vm_options(),
            VmOptions {
                heap_limit_bytes: 65_536,
                max_call_depth: 32,
            }
        );
        assert_eq!(cfg.cancel_grace, Duration::from_millis(10));
        assert_eq!(cfg.process_memory_limit_bytes, Some(1 << 30));
    }
}
