//! Memory watchdog: polls usage-threshold counters and fires once on breach.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::bytecode::HeapPool;

/// A monitored memory pool with a usage threshold.
pub trait MemoryPool: Send + Sync {
    /// Pool name for diagnostics.
    fn name(&self) -> &str;
    /// Bytes in use.
    fn used(&self) -> u64;
    /// Capacity in bytes.
    fn max(&self) -> u64;
    /// Arm the threshold, in bytes.
    fn set_usage_threshold(&self, bytes: u64);
    /// Number of times usage crossed the threshold.
    fn usage_threshold_count(&self) -> u64;
}

impl MemoryPool for HeapPool {
    fn name(&self) -> &str {
        HeapPool::name(self)
    }

    fn used(&self) -> u64 {
        HeapPool::used(self)
    }

    fn max(&self) -> u64 {
        HeapPool::max(self)
    }

    fn set_usage_threshold(&self, bytes: u64) {
        HeapPool::set_usage_threshold(self, bytes);
    }

    fn usage_threshold_count(&self) -> u64 {
        HeapPool::usage_threshold_count(self)
    }
}

/// Resident set size of this process, read from `/proc/self/statm`.
///
/// Crossings are sampled when the count is polled. Where the file is not
/// available usage reads as zero and the pool never fires.
#[derive(Debug)]
pub struct ProcessMemoryPool {
    limit: u64,
    threshold: AtomicU64,
    above: AtomicBool,
    count: AtomicU64,
}

const PAGE_BYTES: u64 = 4096;

impl ProcessMemoryPool {
    /// Pool with a resident-size limit.
    pub fn new(limit_bytes: u64) -> Self {
        Self {
            limit: limit_bytes,
            threshold: AtomicU64::new(0),
            above: AtomicBool::new(false),
            count: AtomicU64::new(0),
        }
    }

    fn resident_bytes() -> u64 {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|statm| statm.split_whitespace().nth(1)?.parse::<u64>().ok())
            .map_or(0, |pages| pages * PAGE_BYTES)
    }
}

impl MemoryPool for ProcessMemoryPool {
    fn name(&self) -> &str {
        "process resident set"
    }

    fn used(&self) -> u64 {
        Self::resident_bytes()
    }

    fn max(&self) -> u64 {
        self.limit
    }

    fn set_usage_threshold(&self, bytes: u64) {
        self.threshold.store(bytes, Ordering::SeqCst);
    }

    fn usage_threshold_count(&self) -> u64 {
        let threshold = self.threshold.load(Ordering::SeqCst);
        let above = threshold > 0 && self.used() >= threshold;
        if above && !self.above.swap(true, Ordering::SeqCst) {
            self.count.fetch_add(1, Ordering::SeqCst);
        } else if !above {
            self.above.store(false, Ordering::SeqCst);
        }
        self.count.load(Ordering::SeqCst)
    }
}

/// Delivered once when a pool crosses its threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryNotification {
    /// Offending pool.
    pub pool_name: String,
    /// Threshold crossings so far.
    pub count: u64,
    /// Bytes in use when noticed.
    pub used: u64,
    /// Pool capacity.
    pub max: u64,
}

/// Watches pools on a background thread.
pub struct MemoryWatchdog {
    pools: Vec<Arc<dyn MemoryPool>>,
    threshold_percent: u8,
    interval: Duration,
}

impl std::fmt::Debug for MemoryWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryWatchdog")
            .field("pools", &self.pools.iter().map(|p| p.name().to_string()).collect::<Vec<_>>())
            .field("threshold_percent", &self.threshold_percent)
            .field("interval", &self.interval)
            .finish()
    }
}

impl MemoryWatchdog {
    /// Watchdog firing at `threshold_percent` of each pool's capacity.
    pub fn new(threshold_percent: u8, interval: Duration) -> Self {
        Self {
            pools: Vec::new(),
            threshold_percent: threshold_percent.clamp(1, 100),
            interval,
        }
    }

    /// Add a pool.
    pub fn watch(mut self, pool: Arc<dyn MemoryPool>) -> Self {
        self.pools.push(pool);
        self
    }

    /// Arm thresholds and start polling. `on_breach` runs at most once, on the
    /// watchdog thread. Stopping polls one last time, so a crossing that was
    /// not yet observed still fires.
    pub fn start<F>(self, on_breach: F) -> std::io::Result<WatchdogHandle>
    where
        F: FnOnce(MemoryNotification) + Send + 'static,
    {
        let baselines: Vec<u64> = self
            .pools
            .iter()
            .map(|pool| {
                let threshold = pool.max() / 100 * u64::from(self.threshold_percent)
                    + pool.max() % 100 * u64::from(self.threshold_percent) / 100;
                pool.set_usage_threshold(threshold);
                tracing::debug!(pool = pool.name(), threshold, "memory threshold armed");
                pool.usage_threshold_count()
            })
            .collect();

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            let pools = self.pools;
            let interval = self.interval;
            thread::Builder::new()
                .name("memory-watchdog".to_string())
                .spawn(move || {
                    loop {
                        // A breach that happened just before `stop` is still delivered.
                        let stopping = stop.load(Ordering::SeqCst);
                        let breached = pools.iter().zip(&baselines).find_map(|(pool, base)| {
                            let count = pool.usage_threshold_count();
                            (count > *base).then(|| MemoryNotification {
                                pool_name: pool.name().to_string(),
                                count,
                                used: pool.used(),
                                max: pool.max(),
                            })
                        });
                        if let Some(notification) = breached {
                            on_breach(notification);
                            return;
                        }
                        if stopping {
                            return;
                        }
                        thread::park_timeout(interval);
                    }
                })?
        };
        Ok(WatchdogHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Stops the watchdog when dropped.
#[derive(Debug)]
pub struct WatchdogHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchdogHandle {
    /// Poll once more, stop and wait for the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
