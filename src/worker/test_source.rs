//! Tests wrapped with the per-test time allowance.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::args::{TestCase, TimeoutStrategy};
use super::host::{HostError, HostRuntime};
use crate::bytecode::{CancelToken, Value};

const TEST_THREAD_STACK_BYTES: usize = 64 * 1024 * 1024;

/// Outcome of one bounded test execution.
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome {
    /// Expectation met.
    Passed,
    /// The invocation raised or returned something else.
    Failed(String),
    /// Exceeded the allowance and stopped once cancelled.
    TimedOut,
    /// The test thread died.
    Errored(String),
    /// The invocation exhausted host memory.
    OutOfMemory(String),
    /// Exceeded the allowance and ignored cancellation for the whole grace period.
    Abandoned,
}

/// Supplies tests decorated with their allowances.
#[derive(Debug, Clone)]
pub struct TimeoutDecoratedTestSource {
    strategy: TimeoutStrategy,
    grace: Duration,
    tests: Vec<Arc<TestCase>>,
}

impl TimeoutDecoratedTestSource {
    /// Source over `tests`; a test still running `grace` after cancellation is abandoned.
    pub fn new(strategy: TimeoutStrategy, grace: Duration, tests: Vec<TestCase>) -> Self {
        Self {
            strategy,
            grace,
            tests: tests.into_iter().map(Arc::new).collect(),
        }
    }

    /// Number of tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether there are no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Tests in order.
    pub fn tests(&self) -> impl Iterator<Item = TimeoutDecoratedTest> + '_ {
        self.tests.iter().map(|case| TimeoutDecoratedTest {
            allowed: self.strategy.allowed(case.expected_millis),
            grace: self.grace,
            case: Arc::clone(case),
        })
    }
}

/// One test with its allowance.
#[derive(Debug, Clone)]
pub struct TimeoutDecoratedTest {
    case: Arc<TestCase>,
    allowed: Duration,
    grace: Duration,
}

impl TimeoutDecoratedTest {
    /// Underlying test.
    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Time the test may take.
    pub fn allowed(&self) -> Duration {
        self.allowed
    }

    /// Run on a dedicated thread against `host`.
    pub fn run(&self, host: &Arc<dyn HostRuntime>) -> TestOutcome {
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::sync_channel::<Result<Option<Value>, HostError>>(1);
        let spawned = {
            let host = Arc::clone(host);
            let case = Arc::clone(&self.case);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("test-{}", self.case.id))
                .stack_size(TEST_THREAD_STACK_BYTES)
                .spawn(move || {
                    let outcome = host.invoke(&case.target, case.args.clone(), &cancel);
                    let _ = tx.send(outcome);
                })
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => return TestOutcome::Errored(format!("cannot spawn test thread: {err}")),
        };

        let received = match rx.recv_timeout(self.allowed) {
            Ok(received) => received,
            Err(RecvTimeoutError::Disconnected) => {
                return TestOutcome::Errored(panic_message(handle.join()));
            }
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                tracing::debug!(test = %self.case.id, allowed = ?self.allowed, "test timed out");
                return match rx.recv_timeout(self.grace) {
                    Err(RecvTimeoutError::Timeout) => TestOutcome::Abandoned,
                    Ok(_) | Err(RecvTimeoutError::Disconnected) => {
                        let _ = handle.join();
                        TestOutcome::TimedOut
                    }
                };
            }
        };
        let _ = handle.join();

        match received {
            Ok(returned) if self.case.expect.matches(returned.as_ref()) => TestOutcome::Passed,
            Ok(returned) => TestOutcome::Failed(format!(
                "expected {:?}, got {:?}",
                self.case.expect, returned
            )),
            Err(err @ HostError::OutOfMemory { .. }) => TestOutcome::OutOfMemory(err.to_string()),
            Err(err) => TestOutcome::Failed(err.to_string()),
        }
    }
}

fn panic_message(joined: thread::Result<()>) -> String {
    match joined {
        Ok(()) => "test thread exited without a result".to_string(),
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "test thread panicked".to_string()),
    }
}
