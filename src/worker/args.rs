//! Request payload sent once from the orchestrator to a worker.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bytecode::{MethodRef, Value};
use crate::engine::{EngineConfig, MutationIdentifier};

/// How long a single test may run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TimeoutStrategy {
    /// Same allowance for every test.
    Fixed {
        /// Allowance in milliseconds.
        millis: u64,
    },
    /// `expected * factor + constant`, where `expected` is the test's
    /// unmutated run time.
    PercentAndConstant {
        /// Multiplier applied to the expected time.
        factor: f32,
        /// Added on top, in milliseconds.
        constant_millis: u64,
    },
}

impl Default for TimeoutStrategy {
    fn default() -> Self {
        Self::PercentAndConstant {
            factor: 1.25,
            constant_millis: 4_000,
        }
    }
}

impl TimeoutStrategy {
    /// Allowance for a test whose unmutated run took `expected_millis`.
    pub fn allowed(&self, expected_millis: u64) -> Duration {
        match *self {
            Self::Fixed { millis } => Duration::from_millis(millis),
            Self::PercentAndConstant {
                factor,
                constant_millis,
            } => {
                let scaled = (expected_millis as f64 * f64::from(factor.max(0.0))) as u64;
                Duration::from_millis(scaled.saturating_add(constant_millis))
            }
        }
    }
}

/// Test name as reported in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestId(pub String);

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a passing test observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expectation {
    /// The invocation returns this value. NaN matches NaN.
    Returns(Value),
    /// The invocation returns without raising.
    Completes,
}

impl Expectation {
    /// Whether `returned` satisfies the expectation.
    pub fn matches(&self, returned: Option<&Value>) -> bool {
        match self {
            Self::Returns(expected) => returned.is_some_and(|value| value.same_as(expected)),
            Self::Completes => true,
        }
    }
}

/// One declarative test: invoke `target` with `args` and check the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Name.
    pub id: TestId,
    /// Static method to invoke.
    pub target: MethodRef,
    /// Arguments.
    pub args: Vec<Value>,
    /// Expected outcome.
    pub expect: Expectation,
    /// Run time against the unmutated code, in milliseconds.
    pub expected_millis: u64,
}

impl TestCase {
    /// Test expecting `target(args) == value`.
    pub fn returns(
        id: impl Into<String>,
        target: MethodRef,
        args: Vec<Value>,
        value: Value,
    ) -> Self {
        Self {
            id: TestId(id.into()),
            target,
            args,
            expect: Expectation::Returns(value),
            expected_millis: 0,
        }
    }

    /// Set the unmutated run time.
    pub fn with_expected_millis(mut self, millis: u64) -> Self {
        self.expected_millis = millis;
        self
    }
}

/// Everything a worker needs for one invocation. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaveArguments {
    /// Switch logging to debug.
    pub verbose: bool,
    /// Per-test allowance.
    pub timeout_strategy: TimeoutStrategy,
    /// Mutations to test, in order.
    pub mutations: Vec<MutationIdentifier>,
    /// Tests run against every mutation.
    pub tests: Vec<TestCase>,
    /// Operators used to rebuild each mutant.
    pub config: EngineConfig,
    /// Encoded classes loaded before testing.
    pub classpath: Vec<Vec<u8>>,
}
