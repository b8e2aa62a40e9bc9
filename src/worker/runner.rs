//! Sequential per-mutation test loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use super::args::TestId;
use super::host::{HostError, HostRuntime};
use super::reporter::{Reporter, ReporterError};
use super::status::{MutationResult, MutationStatus};
use super::test_source::{TestOutcome, TimeoutDecoratedTestSource};
use crate::bytecode::decode_class;
use crate::engine::{EngineError, Mutater, MutationIdentifier};

/// Conditions that end the whole batch.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An interrupt was received between mutations.
    #[error("interrupted")]
    Interrupted,
    /// A result could not be sent.
    #[error("cannot report result: {0}")]
    Report(#[from] ReporterError),
    /// The original class could not be put back.
    #[error("cannot restore `{class}`: {source}")]
    Restore {
        /// Class left mutated.
        class: String,
        /// Host failure.
        source: HostError,
    },
    /// A test ignored cancellation; the host can no longer be trusted.
    #[error("test `{test}` did not stop after timing out on `{mutation}`")]
    Unresponsive {
        /// Mutation under test.
        mutation: Box<MutationIdentifier>,
        /// Test still running.
        test: TestId,
    },
    /// A test exhausted host memory; later mutations would run on a damaged heap.
    #[error("test `{test}` ran out of memory on `{mutation}`: {reason}")]
    OutOfMemory {
        /// Mutation under test.
        mutation: Box<MutationIdentifier>,
        /// Test that exhausted the heap.
        test: TestId,
        /// Host diagnostic.
        reason: String,
    },
}

enum Verdict {
    Status(MutationStatus),
    Abandoned(TestId),
    OutOfMemory(TestId, String),
}

/// Installs each mutant in turn, runs the tests and reports the outcome.
pub struct MutationTestWorker {
    host: Arc<dyn HostRuntime>,
    mutater: Mutater,
    tests: TimeoutDecoratedTestSource,
}

impl std::fmt::Debug for MutationTestWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationTestWorker")
            .field("mutater", &self.mutater)
            .field("tests", &self.tests.len())
            .finish_non_exhaustive()
    }
}

impl MutationTestWorker {
    /// Worker over a host runtime.
    pub fn new(
        host: Arc<dyn HostRuntime>,
        mutater: Mutater,
        tests: TimeoutDecoratedTestSource,
    ) -> Self {
        Self {
            host,
            mutater,
            tests,
        }
    }

    /// Test `mutations` strictly in order, reporting each status as soon as
    /// it is known. `interrupted` is checked before every mutation.
    pub fn run(
        &self,
        mutations: &[MutationIdentifier],
        reporter: &dyn Reporter,
        interrupted: &AtomicBool,
    ) -> Result<Vec<MutationResult>, WorkerError> {
        tracing::info!(
            mutations = mutations.len(),
            tests = self.tests.len(),
            "testing mutations"
        );
        let mut results = Vec::with_capacity(mutations.len());
        for id in mutations {
            if interrupted.load(Ordering::SeqCst) {
                return Err(WorkerError::Interrupted);
            }

            let (verdict, original) = self.process(id);
            let status = match &verdict {
                Verdict::Status(status) => *status,
                Verdict::Abandoned(_) => MutationStatus::TimedOut,
                Verdict::OutOfMemory(..) => MutationStatus::MemoryError,
            };
            let restored = original.map(|bytes| self.host.redefine(id.class(), &bytes));

            let result = MutationResult::new(id.clone(), status);
            tracing::info!(mutation = %id, %status, "mutation tested");
            reporter.report(&result)?;
            results.push(result);

            if let Some(Err(source)) = restored {
                return Err(WorkerError::Restore {
                    class: id.class().to_string(),
                    source,
                });
            }
            match verdict {
                Verdict::Status(_) => {}
                Verdict::Abandoned(test) => {
                    return Err(WorkerError::Unresponsive {
                        mutation: Box::new(id.clone()),
                        test,
                    });
                }
                Verdict::OutOfMemory(test, reason) => {
                    return Err(WorkerError::OutOfMemory {
                        mutation: Box::new(id.clone()),
                        test,
                        reason,
                    });
                }
            }
        }
        Ok(results)
    }

    /// Returns the verdict and, when the mutant was installed, the original
    /// bytes to restore.
    fn process(&self, id: &MutationIdentifier) -> (Verdict, Option<Vec<u8>>) {
        let original = match self.host.class_bytes(id.class()) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(mutation = %id, error = %err, "target class unavailable");
                return (Verdict::Status(MutationStatus::RunError), None);
            }
        };
        let mutant = match decode_class(&original)
            .map_err(EngineError::from)
            .and_then(|class| self.mutater.get_mutation(&class, id))
        {
            Ok(mutant) => mutant,
            Err(err) => {
                tracing::warn!(mutation = %id, error = %err, "cannot create mutant");
                return (Verdict::Status(MutationStatus::RunError), None);
            }
        };
        if let Err(err) = self.host.redefine(id.class(), &mutant.bytes) {
            tracing::warn!(mutation = %id, error = %err, "cannot install mutant");
            return (Verdict::Status(MutationStatus::RunError), None);
        }
        tracing::debug!(mutation = %id, line = ?mutant.details.line, "mutant installed");

        (self.run_tests(id), Some(original))
    }

    fn run_tests(&self, id: &MutationIdentifier) -> Verdict {
        for test in self.tests.tests() {
            let test_id = &test.case().id;
            match test.run(&self.host) {
                TestOutcome::Passed => {}
                TestOutcome::Failed(reason) => {
                    tracing::debug!(mutation = %id, test = %test_id, %reason, "killed");
                    return Verdict::Status(MutationStatus::Killed);
                }
                TestOutcome::TimedOut => return Verdict::Status(MutationStatus::TimedOut),
                TestOutcome::Errored(reason) => {
                    tracing::warn!(mutation = %id, test = %test_id, %reason, "test crashed");
                    return Verdict::Status(MutationStatus::RunError);
                }
                TestOutcome::Abandoned => return Verdict::Abandoned(test_id.clone()),
                TestOutcome::OutOfMemory(reason) => {
                    tracing::error!(mutation = %id, test = %test_id, %reason, "heap exhausted");
                    return Verdict::OutOfMemory(test_id.clone(), reason);
                }
            }
        }
        Verdict::Status(MutationStatus::Survived)
    }
}
