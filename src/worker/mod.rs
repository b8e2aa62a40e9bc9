//! Isolated mutant execution worker.
//!
//! The worker process connects to an orchestrator, receives
//! [`SlaveArguments`], installs each requested mutant into the running host
//! by redefinition, runs the tests under a time allowance and streams one
//! [`MutationResult`] per mutation before signalling completion.

pub mod args;
pub mod config;
pub mod host;
pub mod orchestrator;
pub mod protocol;
pub mod reporter;
pub mod runner;
pub mod slave;
pub mod status;
pub mod test_source;
pub mod watchdog;

pub use args::{Expectation, SlaveArguments, TestCase, TestId, TimeoutStrategy};
pub use config::WorkerConfig;
pub use host::{HostError, HostRuntime, MockSupportShim};
pub use orchestrator::{CollectedResults, collect_results, communicate, send_arguments};
pub use protocol::{Frame, MAX_FRAME_BYTES, ProtocolError, read_frame, write_frame};
pub use reporter::{Completion, Reporter, ReporterError, SocketReporter, StreamReporter};
pub use runner::{MutationTestWorker, WorkerError};
pub use slave::{SlaveError, run};
pub use status::{ExitCode, MutationResult, MutationStatus};
pub use test_source::{TestOutcome, TimeoutDecoratedTest, TimeoutDecoratedTestSource};
pub use watchdog::{MemoryNotification, MemoryPool, MemoryWatchdog, ProcessMemoryPool, WatchdogHandle};
