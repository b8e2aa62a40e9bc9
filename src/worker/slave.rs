//! Worker process main flow.
//!
//! Connect to the orchestrator, read the arguments, arm the memory watchdog,
//! load the classpath, test every mutation and finally send the completion
//! signal. Completion runs on every path, including the watchdog's.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use super::config::WorkerConfig;
use super::host::MockSupportShim;
use super::protocol::{ProtocolError, read_arguments};
use super::reporter::{Completion, Reporter, SocketReporter};
use super::runner::{MutationTestWorker, WorkerError};
use super::status::ExitCode;
use super::test_source::TimeoutDecoratedTestSource;
use super::watchdog::{MemoryWatchdog, ProcessMemoryPool, WatchdogHandle};
use crate::bytecode::{Vm, VmError};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Worker process failures. Heap exhaustion ends with [`ExitCode::OutOfMemory`],
/// everything else with [`ExitCode::UnknownError`].
#[derive(Debug, Error)]
pub enum SlaveError {
    /// The orchestrator could not be reached.
    #[error("cannot connect to orchestrator at {addr}: {source}")]
    Connect {
        /// Orchestrator address.
        addr: SocketAddr,
        /// Socket failure.
        source: io::Error,
    },
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Arguments could not be read.
    #[error("cannot read arguments: {0}")]
    Protocol(#[from] ProtocolError),
    /// A classpath entry could not be loaded.
    #[error("cannot load classpath: {0}")]
    Load(#[from] VmError),
    /// The batch was aborted.
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// Signal handler error.
    #[error("signal handler installation failed: {0}")]
    Signal(String),
}

impl SlaveError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Worker(WorkerError::OutOfMemory { .. }) => ExitCode::OutOfMemory,
            _ => ExitCode::UnknownError,
        }
    }
}

fn install_signal_handler_once() -> Result<(), SlaveError> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();

    let result = INIT.get_or_init(|| {
        ctrlc::set_handler(|| {
            INTERRUPTED.store(true, Ordering::SeqCst);
        })
        .map_err(|e| e.to_string())
    });

    match result {
        Ok(()) => Ok(()),
        Err(msg) => Err(SlaveError::Signal(msg.clone())),
    }
}

/// Run the worker against the orchestrator listening on `port`.
pub fn run(port: u16, config: &WorkerConfig) -> ExitCode {
    if let Err(err) = install_signal_handler_once() {
        tracing::warn!(error = %err, "continuing without interrupt handling");
    }

    let vm = Arc::new(Vm::new(config.vm_options()));
    vm.add_transformer(Box::new(MockSupportShim::default()));

    let (reader, reporter) = match connect(port, config) {
        Ok(connected) => connected,
        Err(err) => {
            tracing::error!(error = %err, "worker failed");
            return ExitCode::UnknownError;
        }
    };
    let completion = Arc::new(Completion::new(reporter.clone()));

    let code = match session(&vm, reader, reporter.as_ref(), &completion, config) {
        Ok(()) => ExitCode::Ok,
        Err(err) => {
            tracing::error!(error = %err, "worker failed");
            err.exit_code()
        }
    };
    completion.finish(code);
    tracing::debug!(%code, "worker done");
    code
}

fn connect(port: u16, config: &WorkerConfig) -> Result<(TcpStream, Arc<dyn Reporter>), SlaveError> {
    let addr = SocketAddr::new(config.host, port);
    tracing::debug!(%addr, "connecting to orchestrator");
    let stream = TcpStream::connect_timeout(&addr, config.connect_timeout)
        .map_err(|source| SlaveError::Connect { addr, source })?;
    stream.set_nodelay(true)?;
    let reader = stream.try_clone()?;
    Ok((reader, Arc::new(SocketReporter::new(stream))))
}

fn session(
    vm: &Arc<Vm>,
    mut reader: TcpStream,
    reporter: &dyn Reporter,
    completion: &Arc<Completion>,
    config: &WorkerConfig,
) -> Result<(), SlaveError> {
    let args = read_arguments(&mut reader)?;
    let _watchdog = start_watchdog(vm, completion, config)?;
    if let Err(err) = crate::logging::set_verbose(args.verbose) {
        tracing::debug!(error = %err, "verbosity unchanged");
    }
    tracing::debug!(
        mutations = args.mutations.len(),
        tests = args.tests.len(),
        classes = args.classpath.len(),
        "arguments received"
    );

    for bytes in &args.classpath {
        let class = vm.load(bytes)?;
        tracing::debug!(%class, "class loaded");
    }

    let worker = MutationTestWorker::new(
        vm.clone(),
        args.config.create_mutater(),
        TimeoutDecoratedTestSource::new(args.timeout_strategy, config.cancel_grace, args.tests),
    );
    worker.run(&args.mutations, reporter, &INTERRUPTED)?;
    Ok(())
}

fn start_watchdog(
    vm: &Vm,
    completion: &Arc<Completion>,
    config: &WorkerConfig,
) -> Result<WatchdogHandle, SlaveError> {
    let mut watchdog =
        MemoryWatchdog::new(config.memory_threshold_percent, config.watchdog_interval)
            .watch(vm.heap().clone());
    if let Some(limit) = config.process_memory_limit_bytes {
        watchdog = watchdog.watch(Arc::new(ProcessMemoryPool::new(limit)));
    }

    let completion = Arc::clone(completion);
    let handle = watchdog.start(move |notification| {
        tracing::error!(
            pool = %notification.pool_name,
            count = notification.count,
            used = notification.used,
            max = notification.max,
            "memory threshold exceeded, terminating"
        );
        completion.finish(ExitCode::OutOfMemory);
        std::process::exit(ExitCode::OutOfMemory.code());
    })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_orchestrator_is_an_unknown_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
        let port = listener.local_addr().expect("listener has an address").port();
        drop(listener);

        let config =
            WorkerConfig::default().with_connect_timeout(std::time::Duration::from_millis(200));
        assert_eq!(run(port, &config), ExitCode::UnknownError);
    }

    #[test]
    fn heap_exhaustion_maps_to_the_out_of_memory_code() {
        let id = crate::engine::MutationIdentifier::new(
            "demo/A",
            "f",
            &"(I)I".parse().expect("descriptor should parse"),
            0,
            "m",
            "d",
        );
        let oom = SlaveError::Worker(WorkerError::OutOfMemory {
            mutation: Box::new(id),
            test: crate::worker::args::TestId("t".into()),
            reason: "heap".into(),
        });
        assert_eq!(oom.exit_code(), ExitCode::OutOfMemory);
        assert_eq!(
            SlaveError::Worker(WorkerError::Interrupted).exit_code(),
            ExitCode::UnknownError
        );
    }
}
