use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use bytemut::logging::init_logging;
use bytemut::worker::{ExitCode, WorkerConfig, run};

#[derive(Debug, Parser)]
#[command(name = "bytemut-worker")]
#[command(about = "Isolated mutant execution worker")]
struct Cli {
    /// Orchestrator port on the loopback interface.
    port: u16,
    /// Orchestrator address.
    #[arg(long)]
    host: Option<IpAddr>,
    /// Memory watchdog threshold, percent of each pool's capacity.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    memory_threshold_percent: Option<u8>,
    /// Memory watchdog poll interval in milliseconds.
    #[arg(long)]
    watchdog_interval_ms: Option<u64>,
    /// Interpreter heap capacity in bytes.
    #[arg(long)]
    heap_limit_bytes: Option<u64>,
    /// Interpreter call depth limit.
    #[arg(long)]
    max_call_depth: Option<usize>,
    /// Grace period for a cancelled test, in milliseconds.
    #[arg(long)]
    cancel_grace_ms: Option<u64>,
    /// Connection timeout in milliseconds.
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
    /// Also watch the process resident set against this many bytes.
    #[arg(long)]
    process_memory_limit_bytes: Option<u64>,
    /// Start with debug logging.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::default();
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(percent) = self.memory_threshold_percent {
            config = config.with_memory_threshold_percent(percent);
        }
        if let Some(ms) = self.watchdog_interval_ms {
            config = config.with_watchdog_interval(Duration::from_millis(ms));
        }
        if let Some(bytes) = self.heap_limit_bytes {
            config = config.with_heap_limit_bytes(bytes);
        }
        if let Some(depth) = self.max_call_depth {
            config = config.with_max_call_depth(depth);
        }
        if let Some(ms) = self.cancel_grace_ms {
            config = config.with_cancel_grace(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connect_timeout_ms {
            config = config.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(bytes) = self.process_memory_limit_bytes {
            config = config.with_process_memory_limit_bytes(bytes);
        }
        config
    }
}

fn start(cli: &Cli) -> Result<ExitCode> {
    init_logging(cli.verbose).context("cannot initialise logging")?;
    Ok(run(cli.port, &cli.config()))
}

fn main() {
    let cli = Cli::parse();
    let code = match start(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("bytemut-worker: {err:#}");
            ExitCode::UnknownError
        }
    };
    std::process::exit(code.code());
}
