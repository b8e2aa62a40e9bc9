//! Tracing subscriber setup for the worker process.
//!
//! Output goes to stderr so that stdout stays free for the host. The filter
//! comes from `BYTEMUT_LOG` when set; otherwise it is `info`, switched to
//! `debug` at runtime by [`set_verbose`].

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "BYTEMUT_LOG";

static FILTER: OnceLock<FilterControl> = OnceLock::new();

struct FilterControl {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// `BYTEMUT_LOG` is not a valid filter.
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),
    /// A global subscriber is already installed.
    #[error("cannot install subscriber: {0}")]
    Init(#[from] TryInitError),
    /// The filter could not be swapped.
    #[error("cannot change log filter: {0}")]
    Reload(#[from] reload::Error),
    /// [`init_logging`] has not run.
    #[error("logging is not initialised")]
    NotInitialized,
}

fn level(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global subscriber.
pub fn init_logging(verbose: bool) -> Result<(), LoggingError> {
    let from_env = std::env::var(LOG_ENV)
        .ok()
        .filter(|directives| !directives.trim().is_empty());
    let filter = match &from_env {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::new(level(verbose)),
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    let _ = FILTER.set(FilterControl {
        handle,
        from_env: from_env.is_some(),
    });
    Ok(())
}

/// Switch between `info` and `debug`. A filter taken from `BYTEMUT_LOG` is left alone.
pub fn set_verbose(verbose: bool) -> Result<(), LoggingError> {
    let control = FILTER.get().ok_or(LoggingError::NotInitialized)?;
    if control.from_env {
        return Ok(());
    }
    control
        .handle
        .modify(|filter| *filter = EnvFilter::new(level(verbose)))?;
    Ok(())
}
