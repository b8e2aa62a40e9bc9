//! Per-mutation results and process exit codes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::MutationIdentifier;

/// Outcome of testing one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationStatus {
    /// At least one test failed.
    Killed,
    /// Every test passed.
    Survived,
    /// A test exceeded its allowance.
    TimedOut,
    /// The mutant could not be produced or run.
    RunError,
    /// The worker ran out of memory before reporting.
    MemoryError,
}

impl MutationStatus {
    /// Whether the tests detected the mutation.
    pub fn is_detected(self) -> bool {
        matches!(self, Self::Killed | Self::TimedOut | Self::MemoryError)
    }
}

impl fmt::Display for MutationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Killed => "KILLED",
            Self::Survived => "SURVIVED",
            Self::TimedOut => "TIMED_OUT",
            Self::RunError => "RUN_ERROR",
            Self::MemoryError => "MEMORY_ERROR",
        })
    }
}

/// One status record on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResult {
    /// Mutation tested.
    pub id: MutationIdentifier,
    /// Outcome.
    pub status: MutationStatus,
}

impl MutationResult {
    /// Pair an id with its outcome.
    pub fn new(id: MutationIdentifier, status: MutationStatus) -> Self {
        Self { id, status }
    }
}

/// Worker process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitCode {
    /// Every requested mutation was reported.
    Ok,
    /// The memory watchdog fired.
    OutOfMemory,
    /// Anything else went wrong.
    UnknownError,
}

impl ExitCode {
    /// Numeric process exit code.
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::OutOfMemory => 11,
            Self::UnknownError => 13,
        }
    }

    /// Inverse of [`ExitCode::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            11 => Some(Self::OutOfMemory),
            13 => Some(Self::UnknownError),
            _ => None,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_fixed_and_distinct() {
        for code in [ExitCode::Ok, ExitCode::OutOfMemory, ExitCode::UnknownError] {
            assert_eq!(ExitCode::from_code(code.code()), Some(code));
        }
        assert_eq!(ExitCode::OutOfMemory.code(), 11);
        assert_eq!(ExitCode::UnknownError.code(), 13);
        assert_eq!(ExitCode::from_code(1), None);
    }

    #[test]
    fn statuses_print_in_report_form() {
        assert_eq!(MutationStatus::TimedOut.to_string(), "TIMED_OUT");
        assert!(MutationStatus::MemoryError.is_detected());
        assert!(!MutationStatus::Survived.is_detected());
        assert!(!MutationStatus::RunError.is_detected());
    }
}
