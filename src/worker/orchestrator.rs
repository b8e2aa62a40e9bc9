//! Orchestrator side of the protocol: hand a worker its arguments and collect
//! one status per requested mutation, whatever happens to the worker.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;

use super::args::SlaveArguments;
use super::protocol::{Frame, ProtocolError, read_frame, write_frame};
use super::status::{ExitCode, MutationResult, MutationStatus};
use crate::engine::MutationIdentifier;

/// Statuses for a whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedResults {
    /// One result per requested mutation, in request order.
    pub results: Vec<MutationResult>,
    /// Exit code carried by the done signal, `None` when the stream ended without one.
    pub exit_code: Option<ExitCode>,
    /// How many results the worker actually sent.
    pub reported: usize,
}

impl CollectedResults {
    /// Whether the worker completed the batch normally.
    pub fn is_complete(&self) -> bool {
        self.exit_code == Some(ExitCode::Ok) && self.reported == self.results.len()
    }

    /// Mutations the tests detected.
    pub fn detected(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_detected()).count()
    }
}

/// Send the arguments frame.
pub fn send_arguments<W: Write + ?Sized>(
    writer: &mut W,
    args: &SlaveArguments,
) -> Result<(), ProtocolError> {
    write_frame(writer, &Frame::Arguments(args.clone()))
}

/// Read statuses until done or end of stream and fill in the unreported
/// remainder: `MEMORY_ERROR` when the worker ran out of memory, `RUN_ERROR`
/// otherwise.
pub fn collect_results<R: Read + ?Sized>(
    reader: &mut R,
    requested: &[MutationIdentifier],
) -> CollectedResults {
    let mut reported = HashMap::new();
    let mut exit_code = None;
    loop {
        match read_frame(reader) {
            Ok(Some(Frame::Status(result))) => {
                reported.entry(result.id).or_insert(result.status);
            }
            Ok(Some(Frame::Done(code))) => {
                exit_code = Some(code);
                break;
            }
            Ok(Some(other)) => {
                tracing::warn!(frame = other.kind(), "unexpected frame from worker");
                break;
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "worker stream ended abruptly");
                break;
            }
        }
    }

    let remainder = match exit_code {
        Some(ExitCode::OutOfMemory) => MutationStatus::MemoryError,
        _ => MutationStatus::RunError,
    };
    let results: Vec<MutationResult> = requested
        .iter()
        .map(|id| {
            let status = reported.get(id).copied().unwrap_or(remainder);
            MutationResult::new(id.clone(), status)
        })
        .collect();
    let count = requested.iter().filter(|id| reported.contains_key(*id)).count();
    if count < requested.len() {
        tracing::warn!(
            missing = requested.len() - count,
            %remainder,
            "worker did not report every mutation"
        );
    }
    CollectedResults {
        results,
        exit_code,
        reported: count,
    }
}

/// Accept one worker on `listener`, send it `args` and collect its results.
pub fn communicate(
    listener: &TcpListener,
    args: &SlaveArguments,
) -> Result<CollectedResults, ProtocolError> {
    let (mut stream, peer) = listener.accept()?;
    tracing::debug!(%peer, "worker connected");
    send_arguments(&mut stream, args)?;
    Ok(collect_results(&mut stream, &args.mutations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ids(n: usize) -> Vec<MutationIdentifier> {
        (0..n)
            .map(|i| {
                MutationIdentifier::new(
                    "demo/A",
                    "f",
                    &"()I".parse().expect("descriptor should parse"),
                    i,
                    "m",
                    "d",
                )
            })
            .collect()
    }

    fn stream(frames: &[Frame]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for frame in frames {
            write_frame(&mut buf, frame).expect("write should succeed");
        }
        Cursor::new(buf)
    }

    #[test]
    fn complete_batch_is_taken_as_is() {
        let ids = ids(2);
        let mut input = stream(&[
            Frame::Status(MutationResult::new(ids[0].clone(), MutationStatus::Killed)),
            Frame::Status(MutationResult::new(ids[1].clone(), MutationStatus::Survived)),
            Frame::Done(ExitCode::Ok),
        ]);
        let collected = collect_results(&mut input, &ids);
        assert!(collected.is_complete());
        assert_eq!(collected.results[1].status, MutationStatus::Survived);
        assert_eq!(collected.detected(), 1);
    }

    #[test]
    fn abrupt_close_fills_run_errors() {
        let ids = ids(3);
        let mut bytes = stream(&[Frame::Status(MutationResult::new(
            ids[0].clone(),
            MutationStatus::Killed,
        ))])
        .into_inner();
        // Half a frame, then the connection drops.
        bytes.extend_from_slice(&[2, 0, 0]);

        let collected = collect_results(&mut Cursor::new(bytes), &ids);
        let statuses: Vec<_> = collected.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                MutationStatus::Killed,
                MutationStatus::RunError,
                MutationStatus::RunError
            ]
        );
        assert_eq!(collected.exit_code, None);
        assert_eq!(collected.reported, 1);
        assert_eq!(collected.detected(), 1);
        assert!(!collected.is_complete());
    }

    #[test]
    fn out_of_memory_fills_memory_errors() {
        let ids = ids(2);
        let mut input = stream(&[
            Frame::Status(MutationResult::new(ids[0].clone(), MutationStatus::Survived)),
            Frame::Done(ExitCode::OutOfMemory),
        ]);
        let collected = collect_results(&mut input, &ids);
        assert_eq!(collected.results[0].status, MutationStatus::Survived);
        assert_eq!(collected.results[1].status, MutationStatus::MemoryError);
        assert_eq!(collected.exit_code, Some(ExitCode::OutOfMemory));
        assert_eq!(collected.detected(), 1);
    }
}
