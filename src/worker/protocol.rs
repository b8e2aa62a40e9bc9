//! Length-framed wire protocol between orchestrator and worker.
//!
//! Every frame is `[tag: u8][len: u32 BE][payload]` with a bincode payload.

use std::io::{self, Read, Write};

use thiserror::Error;

use super::args::SlaveArguments;
use super::status::{ExitCode, MutationResult};

/// Largest accepted payload.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

const TAG_ARGUMENTS: u8 = 1;
const TAG_STATUS: u8 = 2;
const TAG_DONE: u8 = 3;

/// Wire protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Socket failure, including a close in the middle of a frame.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Payload did not decode.
    #[error("malformed payload: {0}")]
    Payload(#[from] bincode::Error),
    /// Unknown frame tag.
    #[error("unknown frame tag {0}")]
    UnknownTag(u8),
    /// Frame length above [`MAX_FRAME_BYTES`].
    #[error("frame of {0} bytes exceeds the limit")]
    TooLarge(u64),
    /// Done frame carrying an exit code this protocol does not define.
    #[error("unknown exit code {0}")]
    UnknownExitCode(i32),
    /// A frame arrived where another was required.
    #[error("expected {expected}, got {found}")]
    Unexpected {
        /// Required frame.
        expected: &'static str,
        /// Frame received.
        found: &'static str,
    },
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Orchestrator to worker, exactly once.
    Arguments(SlaveArguments),
    /// Worker to orchestrator, once per processed mutation.
    Status(MutationResult),
    /// Terminal completion signal with the worker's exit code.
    Done(ExitCode),
}

impl Frame {
    /// Frame kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Arguments(_) => "arguments",
            Self::Status(_) => "status",
            Self::Done(_) => "done",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Arguments(_) => TAG_ARGUMENTS,
            Self::Status(_) => TAG_STATUS,
            Self::Done(_) => TAG_DONE,
        }
    }
}

/// Write one frame and flush.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError> {
    let payload = match frame {
        Frame::Arguments(args) => bincode::serialize(args)?,
        Frame::Status(result) => bincode::serialize(result)?,
        Frame::Done(code) => bincode::serialize(&code.code())?,
    };
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_BYTES)
        .ok_or(ProtocolError::TooLarge(payload.len() as u64))?;

    let mut header = [0u8; 5];
    header[0] = frame.tag();
    header[1..].copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame. Returns `None` on a clean end of stream between frames.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Option<Frame>, ProtocolError> {
    let mut tag = [0u8; 1];
    match reader.read_exact(&mut tag) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let len = u32::from_be_bytes(len);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::TooLarge(u64::from(len)));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;

    let frame = match tag[0] {
        TAG_ARGUMENTS => Frame::Arguments(bincode::deserialize(&payload)?),
        TAG_STATUS => Frame::Status(bincode::deserialize(&payload)?),
        TAG_DONE => {
            let code: i32 = bincode::deserialize(&payload)?;
            Frame::Done(ExitCode::from_code(code).ok_or(ProtocolError::UnknownExitCode(code))?)
        }
        other => return Err(ProtocolError::UnknownTag(other)),
    };
    Ok(Some(frame))
}

/// Read the single arguments frame a worker expects first.
pub fn read_arguments<R: Read + ?Sized>(reader: &mut R) -> Result<SlaveArguments, ProtocolError> {
    match read_frame(reader)? {
        Some(Frame::Arguments(args)) => Ok(args),
        Some(other) => Err(ProtocolError::Unexpected {
            expected: "arguments",
            found: other.kind(),
        }),
        None => Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before arguments were sent",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, MutationIdentifier};
    use crate::worker::args::TimeoutStrategy;
    use crate::worker::status::MutationStatus;
    use std::io::Cursor;

    fn id() -> MutationIdentifier {
        MutationIdentifier::new(
            "demo/A",
            "f",
            &"(I)I".parse().expect("descriptor should parse"),
            0,
            "m",
            "d",
        )
    }

    #[test]
    fn frames_are_tagged_and_length_prefixed() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Frame::Done(ExitCode::OutOfMemory)).expect("write should succeed");
        assert_eq!(buf[0], TAG_DONE);
        assert_eq!(&buf[1..5], &4u32.to_be_bytes());
        assert_eq!(buf.len(), 9);

        let frame = read_frame(&mut Cursor::new(buf)).expect("read should succeed");
        assert_eq!(frame, Some(Frame::Done(ExitCode::OutOfMemory)));
    }

    #[test]
    fn stream_of_frames_ends_cleanly() {
        let args = SlaveArguments {
            verbose: true,
            timeout_strategy: TimeoutStrategy::Fixed { millis: 10 },
            mutations: vec![id()],
            tests: Vec::new(),
            config: EngineConfig::default(),
            classpath: vec![vec![1, 2, 3]],
        };
        let frames = [
            Frame::Arguments(args.clone()),
            Frame::Status(MutationResult::new(id(), MutationStatus::Killed)),
            Frame::Done(ExitCode::Ok),
        ];
        let mut buf = Vec::new();
        for frame in &frames {
            write_frame(&mut buf, frame).expect("write should succeed");
        }

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_arguments(&mut cursor).expect("arguments should decode"), args);
        assert_eq!(read_frame(&mut cursor).expect("status should decode"), Some(frames[1].clone()));
        assert_eq!(read_frame(&mut cursor).expect("done should decode"), Some(frames[2].clone()));
        assert_eq!(read_frame(&mut cursor).expect("eof should be clean"), None);
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let oversized = [TAG_STATUS, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            read_frame(&mut Cursor::new(oversized)),
            Err(ProtocolError::TooLarge(_))
        ));

        assert!(matches!(
            read_frame(&mut Cursor::new([9u8, 0, 0, 0, 0])),
            Err(ProtocolError::UnknownTag(9))
        ));

        let truncated = [TAG_STATUS, 0, 0, 0, 8, 1, 2];
        assert!(matches!(
            read_frame(&mut Cursor::new(truncated)),
            Err(ProtocolError::Io(_))
        ));

        let mut done = Vec::new();
        write_frame(&mut done, &Frame::Done(ExitCode::Ok)).expect("write should succeed");
        assert!(matches!(
            read_arguments(&mut Cursor::new(done)),
            Err(ProtocolError::Unexpected { found: "done", .. })
        ));
    }
}
