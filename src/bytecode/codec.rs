//! Byte encoding for class units.
//!
//! Layout: `b"BMUT"`, big-endian `u16` format version, then the bincode payload.

use thiserror::Error;

use super::ClassUnit;

const MAGIC: &[u8; 4] = b"BMUT";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 6;

/// Class codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Input shorter than the header.
    #[error("class bytes truncated: {0} byte(s)")]
    Truncated(usize),
    /// Magic mismatch.
    #[error("not a class unit (bad magic)")]
    BadMagic,
    /// Unknown format version.
    #[error("unsupported class format version {0}")]
    UnsupportedVersion(u16),
    /// Payload could not be (de)serialized.
    #[error("class payload error: {0}")]
    Payload(#[from] bincode::Error),
}

/// Encode a class unit.
pub fn encode_class(class: &ClassUnit) -> Result<Vec<u8>, CodecError> {
    let payload = bincode::serialize(class)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a class unit.
pub fn decode_class(bytes: &[u8]) -> Result<ClassUnit, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated(bytes.len()));
    }
    if &bytes[..4] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
}
