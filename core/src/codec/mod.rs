//! Whole-machine state codec
//!
//! Machines write their complete state through a [`Serializer`] and read it
//! back through a [`Deserializer`]. The byte layout is little-endian with
//! length-prefixed strings and blobs. A captured state is wrapped in an
//! immutable [`Snapshot`].

mod serializer;
mod snapshot;

pub use serializer::{Deserializer, Serializer};
pub use snapshot::{Snapshot, checksum, load_committed};

/// Error reading or writing machine state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The stream ended before a value could be read
    #[error("unexpected end of state data at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// A string field did not contain valid UTF-8
    #[error("invalid UTF-8 in state string at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    /// A length prefix points past the end of the stream
    #[error("declared length {len} exceeds remaining {remaining} bytes")]
    LengthOverflow { len: u64, remaining: u64 },

    /// A stored history entry could not be decompressed
    #[error("compressed state entry is corrupt: {0}")]
    Decompress(String),

    /// Stored bytes no longer match the checksum taken at capture time
    #[error("state checksum mismatch (expected {expected:#018x}, found {found:#018x})")]
    ChecksumMismatch { expected: u64, found: u64 },

    /// The machine rejected a value while loading
    #[error("{0}")]
    Machine(String),
}
