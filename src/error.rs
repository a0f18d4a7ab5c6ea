//! Error types for tag parsing and rebuilding.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::utils::buffer::Occurrence;

/// Result type for tag operations.
pub type Result<T> = std::result::Result<T, TagError>;

/// Errors raised while walking, decoding or rebuilding a tag.
#[derive(Debug, Error)]
pub enum TagError {
    /// The data does not start with the expected magic bytes.
    #[error("Format mismatch: expected {expected:?}, found {found:02x?}")]
    FormatMismatch {
        /// Magic the container requires.
        expected: &'static str,
        /// Bytes actually found at the start of the data.
        found: Vec<u8>,
    },

    /// A FLAC block header carries a type code outside 0..=6.
    #[error("Unknown FLAC block type {code} at offset {offset}")]
    UnknownBlockType {
        /// Raw 7-bit type code.
        code: u8,
        /// Offset of the block header.
        offset: usize,
    },

    /// A picture type outside 0..=20.
    #[error("Unknown picture type {value} in {field}")]
    UnknownPictureType {
        /// Block or frame carrying the value.
        field: &'static str,
        /// Raw value read.
        value: u32,
    },

    /// A label lookup for a name that was never indexed.
    #[error("Label {name:?} ({occurrence}) does not exist")]
    LabelNotFound {
        /// Label name.
        name: String,
        /// Which occurrence was requested.
        occurrence: Occurrence,
    },

    /// Not enough bytes left for a fixed-width field.
    #[error("Malformed layout: {field} needs {needed} bytes at offset {offset}, {available} available")]
    MalformedLayout {
        /// Field being decoded.
        field: String,
        /// Cursor position when decoding started.
        offset: usize,
        /// Bytes required.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Absolute seek to a negative position.
    #[error("Negative seek position {position}")]
    NegativeSeek {
        /// Requested position.
        position: i64,
    },

    /// A vorbis comment entry without a `=` separator.
    #[error("Malformed vorbis comment entry {entry:?}")]
    MalformedComment {
        /// The raw entry.
        entry: String,
    },

    /// A string field that must be UTF-8 is not.
    #[error("Invalid UTF-8 in {field}")]
    InvalidText {
        /// Field being decoded.
        field: &'static str,
        #[source]
        source: FromUtf8Error,
    },

    /// A text-frame decode was requested for a non-text frame id.
    #[error("{id} is not a text information frame")]
    NotATextFrame {
        /// Frame id requested.
        id: String,
    },

    /// A tag was assembled from zero blocks or frames.
    #[error("Cannot assemble a tag without any blocks")]
    EmptyTag,

    /// A block or frame body longer than its size field can express.
    #[error("{block} is {length} bytes, at most {max} fit")]
    BlockTooLarge {
        /// Block type or frame id being built.
        block: String,
        /// Body length in bytes.
        length: usize,
        /// Largest encodable length.
        max: usize,
    },

    /// A byte range whose end does not lie after its start.
    #[error("Invalid byte range {start}..{end}")]
    InvalidRange {
        /// Range start.
        start: u64,
        /// Range end.
        end: u64,
    },

    /// I/O failure on a file collaborator.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TagError::Io {
            path: path.into(),
            source,
        }
    }
}
