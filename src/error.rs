use std::io;

use thiserror::Error;

// ========================================================================= //

/// The error type for rendering and parsing compound files.
#[derive(Debug, Error)]
pub enum Error {
    /// The document contains no streams or storages.
    #[error("document is empty")]
    Empty,

    /// A stream is larger than the 2 GiB - 1 limit of a V3 container.
    #[error("stream {name:?} is {len} bytes, which exceeds the V3 limit")]
    FileSizeLimitExceeded {
        /// Name of the offending stream.
        name: String,
        /// Length of the offending stream, in bytes.
        len: u64,
    },

    /// An object name does not fit in the 64-byte directory entry name field.
    #[error("object name {0:?} is longer than 31 UTF-16 code units")]
    FilenameTooLong(String),

    /// An object name is empty or contains a forbidden character.
    #[error("object name {0:?} is not a valid CFB name")]
    InvalidName(String),

    /// Two children of the same storage have CFB-equal names.
    #[error("storage already has a child named {0:?}")]
    DuplicateName(String),

    /// The file header is missing, truncated, or self-contradictory.
    #[error("malformed header ({0})")]
    MalformedHeader(String),

    /// A directory entry or the directory tree is invalid.
    #[error("malformed directory ({0})")]
    MalformedDirectory(String),

    /// A chain or the DIFAT references a sector past the end of the input.
    #[error("sector {sector} is out of range for a {len}-byte file")]
    SectorOutOfRange {
        /// The out-of-range sector id.
        sector: u32,
        /// Total length of the input, in bytes.
        len: usize,
    },

    /// The FAT contains a free slot or unknown sentinel inside a chain.
    #[error("malformed FAT ({0})")]
    CorruptFat(String),

    /// The MiniFAT contains a free slot or unknown sentinel inside a chain.
    #[error("malformed MiniFAT ({0})")]
    CorruptMiniFat(String),

    /// A sector chain is longer than the allocation table that describes it.
    #[error("sector chain starting at {0} does not terminate")]
    CyclicChain(u32),

    /// I/O failure in an underlying writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Alias for `std::result::Result` with this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

// ========================================================================= //
