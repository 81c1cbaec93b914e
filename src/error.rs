//! Typed errors for the ZIP codec.
//!
//! Every failure mode of the core codec is fail-fast and non-retriable:
//! a bad signature means a wrong offset or corrupt input, a missing end
//! record means the buffer is not a ZIP archive at all.
//!
//! Note that decrypting with a wrong password is deliberately *not* an
//! error here. The legacy cipher carries no verification step, so a bad
//! key produces garbage that typically surfaces downstream as
//! [`ZipError::UnknownCompressionMethod`] or [`ZipError::Decompress`].

use thiserror::Error;

/// Errors produced by parsing, reading and serializing ZIP archives.
#[derive(Debug, Error)]
pub enum ZipError {
    /// A record's leading 4-byte signature did not match its expected
    /// constant at the position it was parsed from.
    #[error("malformed signature: expected {expected:#010x}, found {found:#010x}")]
    MalformedSignature {
        /// The signature constant the record type requires.
        expected: u32,
        /// The 32-bit little-endian word actually read.
        found: u32,
    },

    /// The end-of-central-directory signature was not found by the
    /// backward scan.
    #[error("end of central directory not found")]
    DirectoryNotFound,

    /// The compression method field holds a value outside the supported
    /// set (0 = store, 8 = deflate).
    #[error("unknown compression method: {0}")]
    UnknownCompressionMethod(u16),

    /// An entry is marked encrypted but neither the entry nor its archive
    /// has a password set.
    #[error("entry is encrypted but no password is available")]
    MissingPassword,

    /// Lookup or removal by name found no matching entry.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// Underlying I/O failure: a truncated buffer ending mid-record, or
    /// a filesystem error from the file wrappers.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// DEFLATE decompression failed, usually corrupt data or the symptom
    /// of a wrong decryption password.
    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, ZipError>;
