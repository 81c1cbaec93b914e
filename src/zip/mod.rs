//! ZIP archive reading, writing and ZipCrypto encryption.
//!
//! ## Architecture
//!
//! The module is organized bottom-up:
//!
//! - [`crypto`]: the legacy PKWARE stream cipher as a pure state machine
//! - [`structures`]: binary record codecs (local header, central
//!   directory record, end record) and the DOS timestamp format
//! - [`entry`]: one entry's record pair plus its content transforms
//! - [`archive`]: the entry collection, load/save orchestration, and
//!   file-system wrappers
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Loading starts from the EOCD (found by a backward signature scan),
//! walks the Central Directory, then visits each entry's local header at
//! its declared offset. Saving rebuilds the whole layout and never
//! trusts a stored offset, size or count.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - STORED (no compression) method
//! - DEFLATE compression method
//! - Traditional PKWARE (ZipCrypto) encryption, per-entry or
//!   archive-level passwords
//!
//! ## Limitations
//!
//! - No ZIP64 extensions (archives stay under 4GB / 65535 entries)
//! - No AES or other modern encryption modes
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod archive;
pub mod crypto;
pub mod entry;
pub mod structures;

pub use archive::ZipArchive;
pub use entry::ZipEntry;
pub use structures::{
    CentralDirectoryRecord, CompressionMethod, DosDateTime, EndOfCentralDirectory,
    LocalFileHeader,
};
