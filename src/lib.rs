//! # rezip
//!
//! A Rust zip utility and library with legacy ZipCrypto support.
//!
//! This library parses and produces the binary layout of ZIP archives
//! (local headers, central directory, end record) entirely in memory,
//! and can protect entry payloads with the traditional PKWARE stream
//! cipher for interoperability with other ZIP tools.
//!
//! ## Features
//!
//! - Read and write standard ZIP archives
//! - STORED and DEFLATE compression methods
//! - ZipCrypto encryption with per-entry or archive-level passwords
//! - Deterministic re-serialization: offsets, sizes, checksums and
//!   counts are always recomputed on save
//!
//! ## Example
//!
//! ```no_run
//! use rezip::ZipArchive;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut archive = ZipArchive::new();
//!     archive.set_password(Some("secret"));
//!     archive.create_entry("hello.txt", Some(b"hello world"))?;
//!     let bytes = archive.serialize()?;
//!
//!     let mut reopened = ZipArchive::parse(&bytes)?;
//!     reopened.set_password(Some("secret"));
//!     assert_eq!(reopened.read_entry("hello.txt")?, b"hello world");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use zip::{ZipArchive, ZipEntry};
