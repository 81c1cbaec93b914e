//! A single archive entry: one local header, one central directory
//! record, and the content behind them.
//!
//! Content starts out in whatever form it has on disk (possibly deflated,
//! possibly encrypted) and is resolved to plaintext at most once, after
//! which the plaintext is cached. A freshly created entry starts resolved
//! with empty content. There is no path back from resolved to raw.

use std::io::{Cursor, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::{Result, ZipError};
use crate::zip::crypto;
use crate::zip::structures::{
    CentralDirectoryRecord, CompressionMethod, DosDateTime, FLAG_ENCRYPTED, LocalFileHeader,
};

/// Raw (headerless) DEFLATE compression of a whole buffer.
pub(crate) fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Raw (headerless) DEFLATE decompression of a whole buffer.
pub(crate) fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ZipError::Decompress(e.to_string()))?;
    Ok(out)
}

/// Entry content, either as captured from the archive buffer or as
/// resolved plaintext.
#[derive(Debug, Clone)]
enum EntryData {
    /// On-disk payload: compressed and, when the flag says so, encrypted
    /// (cipher header included).
    Raw(Vec<u8>),
    /// Decrypted and decompressed plaintext.
    Plain(Vec<u8>),
}

/// One file inside a [`ZipArchive`](crate::zip::ZipArchive).
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub(crate) header: LocalFileHeader,
    pub(crate) central: CentralDirectoryRecord,
    data: EntryData,
    password: Option<Vec<u8>>,
}

impl ZipEntry {
    /// Default "version needed to extract": 2.0, deflate-capable.
    const VERSION_NEEDED: u16 = 20;

    /// Build a fresh entry with default records and empty content.
    ///
    /// `encrypted` marks the entry for encryption on serialization, used
    /// when the owning archive has a password set.
    pub(crate) fn new(name: &str, encrypted: bool) -> Self {
        let flags = if encrypted { FLAG_ENCRYPTED } else { 0 };
        let now = DosDateTime::now();
        let header = LocalFileHeader {
            version_needed: Self::VERSION_NEEDED,
            flags,
            method: CompressionMethod::Deflate.as_u16(),
            modified: now,
            name: name.as_bytes().to_vec(),
            ..Default::default()
        };
        let central = CentralDirectoryRecord {
            version_made_by: Self::VERSION_NEEDED,
            version_needed: Self::VERSION_NEEDED,
            flags,
            method: CompressionMethod::Deflate.as_u16(),
            modified: now,
            name: name.as_bytes().to_vec(),
            ..Default::default()
        };
        Self {
            header,
            central,
            data: EntryData::Plain(Vec::new()),
            password: None,
        }
    }

    /// Parse the entry behind a central directory record: seek to its
    /// declared header offset, parse the local header, and capture the
    /// raw payload that follows it.
    ///
    /// The stored compressed size covers the whole on-disk payload,
    /// including the 12-byte cipher header of encrypted entries.
    pub(crate) fn parse(buf: &[u8], central: CentralDirectoryRecord) -> Result<Self> {
        let mut cursor = Cursor::new(buf);
        cursor.set_position(u64::from(central.header_offset));
        let header = LocalFileHeader::parse(&mut cursor)?;

        let mut payload = vec![0u8; central.compressed_size as usize];
        cursor.read_exact(&mut payload)?;

        Ok(Self {
            header,
            central,
            data: EntryData::Raw(payload),
            password: None,
        })
    }

    /// Resolve content to plaintext, caching the result.
    ///
    /// Decrypts first when the encrypted flag is set (entry password,
    /// else the archive-level `fallback`), then decompresses per the
    /// compression method. Decryption with a wrong password is not
    /// detected here; it surfaces as a decompression failure.
    pub(crate) fn resolve(&mut self, fallback: Option<&[u8]>) -> Result<()> {
        let raw = match &self.data {
            EntryData::Plain(_) => return Ok(()),
            EntryData::Raw(raw) => raw,
        };

        let compressed = if self.header.is_encrypted() {
            let password = self
                .password
                .as_deref()
                .or(fallback)
                .ok_or(ZipError::MissingPassword)?;
            crypto::decrypt(password, raw)
        } else {
            raw.clone()
        };

        let plain = match CompressionMethod::from_u16(self.header.method) {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => inflate(&compressed)?,
            CompressionMethod::Unknown(m) => return Err(ZipError::UnknownCompressionMethod(m)),
        };
        self.data = EntryData::Plain(plain);
        Ok(())
    }

    /// Plaintext content, resolving it on first access.
    pub(crate) fn read_with(&mut self, fallback: Option<&[u8]>) -> Result<&[u8]> {
        self.resolve(fallback)?;
        match &self.data {
            EntryData::Plain(plain) => Ok(plain),
            EntryData::Raw(_) => unreachable!("resolve always leaves plaintext"),
        }
    }

    /// Replace the entry's content with new plaintext.
    ///
    /// Updates the uncompressed and compressed sizes on both records,
    /// stamps both timestamps with the current time, and sets or clears
    /// the encrypted flag depending on whether a password is resolvable.
    /// The CRC field is left alone; it is recomputed, along with every
    /// offset, when the owning archive serializes.
    pub(crate) fn write_with(&mut self, data: Vec<u8>, fallback: Option<&[u8]>) -> Result<()> {
        let encrypted = self.password.as_deref().or(fallback).is_some();
        let compressed_len = match CompressionMethod::from_u16(self.header.method) {
            CompressionMethod::Stored => data.len(),
            CompressionMethod::Deflate => deflate(&data)?.len(),
            CompressionMethod::Unknown(m) => return Err(ZipError::UnknownCompressionMethod(m)),
        };
        let payload_len = if encrypted {
            compressed_len + crypto::CIPHER_HEADER_SIZE
        } else {
            compressed_len
        };

        let flags = if encrypted {
            self.header.flags | FLAG_ENCRYPTED
        } else {
            self.header.flags & !FLAG_ENCRYPTED
        };
        let now = DosDateTime::now();

        self.header.flags = flags;
        self.header.modified = now;
        self.header.compressed_size = payload_len as u32;
        self.header.uncompressed_size = data.len() as u32;
        self.central.flags = flags;
        self.central.modified = now;
        self.central.compressed_size = payload_len as u32;
        self.central.uncompressed_size = data.len() as u32;

        self.data = EntryData::Plain(data);
        Ok(())
    }

    /// Base name of the entry (the stored path after its last `/`).
    pub fn name(&self) -> String {
        let path = self.path();
        match path.rsplit_once('/') {
            Some((_, base)) => base.to_string(),
            None => path,
        }
    }

    /// Full path as stored in the archive.
    pub fn path(&self) -> String {
        String::from_utf8_lossy(&self.central.name).to_string()
    }

    pub fn compressed_size(&self) -> u32 {
        self.central.compressed_size
    }

    pub fn uncompressed_size(&self) -> u32 {
        self.central.uncompressed_size
    }

    /// CRC-32 of the plaintext content. Only current after the owning
    /// archive has been serialized.
    pub fn crc32(&self) -> u32 {
        self.central.crc32
    }

    pub fn modified(&self) -> DosDateTime {
        self.central.modified
    }

    /// Set the last-write time on both records.
    pub fn set_modified(&mut self, modified: DosDateTime) {
        self.header.modified = modified;
        self.central.modified = modified;
    }

    pub fn external_attrs(&self) -> u32 {
        self.central.external_attrs
    }

    pub fn set_external_attrs(&mut self, attrs: u32) {
        self.central.external_attrs = attrs;
    }

    pub fn is_encrypted(&self) -> bool {
        self.header.is_encrypted()
    }

    pub(crate) fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }

    /// Set or clear the per-entry password.
    ///
    /// A non-empty password marks the entry for encryption on future
    /// writes; `None` or an empty password clears the mark.
    pub fn set_password(&mut self, password: Option<&str>) {
        match password {
            Some(pw) if !pw.is_empty() => {
                self.password = Some(pw.as_bytes().to_vec());
                self.header.flags |= FLAG_ENCRYPTED;
                self.central.flags |= FLAG_ENCRYPTED;
            }
            _ => {
                self.password = None;
                self.header.flags &= !FLAG_ENCRYPTED;
                self.central.flags &= !FLAG_ENCRYPTED;
            }
        }
    }
}
