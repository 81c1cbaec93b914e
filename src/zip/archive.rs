//! Whole-archive orchestration: loading, entry management, and the
//! serialization pass that rebuilds every offset, size and count from
//! scratch.
//!
//! ## Load path
//!
//! ZIP files are read from the end: the end-of-central-directory record
//! is located by a backward signature scan, the central directory is
//! parsed record by record from the offset it declares, and each entry
//! then parses its own local header at the offset its central record
//! declares. Unencrypted content is resolved to plaintext eagerly;
//! encrypted content stays raw until it is read with a password.
//!
//! ## Save path
//!
//! Serialization never trusts a stored offset, size or count. Every
//! entry's plaintext is re-checksummed, re-compressed and re-encrypted,
//! its header offset is recorded as it is written, and the directory and
//! end records are rebuilt from the freshly written layout.

use std::io::Cursor;
use std::path::Path;

use crate::error::{Result, ZipError};
use crate::zip::crypto;
use crate::zip::entry::{ZipEntry, deflate};
use crate::zip::structures::{CentralDirectoryRecord, CompressionMethod, EndOfCentralDirectory};

/// An in-memory ZIP archive: an ordered entry collection plus the end
/// record. Entry order is central-directory order, which for freshly
/// built archives is insertion order.
#[derive(Debug, Clone, Default)]
pub struct ZipArchive {
    entries: Vec<ZipEntry>,
    end: EndOfCentralDirectory,
    password: Option<Vec<u8>>,
}

impl ZipArchive {
    /// An empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an archive from a complete in-memory buffer.
    ///
    /// Fails with [`ZipError::DirectoryNotFound`] when no end record
    /// signature exists, or [`ZipError::MalformedSignature`] when any
    /// record is not where its referencing record claims. The entry
    /// collection is built completely before the archive is returned;
    /// a failure never yields a partially initialized archive.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let eocd_pos = EndOfCentralDirectory::find(buf)?;
        let mut cursor = Cursor::new(buf);
        cursor.set_position(eocd_pos as u64);
        let end = EndOfCentralDirectory::parse(&mut cursor)?;

        let mut entries = Vec::with_capacity(end.disk_entries as usize);
        cursor.set_position(u64::from(end.cd_offset));
        for _ in 0..end.disk_entries {
            let central = CentralDirectoryRecord::parse(&mut cursor)?;
            entries.push(ZipEntry::parse(buf, central)?);
        }

        let mut archive = Self {
            entries,
            end,
            password: None,
        };
        for entry in &mut archive.entries {
            if !entry.is_encrypted() {
                entry.resolve(None)?;
            }
        }
        Ok(archive)
    }

    /// Read and parse an archive file.
    pub fn open(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read(path)?)
    }

    /// Set or clear the archive-level password, the default key for any
    /// entry without its own.
    pub fn set_password(&mut self, password: Option<&str>) {
        self.password = match password {
            Some(pw) if !pw.is_empty() => Some(pw.as_bytes().to_vec()),
            _ => None,
        };
    }

    /// Append a fresh entry, optionally with initial content.
    ///
    /// The entry inherits the archive's encryption state: if an archive
    /// password is set, the new entry is marked encrypted. Insertion
    /// order determines central-directory order.
    pub fn create_entry(&mut self, name: &str, data: Option<&[u8]>) -> Result<&mut ZipEntry> {
        let mut entry = ZipEntry::new(name, self.password.is_some());
        if let Some(data) = data {
            entry.write_with(data.to_vec(), self.password.as_deref())?;
        }
        self.entries.push(entry);
        Ok(self.entries.last_mut().expect("entry was just pushed"))
    }

    /// Look up an entry by base name or full stored path; first match in
    /// insertion order wins.
    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.entries
            .iter()
            .find(|e| e.name() == name || e.path() == name)
    }

    /// Mutable variant of [`entry`](Self::entry).
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut ZipEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.name() == name || e.path() == name)
    }

    /// Remove an entry by name. All-or-nothing: the collection is only
    /// touched when a match exists.
    pub fn remove(&mut self, name: &str) -> Result<ZipEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.name() == name || e.path() == name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;
        Ok(self.entries.remove(pos))
    }

    /// Plaintext content of the named entry, decrypting with the
    /// effective password (entry-level, else archive-level) and
    /// decompressing as needed.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let fallback = self.password.clone();
        let entry = self
            .entry_mut(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;
        Ok(entry.read_with(fallback.as_deref())?.to_vec())
    }

    /// Replace the named entry's content.
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let fallback = self.password.clone();
        let entry = self
            .entry_mut(name)
            .ok_or_else(|| ZipError::EntryNotFound(name.to_string()))?;
        entry.write_with(data.to_vec(), fallback.as_deref())
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the archive to a fresh buffer, recomputing every
    /// derived field.
    ///
    /// Per entry, in order: resolve plaintext, recompute its CRC-32,
    /// compress per the entry's method, encrypt under the effective
    /// password when the encrypted flag is set, record the current write
    /// position as the entry's header offset, and write local header
    /// plus payload. The central directory follows contiguously, then
    /// the end record with the rebuilt counts, size and offset.
    pub fn serialize(&mut self) -> Result<Vec<u8>> {
        let fallback = self.password.clone();
        let mut out = Vec::new();

        for entry in &mut self.entries {
            let plain = entry.read_with(fallback.as_deref())?.to_vec();
            let crc = crc32fast::hash(&plain);

            let compressed = match CompressionMethod::from_u16(entry.header.method) {
                CompressionMethod::Stored => plain.clone(),
                CompressionMethod::Deflate => deflate(&plain)?,
                CompressionMethod::Unknown(m) => {
                    return Err(ZipError::UnknownCompressionMethod(m));
                }
            };
            let payload = if entry.header.is_encrypted() {
                let password = entry
                    .password()
                    .or(fallback.as_deref())
                    .ok_or(ZipError::MissingPassword)?
                    .to_vec();
                crypto::encrypt(&password, crc, &compressed)
            } else {
                compressed
            };

            entry.header.crc32 = crc;
            entry.header.compressed_size = payload.len() as u32;
            entry.header.uncompressed_size = plain.len() as u32;
            entry.central.crc32 = crc;
            entry.central.compressed_size = payload.len() as u32;
            entry.central.uncompressed_size = plain.len() as u32;
            entry.central.header_offset = out.len() as u32;

            entry.header.write_to(&mut out)?;
            out.extend_from_slice(&payload);
        }

        let cd_offset = out.len() as u32;
        for entry in &self.entries {
            entry.central.write_to(&mut out)?;
        }
        let cd_size = out.len() as u32 - cd_offset;

        self.end.disk_entries = self.entries.len() as u16;
        self.end.total_entries = self.entries.len() as u16;
        self.end.cd_size = cd_size;
        self.end.cd_offset = cd_offset;
        self.end.write_to(&mut out)?;

        Ok(out)
    }

    /// Serialize and write the archive to a file.
    pub fn save_to_file(&mut self, path: &Path) -> Result<()> {
        let buf = self.serialize()?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    /// Extract every entry beneath `dir`, creating directories as
    /// needed. Entries whose stored path ends in `/` become directories.
    pub fn extract_all(&mut self, dir: &Path) -> Result<()> {
        let paths: Vec<String> = self.entries.iter().map(|e| e.path()).collect();
        for path in paths {
            let target = dir.join(&path);
            if path.ends_with('/') {
                std::fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let data = self.read_entry(&path)?;
            std::fs::write(&target, data)?;
        }
        Ok(())
    }

    /// Add a file or directory tree to the archive. Directories are
    /// walked in sorted name order so archive layout is deterministic;
    /// stored paths use `/` separators under `prefix`.
    pub fn add_path(&mut self, path: &Path, prefix: &str) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let stored = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };

        if path.is_dir() {
            let mut children: Vec<_> = std::fs::read_dir(path)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|e| e.path())
                .collect();
            children.sort();
            for child in children {
                self.add_path(&child, &stored)?;
            }
        } else {
            let data = std::fs::read(path)?;
            self.create_entry(&stored, Some(&data))?;
        }
        Ok(())
    }

    /// Build a new archive from the contents of a directory.
    pub fn create_from_dir(dir: &Path) -> Result<Self> {
        let mut archive = Self::new();
        let mut children: Vec<_> = std::fs::read_dir(dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        children.sort();
        for child in children {
            archive.add_path(&child, "")?;
        }
        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::crypto::CIPHER_HEADER_SIZE;
    use crate::zip::structures::{FLAG_ENCRYPTED, LocalFileHeader};
    use byteorder::{LittleEndian, ReadBytesExt};

    fn read_u32_at(buf: &[u8], pos: usize) -> u32 {
        let mut cursor = Cursor::new(&buf[pos..]);
        cursor.read_u32::<LittleEndian>().unwrap()
    }

    #[test]
    fn plain_round_trip() {
        let mut archive = ZipArchive::new();
        archive
            .create_entry("hello.txt", Some(b"hello world"))
            .unwrap();
        let buf = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&buf).unwrap();
        let entry = reopened.entry("hello.txt").unwrap();
        assert!(!entry.is_encrypted());
        assert_eq!(reopened.read_entry("hello.txt").unwrap(), b"hello world");
    }

    #[test]
    fn encrypted_round_trip() {
        let mut archive = ZipArchive::new();
        archive.set_password(Some("secret"));
        archive
            .create_entry("hello.txt", Some(b"hello world"))
            .unwrap();
        let buf = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&buf).unwrap();
        let entry = reopened.entry("hello.txt").unwrap();
        assert!(entry.is_encrypted());
        assert_eq!(
            entry.compressed_size() as usize,
            CIPHER_HEADER_SIZE + deflate(b"hello world").unwrap().len()
        );

        reopened.set_password(Some("secret"));
        assert_eq!(reopened.read_entry("hello.txt").unwrap(), b"hello world");
    }

    #[test]
    fn serialize_recomputes_crc_offsets_and_counts() {
        let mut archive = ZipArchive::new();
        archive.create_entry("a.txt", Some(b"alpha")).unwrap();
        archive.create_entry("sub/b.bin", Some(&[9u8; 500])).unwrap();
        archive.create_entry("c.txt", Some(b"")).unwrap();
        let buf = archive.serialize().unwrap();

        // Directory counts match the entry count.
        assert_eq!(archive.end.disk_entries, 3);
        assert_eq!(archive.end.total_entries, 3);

        // Every central record's header offset points at a local header
        // signature in the output, and every stored CRC matches the
        // plaintext.
        for entry in archive.entries() {
            let offset = entry.central.header_offset as usize;
            assert_eq!(read_u32_at(&buf, offset), LocalFileHeader::SIGNATURE);
        }
        let mut reopened = ZipArchive::parse(&buf).unwrap();
        for path in ["a.txt", "sub/b.bin", "c.txt"] {
            let plain = reopened.read_entry(path).unwrap();
            let entry = reopened.entry(path).unwrap();
            assert_eq!(entry.crc32(), crc32fast::hash(&plain));
        }

        // The end record sits at the offset the directory size implies.
        let eocd_pos = EndOfCentralDirectory::find(&buf).unwrap();
        let mut cursor = Cursor::new(buf.as_slice());
        cursor.set_position(eocd_pos as u64);
        let end = EndOfCentralDirectory::parse(&mut cursor).unwrap();
        assert_eq!(end.cd_offset as usize + end.cd_size as usize, eocd_pos);
    }

    #[test]
    fn reserialize_is_stable() {
        let mut archive = ZipArchive::new();
        archive.set_password(Some("pw"));
        archive.create_entry("x.txt", Some(b"data one")).unwrap();
        archive.create_entry("y.txt", Some(b"data two")).unwrap();
        let first = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&first).unwrap();
        reopened.set_password(Some("pw"));
        let second = reopened.serialize().unwrap();

        let mut third = ZipArchive::parse(&second).unwrap();
        third.set_password(Some("pw"));
        assert_eq!(third.len(), 2);
        assert_eq!(third.read_entry("x.txt").unwrap(), b"data one");
        assert_eq!(third.read_entry("y.txt").unwrap(), b"data two");
        assert!(third.entry("x.txt").unwrap().is_encrypted());
    }

    #[test]
    fn remove_shrinks_directory() {
        let mut archive = ZipArchive::new();
        archive.create_entry("keep.txt", Some(b"keep")).unwrap();
        archive.create_entry("drop.txt", Some(b"drop")).unwrap();

        let removed = archive.remove("drop.txt").unwrap();
        assert_eq!(removed.name(), "drop.txt");
        assert!(matches!(
            archive.remove("drop.txt"),
            Err(ZipError::EntryNotFound(_))
        ));

        let buf = archive.serialize().unwrap();
        let reopened = ZipArchive::parse(&buf).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.entry("drop.txt").is_none());
        assert_eq!(archive.end.disk_entries, 1);
    }

    #[test]
    fn per_entry_password_overrides_archive_password() {
        let mut archive = ZipArchive::new();
        archive.set_password(Some("outer"));
        archive.create_entry("inner.txt", Some(b"payload")).unwrap();
        archive
            .entry_mut("inner.txt")
            .unwrap()
            .set_password(Some("inner"));
        let buf = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&buf).unwrap();
        reopened
            .entry_mut("inner.txt")
            .unwrap()
            .set_password(Some("inner"));
        assert_eq!(reopened.read_entry("inner.txt").unwrap(), b"payload");
    }

    #[test]
    fn encrypted_read_without_password_fails() {
        let mut archive = ZipArchive::new();
        archive.set_password(Some("pw"));
        archive.create_entry("s.txt", Some(b"secret")).unwrap();
        let buf = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&buf).unwrap();
        assert!(matches!(
            reopened.read_entry("s.txt"),
            Err(ZipError::MissingPassword)
        ));
    }

    #[test]
    fn garbage_buffer_is_directory_not_found() {
        assert!(matches!(
            ZipArchive::parse(&[0u8; 1024]),
            Err(ZipError::DirectoryNotFound)
        ));
    }

    #[test]
    fn lookup_by_basename_first_match() {
        let mut archive = ZipArchive::new();
        archive.create_entry("a/name.txt", Some(b"first")).unwrap();
        archive.create_entry("b/name.txt", Some(b"second")).unwrap();
        assert_eq!(archive.entry("name.txt").unwrap().path(), "a/name.txt");
        assert_eq!(archive.entry("b/name.txt").unwrap().path(), "b/name.txt");
    }

    #[test]
    fn encrypted_flag_survives_round_trip_unread() {
        // An encrypted entry that is never read still re-serializes when
        // the password is available at serialize time.
        let mut archive = ZipArchive::new();
        archive.set_password(Some("pw"));
        archive.create_entry("e.txt", Some(b"enc")).unwrap();
        let buf = archive.serialize().unwrap();

        let mut reopened = ZipArchive::parse(&buf).unwrap();
        reopened.set_password(Some("pw"));
        let again = reopened.serialize().unwrap();
        let mut final_archive = ZipArchive::parse(&again).unwrap();
        final_archive.set_password(Some("pw"));
        assert_eq!(final_archive.read_entry("e.txt").unwrap(), b"enc");
        assert_ne!(
            final_archive.entry("e.txt").unwrap().central.flags & FLAG_ENCRYPTED,
            0
        );
    }
}
