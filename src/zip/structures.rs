//! Binary record codecs for the ZIP container format.
//!
//! Three fixed-layout records make up an archive: a [`LocalFileHeader`]
//! before each entry's data, one [`CentralDirectoryRecord`] per entry in
//! the central directory table near the end of the file, and a single
//! [`EndOfCentralDirectory`] trailer. All integers are little-endian.
//!
//! Each record parses from a [`Cursor`] positioned at its first byte and
//! serializes itself field by field; the length-prefix fields for the
//! variable parts (name, extra, comment) are always derived from the
//! actual byte content at write time, so they cannot drift.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, ZipError};

/// General-purpose flag bit 0: entry payload is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This bounds the backward search area when looking for the end record
/// behind a trailing comment.
pub const MAX_COMMENT_SIZE: usize = 65535;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// A modification timestamp in the packed 16-bit DOS date/time format.
///
/// The date word packs `(year - 1980) | month | day`, the time word packs
/// `hour | minute | second / 2`. Values are naive local time; no timezone
/// conversion is ever applied. Packing and unpacking round-trip for every
/// value the format can represent (seconds lose their low bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// Pack calendar components. Out-of-range components are masked to
    /// their field width, mirroring what other ZIP tools do.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let date = (year.saturating_sub(1980) & 0x7F) << 9
            | (u16::from(month) & 0x0F) << 5
            | u16::from(day) & 0x1F;
        let time = (u16::from(hour) & 0x1F) << 11
            | (u16::from(minute) & 0x3F) << 5
            | (u16::from(second) >> 1) & 0x1F;
        Self { date, time }
    }

    /// Unpack to `(year, month, day, hour, minute, second)`.
    pub fn parts(&self) -> (u16, u8, u8, u8, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (year, month, day, hour, minute, second)
    }

    /// The current wall-clock time, packed.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let days = secs / 86400;
        let tod = secs % 86400;

        // Civil-from-days (proleptic Gregorian), days since 1970-01-01.
        let z = days as i64 + 719_468;
        let era = z.div_euclid(146_097);
        let doe = z - era * 146_097;
        let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = (yoe + era * 400 + i64::from(month <= 2)) as u16;

        Self::from_parts(
            year,
            month,
            day,
            (tod / 3600) as u8,
            ((tod % 3600) / 60) as u8,
            (tod % 60) as u8,
        )
    }
}

/// Read and check a record's 4-byte signature word.
fn expect_signature(cursor: &mut Cursor<&[u8]>, expected: u32) -> Result<()> {
    let found = cursor.read_u32::<LittleEndian>()?;
    if found != expected {
        return Err(ZipError::MalformedSignature { expected, found });
    }
    Ok(())
}

/// Read a byte run whose length was already parsed.
fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(buf)
}

/// Local File Header (LFH) - stored immediately before each entry's data.
#[derive(Debug, Clone, Default)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub modified: DosDateTime,
    /// CRC-32 of the *plaintext* content, even when encrypted.
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Local File Header signature, read as a little-endian u32.
    pub const SIGNATURE: u32 = 0x04034B50;
    /// Fixed-field size including the signature.
    pub const FIXED_SIZE: usize = 30;

    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        expect_signature(cursor, Self::SIGNATURE)?;

        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let time = cursor.read_u16::<LittleEndian>()?;
        let date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        let name = read_bytes(cursor, name_len as usize)?;
        let extra = read_bytes(cursor, extra_len as usize)?;

        Ok(Self {
            version_needed,
            flags,
            method,
            modified: DosDateTime { date, time },
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.name.len() as u16)?;
        out.write_u16::<LittleEndian>(self.extra.len() as u16)?;
        out.write_all(&self.name)?;
        out.write_all(&self.extra)?;
        Ok(())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        Self::FIXED_SIZE + self.name.len() + self.extra.len()
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// Central Directory File Header (CDFH) - one per entry, mirrors the
/// local header plus attributes and the local header's file offset.
#[derive(Debug, Clone, Default)]
pub struct CentralDirectoryRecord {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    /// Byte offset of the paired local header within the archive.
    pub header_offset: u32,
    pub name: Vec<u8>,
    pub extra: Vec<u8>,
    pub comment: Vec<u8>,
}

impl CentralDirectoryRecord {
    /// Central Directory File Header signature, little-endian u32.
    pub const SIGNATURE: u32 = 0x02014B50;
    /// Fixed-field size including the signature.
    pub const FIXED_SIZE: usize = 46;

    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        expect_signature(cursor, Self::SIGNATURE)?;

        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let time = cursor.read_u16::<LittleEndian>()?;
        let date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;
        let disk_start = cursor.read_u16::<LittleEndian>()?;
        let internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let external_attrs = cursor.read_u32::<LittleEndian>()?;
        let header_offset = cursor.read_u32::<LittleEndian>()?;
        let name = read_bytes(cursor, name_len as usize)?;
        let extra = read_bytes(cursor, extra_len as usize)?;
        let comment = read_bytes(cursor, comment_len as usize)?;

        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: DosDateTime { date, time },
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attrs,
            external_attrs,
            header_offset,
            name,
            extra,
            comment,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(self.modified.time)?;
        out.write_u16::<LittleEndian>(self.modified.date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.name.len() as u16)?;
        out.write_u16::<LittleEndian>(self.extra.len() as u16)?;
        out.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        out.write_u16::<LittleEndian>(self.disk_start)?;
        out.write_u16::<LittleEndian>(self.internal_attrs)?;
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(self.header_offset)?;
        out.write_all(&self.name)?;
        out.write_all(&self.extra)?;
        out.write_all(&self.comment)?;
        Ok(())
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> usize {
        Self::FIXED_SIZE + self.name.len() + self.extra.len() + self.comment.len()
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }
}

/// End of Central Directory (EOCD) - exactly one per archive, at the end.
#[derive(Debug, Clone, Default)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    /// Total serialized size of all central directory records.
    pub cd_size: u32,
    /// Offset of the first central directory record.
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// End of Central Directory signature, little-endian u32.
    pub const SIGNATURE: u32 = 0x06054B50;
    /// Fixed-field size including the signature.
    pub const FIXED_SIZE: usize = 22;

    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        expect_signature(cursor, Self::SIGNATURE)?;

        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        let disk_entries = cursor.read_u16::<LittleEndian>()?;
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;
        let comment = read_bytes(cursor, comment_len as usize)?;

        Ok(Self {
            disk_number,
            disk_with_cd,
            disk_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        out.write_all(&self.comment)?;
        Ok(())
    }

    /// Scan backward for the end record signature, starting at the last
    /// 4 bytes of the buffer and moving one byte at a time toward the
    /// start. The first position whose 4 bytes read (little-endian) as
    /// the signature wins.
    ///
    /// A trailing comment can push the record away from the end of the
    /// file, and a comment that happens to contain the signature bytes
    /// will fool this scan - that is a property of the format itself and
    /// is preserved for compatibility. The search is bounded by the
    /// format's maximum comment length.
    pub fn find(buf: &[u8]) -> Result<usize> {
        if buf.len() < Self::FIXED_SIZE {
            return Err(ZipError::DirectoryNotFound);
        }
        let floor = buf
            .len()
            .saturating_sub(MAX_COMMENT_SIZE + Self::FIXED_SIZE);
        let mut pos = buf.len() - 4;
        loop {
            let word = u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]]);
            if word == Self::SIGNATURE {
                return Ok(pos);
            }
            if pos == floor {
                return Err(ZipError::DirectoryNotFound);
            }
            pos -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_method_round_trip() {
        assert_eq!(CompressionMethod::from_u16(0), CompressionMethod::Stored);
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
        assert_eq!(
            CompressionMethod::from_u16(12),
            CompressionMethod::Unknown(12)
        );
        assert_eq!(CompressionMethod::Deflate.as_u16(), 8);
    }

    #[test]
    fn dos_datetime_round_trip() {
        for &(y, mo, d, h, mi, s) in &[
            (1980, 1, 1, 0, 0, 0),
            (1999, 12, 31, 23, 59, 58),
            (2024, 2, 29, 12, 30, 6),
            (2107, 12, 31, 23, 59, 58),
        ] {
            let dt = DosDateTime::from_parts(y, mo, d, h, mi, s);
            assert_eq!(dt.parts(), (y, mo, d, h, mi, s));
        }
    }

    #[test]
    fn dos_datetime_truncates_odd_seconds() {
        let dt = DosDateTime::from_parts(2020, 6, 15, 10, 20, 31);
        assert_eq!(dt.parts(), (2020, 6, 15, 10, 20, 30));
    }

    #[test]
    fn local_header_round_trip() {
        let header = LocalFileHeader {
            version_needed: 20,
            flags: FLAG_ENCRYPTED,
            method: 8,
            modified: DosDateTime::from_parts(2021, 3, 4, 5, 6, 8),
            crc32: 0xDEADBEEF,
            compressed_size: 42,
            uncompressed_size: 99,
            name: b"dir/file.txt".to_vec(),
            extra: vec![1, 2, 3],
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), header.size());

        let parsed = LocalFileHeader::parse(&mut Cursor::new(buf.as_slice())).unwrap();
        assert_eq!(parsed.flags, FLAG_ENCRYPTED);
        assert!(parsed.is_encrypted());
        assert_eq!(parsed.crc32, 0xDEADBEEF);
        assert_eq!(parsed.name, b"dir/file.txt");
        assert_eq!(parsed.extra, vec![1, 2, 3]);
        assert_eq!(parsed.modified.parts(), (2021, 3, 4, 5, 6, 8));
    }

    #[test]
    fn central_record_round_trip() {
        let record = CentralDirectoryRecord {
            version_made_by: 20,
            version_needed: 20,
            method: 0,
            crc32: 7,
            compressed_size: 11,
            uncompressed_size: 11,
            external_attrs: 0o644 << 16,
            header_offset: 1234,
            name: b"a.bin".to_vec(),
            comment: b"note".to_vec(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        record.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), record.size());

        let parsed = CentralDirectoryRecord::parse(&mut Cursor::new(buf.as_slice())).unwrap();
        assert_eq!(parsed.header_offset, 1234);
        assert_eq!(parsed.external_attrs, 0o644 << 16);
        assert_eq!(parsed.comment, b"note");
    }

    #[test]
    fn bad_signature_is_typed() {
        let mut buf = Vec::new();
        LocalFileHeader::default().write_to(&mut buf).unwrap();
        // Corrupt the signature word.
        buf[0] ^= 0xFF;
        let err = LocalFileHeader::parse(&mut Cursor::new(buf.as_slice())).unwrap_err();
        match err {
            ZipError::MalformedSignature { expected, .. } => {
                assert_eq!(expected, LocalFileHeader::SIGNATURE);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn eocd_found_behind_comment() {
        let eocd = EndOfCentralDirectory {
            total_entries: 3,
            disk_entries: 3,
            comment: b"trailing archive comment".to_vec(),
            ..Default::default()
        };
        let mut buf = vec![0u8; 100];
        eocd.write_to(&mut buf).unwrap();

        let pos = EndOfCentralDirectory::find(&buf).unwrap();
        assert_eq!(pos, 100);
        let parsed = EndOfCentralDirectory::parse(&mut Cursor::new(&buf[pos..])).unwrap();
        assert_eq!(parsed.total_entries, 3);
        assert_eq!(parsed.comment, b"trailing archive comment");
    }

    #[test]
    fn eocd_missing_is_directory_not_found() {
        let buf = vec![0u8; 512];
        assert!(matches!(
            EndOfCentralDirectory::find(&buf),
            Err(ZipError::DirectoryNotFound)
        ));
        assert!(matches!(
            EndOfCentralDirectory::find(&[1, 2]),
            Err(ZipError::DirectoryNotFound)
        ));
    }
}
