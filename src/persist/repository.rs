//! Named model entries and their on-disk envelope.
//!
//! A [`ModelRepository`] maps entry names (slash-separated paths such as
//! `"Model/M2B0/model"`) to raw bytes. Saving a model with nested sub-models
//! produces one entry per model. The repository is stored as a 32-byte header
//! followed by a postcard-encoded payload.
//!
//! # Format Structure
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("M2BR")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       2     Reserved
//! 8       4     Number of entries
//! 12      4     Payload size (bytes)
//! 16      4     CRC32 checksum of payload
//! 20      12    Reserved
//! ```

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use super::PersistError;

/// Magic bytes identifying a repository file.
pub const MAGIC: &[u8; 4] = b"M2BR";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Header
// ============================================================================

/// 32-byte repository header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositoryHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub n_entries: u32,
    pub payload_size: u32,
    pub checksum: u32,
}

impl RepositoryHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[8..12].copy_from_slice(&self.n_entries.to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, PersistError> {
        if &buf[0..4] != MAGIC {
            return Err(PersistError::NotAModel);
        }
        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(PersistError::UnsupportedVersion {
                found: u32::from(version_major),
                supported: u32::from(CURRENT_VERSION_MAJOR),
            });
        }
        Ok(Self {
            version_major,
            version_minor,
            n_entries: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            payload_size: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            checksum: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }
}

// ============================================================================
// Repository
// ============================================================================

/// Version-tagged payload so future layouts can be told apart.
#[derive(Debug, Serialize, Deserialize)]
enum RepositoryPayload {
    V1 { entries: BTreeMap<String, Vec<u8>> },
}

/// In-memory set of named model entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRepository {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ModelRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Write header and payload.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), PersistError> {
        let payload = postcard::to_allocvec(&RepositoryPayload::V1 {
            entries: self.entries.clone(),
        })
        .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
        let header = RepositoryHeader {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            n_entries: self.entries.len() as u32,
            payload_size: payload.len() as u32,
            checksum: crc32fast::hash(&payload),
        };
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// Read and verify header and payload.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, PersistError> {
        let mut head = [0u8; HEADER_SIZE];
        reader.read_exact(&mut head).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => PersistError::NotAModel,
            _ => PersistError::Io(e),
        })?;
        let header = RepositoryHeader::from_bytes(&head)?;

        let mut payload = Vec::with_capacity(header.payload_size as usize);
        reader
            .take(header.payload_size as u64)
            .read_to_end(&mut payload)?;
        if payload.len() != header.payload_size as usize {
            return Err(PersistError::Truncated {
                expected: header.payload_size as usize,
                actual: payload.len(),
            });
        }

        let actual = crc32fast::hash(&payload);
        if actual != header.checksum {
            return Err(PersistError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let RepositoryPayload::V1 { entries } = postcard::from_bytes(&payload)
            .map_err(|e| PersistError::CorruptPayload(e.to_string()))?;
        if entries.len() != header.n_entries as usize {
            return Err(PersistError::CorruptPayload(format!(
                "header announces {} entries, payload holds {}",
                header.n_entries,
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        Self::read_from(&mut std::io::Cursor::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> ModelRepository {
        let mut r = ModelRepository::new();
        r.insert("Model/model", vec![1, 2, 3]);
        r.insert("Model/M2B0/model", vec![4, 5]);
        r
    }

    #[test]
    fn test_header_layout() {
        let header = RepositoryHeader {
            version_major: 1,
            version_minor: 0,
            n_entries: 2,
            payload_size: 100,
            checksum: 0xDEADBEEF,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"M2BR");
        assert_eq!(RepositoryHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_round_trip() {
        let r = repo();
        let bytes = r.to_bytes().unwrap();
        assert_eq!(ModelRepository::from_bytes(&bytes).unwrap(), r);
    }

    #[test]
    fn test_not_a_model() {
        let err = ModelRepository::from_bytes(b"nope").unwrap_err();
        assert!(matches!(err, PersistError::NotAModel));
        let mut bytes = repo().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            ModelRepository::from_bytes(&bytes),
            Err(PersistError::NotAModel)
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = repo().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            ModelRepository::from_bytes(&bytes),
            Err(PersistError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = repo().to_bytes().unwrap();
        let err = ModelRepository::from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, PersistError::Truncated { .. }));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut bytes = repo().to_bytes().unwrap();
        bytes[4] = CURRENT_VERSION_MAJOR + 1;
        assert!(matches!(
            ModelRepository::from_bytes(&bytes),
            Err(PersistError::UnsupportedVersion { .. })
        ));
    }
}
