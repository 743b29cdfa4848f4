use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::DatasetRecord;
use crate::error::DetError;

const BYTES_FILE: &str = "data_bytes.bin";
const ADDRESS_FILE: &str = "data_address.json";

/// Serialized records in one contiguous buffer plus an end-offset table.
///
/// Cloning shares both buffers. Record `i` lives at
/// `bytes[ends[i - 1]..ends[i]]` (with `ends[-1] == 0`) and is decoded on
/// every access, so readers never alias into each other's data.
#[derive(Clone, Debug)]
pub struct RecordArena {
    bytes: Arc<[u8]>,
    ends: Arc<[u64]>,
}

impl RecordArena {
    /// Serializes `records` in order.
    pub fn build(records: &[DatasetRecord]) -> Result<Self, DetError> {
        let mut bytes = Vec::new();
        let mut ends = Vec::with_capacity(records.len());
        for record in records {
            serde_json::to_writer(&mut bytes, record).map_err(DetError::Serialize)?;
            ends.push(bytes.len() as u64);
        }
        Ok(Self {
            bytes: bytes.into(),
            ends: ends.into(),
        })
    }

    /// Rebuilds an arena from its parts, checking that the table fits the buffer.
    pub fn from_parts(bytes: Vec<u8>, ends: Vec<u64>) -> Result<Self, DetError> {
        let mut prev = 0u64;
        for &end in &ends {
            if end < prev {
                return Err(DetError::InvalidInput(
                    "address table is not monotonic".to_string(),
                ));
            }
            prev = end;
        }
        if prev != bytes.len() as u64 {
            return Err(DetError::LengthMismatch {
                what: "arena bytes",
                expected: prev as usize,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.into(),
            ends: ends.into(),
        })
    }

    /// Writes `data_bytes.bin` and `data_address.json` into `dir`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), DetError> {
        fs::create_dir_all(dir).map_err(DetError::Io)?;
        fs::write(dir.join(BYTES_FILE), &self.bytes).map_err(DetError::Io)?;
        let table = serde_json::to_vec(&*self.ends).map_err(DetError::Serialize)?;
        fs::write(dir.join(ADDRESS_FILE), table).map_err(DetError::Io)
    }

    /// Reads an arena written by [`RecordArena::write_to_dir`].
    pub fn read_from_dir(dir: &Path) -> Result<Self, DetError> {
        let bytes_path = dir.join(BYTES_FILE);
        let bytes = fs::read(&bytes_path).map_err(|source| DetError::ReadFile {
            path: bytes_path,
            source,
        })?;
        let table_path = dir.join(ADDRESS_FILE);
        let table = fs::read(&table_path).map_err(|source| DetError::ReadFile {
            path: table_path.clone(),
            source,
        })?;
        let ends: Vec<u64> = serde_json::from_slice(&table).map_err(|source| {
            DetError::JsonParse {
                path: table_path,
                source,
            }
        })?;
        Self::from_parts(bytes, ends)
    }

    pub fn len(&self) -> usize {
        self.ends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Total size of the serialized records.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn ends(&self) -> &[u64] {
        &self.ends
    }

    /// Decodes record `idx`.
    pub fn get(&self, idx: usize) -> Result<DatasetRecord, DetError> {
        let end = *self.ends.get(idx).ok_or(DetError::IndexOutOfRange {
            index: idx,
            len: self.len(),
        })?;
        let start = if idx == 0 { 0 } else { self.ends[idx - 1] };
        serde_json::from_slice(&self.bytes[start as usize..end as usize])
            .map_err(DetError::Serialize)
    }
}
