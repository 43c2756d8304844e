//! Primary record encoding
//!
//! Every stored record carries an explicit tag byte, so an inline value
//! can hold any bytes without being mistaken for a disk reference or an
//! eviction marker.
//!
//! ## Format
//! ```text
//! ┌─────────┬─────────┬──────────────────────────────┐
//! │ Tag (1) │ CRC (4) │ Payload                      │
//! └─────────┴─────────┴──────────────────────────────┘
//!   0x00 Inline   payload = value
//!   0x01 DiskRef  payload = blob id (ASCII hex)
//!   0x02 Evicted  payload = empty
//! ```

use crate::error::{KvError, Result};

const TAG_INLINE: u8 = 0x00;
const TAG_DISK_REF: u8 = 0x01;
const TAG_EVICTED: u8 = 0x02;

/// Tag + CRC
pub const RECORD_HEADER_SIZE: usize = 5;

/// Placement of a key's value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Value stored directly in the index
    Inline(Vec<u8>),

    /// Value stored in the blob store under this id
    DiskRef(String),

    /// Value reclaimed by eviction; the key is still known
    Evicted,
}

impl Record {
    /// Encode to the on-disk format
    pub fn encode(&self) -> Vec<u8> {
        let (tag, payload): (u8, &[u8]) = match self {
            Record::Inline(value) => (TAG_INLINE, value),
            Record::DiskRef(id) => (TAG_DISK_REF, id.as_bytes()),
            Record::Evicted => (TAG_EVICTED, &[]),
        };

        let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE + payload.len());
        buf.push(tag);
        buf.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    /// Decode from the on-disk format
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(KvError::Corruption(format!(
                "record too short: {} bytes",
                bytes.len()
            )));
        }

        let tag = bytes[0];
        let stored_crc = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let payload = &bytes[RECORD_HEADER_SIZE..];

        if crc32fast::hash(payload) != stored_crc {
            return Err(KvError::Corruption("record checksum mismatch".to_string()));
        }

        match tag {
            TAG_INLINE => Ok(Record::Inline(payload.to_vec())),
            TAG_DISK_REF => {
                let id = std::str::from_utf8(payload)
                    .map_err(|_| KvError::Corruption("blob id is not UTF-8".to_string()))?;
                Ok(Record::DiskRef(id.to_string()))
            }
            TAG_EVICTED if payload.is_empty() => Ok(Record::Evicted),
            TAG_EVICTED => Err(KvError::Corruption(
                "evicted marker with payload".to_string(),
            )),
            other => Err(KvError::Corruption(format!("unknown record tag {:#04x}", other))),
        }
    }

    /// Blob id if this record points into the blob store
    pub fn blob_id(&self) -> Option<&str> {
        match self {
            Record::DiskRef(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_evicted(&self) -> bool {
        matches!(self, Record::Evicted)
    }
}
