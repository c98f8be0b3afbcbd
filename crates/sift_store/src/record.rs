//! Record layout and codec.
//!
//! Every record occupies [`RECORD_SIZE`] bytes, little-endian:
//!
//! ```text
//! offset 0      flags     bit 0 = in use, other bits must be zero
//! offset 1..8   reserved  must be zero
//! offset 8..16  payload   u64
//! ```
//!
//! Record `id` lives at byte offset `id * RECORD_SIZE` of its kind's file.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use crate::error::{Result, StoreError};

/// Size in bytes of a single record slot.
pub const RECORD_SIZE: usize = 16;

const FLAG_IN_USE: u8 = 0b0000_0001;
const PAYLOAD_OFFSET: usize = 8;

/// Which record file an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Node,
    Relationship,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Node, RecordKind::Relationship];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Node => "node",
            RecordKind::Relationship => "relationship",
        }
    }

    /// File name of this kind's record file inside a store directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            RecordKind::Node => "nodes.store",
            RecordKind::Relationship => "relationships.store",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live record as returned by the public lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub id: u64,
    pub payload: u64,
}

/// A record slot as stored on disk, whether or not it is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub kind: RecordKind,
    pub id: u64,
    pub in_use: bool,
    pub payload: u64,
}

impl RawRecord {
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        if self.in_use {
            buf[0] = FLAG_IN_USE;
        }
        LittleEndian::write_u64(&mut buf[PAYLOAD_OFFSET..], self.payload);
        buf
    }

    pub fn decode(kind: RecordKind, id: u64, buf: &[u8; RECORD_SIZE]) -> Result<Self> {
        let flags = buf[0];
        if flags & !FLAG_IN_USE != 0 {
            return Err(StoreError::Corrupt {
                kind,
                id,
                reason: format!("unknown flag bits {:#010b}", flags),
            });
        }
        if buf[1..PAYLOAD_OFFSET].iter().any(|b| *b != 0) {
            return Err(StoreError::Corrupt {
                kind,
                id,
                reason: "reserved bytes are not zero".to_string(),
            });
        }
        Ok(Self {
            kind,
            id,
            in_use: flags & FLAG_IN_USE != 0,
            payload: LittleEndian::read_u64(&buf[PAYLOAD_OFFSET..]),
        })
    }

    /// The public view of this slot, if it holds a live record.
    pub fn into_live(self) -> Option<Record> {
        self.in_use.then_some(Record {
            kind: self.kind,
            id: self.id,
            payload: self.payload,
        })
    }
}
