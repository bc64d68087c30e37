//! Block framing format
//!
//! Every unit on the wire is a block: a 24-byte little-endian header opened
//! by a sync marker, immediately followed by `payload_size` raw bytes. A
//! block is self-describing; no external length table is needed to walk a
//! stream of them.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::NULL_PAYLOAD_SIZE;
use crate::error::FramingError;

/// Sync marker opening every block. Must match on both ends of a link.
///
/// Serialized little-endian, so the wire bytes are `12 34 56 78`.
pub const SYNC_MARKER: u32 = 0x7856_3412;

/// Size of the fixed wire header in bytes
pub const HEADER_SIZE: usize = 24;

/// Field value for "not applicable" program/stream indices
pub const INDEX_NONE: u8 = 0xff;

/// Kind of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// Encoded media payload
    EssenceData,
    /// Zero-information filler keeping the bitrate constant
    Null,
    /// Overlay manipulation actions (control channel)
    Manipulation,
    /// Program announcement (control channel)
    Announcement,
    /// Unrecognized kind byte, carried through and dropped at dispatch
    Unknown,
}

impl BlockKind {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => BlockKind::EssenceData,
            1 => BlockKind::Null,
            2 => BlockKind::Manipulation,
            3 => BlockKind::Announcement,
            _ => BlockKind::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            BlockKind::EssenceData => 0,
            BlockKind::Null => 1,
            BlockKind::Manipulation => 2,
            BlockKind::Announcement => 3,
            BlockKind::Unknown => 0xff,
        }
    }
}

/// Media classification of a stream
///
/// Carried as a raw byte in the wire header and as its lowercase name in
/// control-channel JSON ("video", "audio", ...). Unrecognized values fold
/// into `Unknown` in both encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Video,
    Audio,
    Data,
    Subtitle,
    Unknown,
}

impl StreamType {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => StreamType::Video,
            1 => StreamType::Audio,
            2 => StreamType::Data,
            3 => StreamType::Subtitle,
            _ => StreamType::Unknown,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            StreamType::Video => 0,
            StreamType::Audio => 1,
            StreamType::Data => 2,
            StreamType::Subtitle => 3,
            StreamType::Unknown => 0xff,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::Video => "video",
            StreamType::Audio => "audio",
            StreamType::Data => "data",
            StreamType::Subtitle => "subtitle",
            StreamType::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "video" => StreamType::Video,
            "audio" => StreamType::Audio,
            "data" => StreamType::Data,
            "subtitle" => StreamType::Subtitle,
            _ => StreamType::Unknown,
        }
    }
}

impl Serialize for StreamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StreamType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(StreamType::from_name(&name))
    }
}

/// Atomic framed unit of the wire protocol
///
/// Owned by exactly one pipeline stage at a time; hand-off moves the value.
/// The payload is reference-counted, so cloning for the muxer's
/// announcement cache does not copy the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub program_index: u8,
    pub stream_type: StreamType,
    pub stream_index: u8,
    /// 90 kHz ticks, stamped by the muxer at send time
    pub timestamp: u64,
    payload: Bytes,
}

impl Block {
    /// Create a block with a zero-filled payload of the given size
    pub fn with_capacity(kind: BlockKind, payload_size: usize) -> Self {
        Self {
            kind,
            program_index: INDEX_NONE,
            stream_type: StreamType::Unknown,
            stream_index: INDEX_NONE,
            timestamp: 0,
            payload: Bytes::from(vec![0u8; payload_size]),
        }
    }

    /// Create a null (filler) block
    pub fn null() -> Self {
        Self::with_capacity(BlockKind::Null, NULL_PAYLOAD_SIZE)
    }

    /// Create an essence-data block carrying one encoded media packet
    pub fn essence(
        program_index: u8,
        stream_index: u8,
        stream_type: StreamType,
        timestamp: u64,
        payload: Bytes,
    ) -> Self {
        Self {
            kind: BlockKind::EssenceData,
            program_index,
            stream_type,
            stream_index,
            timestamp,
            payload,
        }
    }

    /// Create a control block (announcement or manipulation) from an
    /// already-encoded payload
    pub fn control(kind: BlockKind, program_index: u8, payload: Bytes) -> Self {
        Self {
            kind,
            program_index,
            stream_type: StreamType::Unknown,
            stream_index: INDEX_NONE,
            timestamp: 0,
            payload,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload as a cheaply-cloneable handle
    pub fn payload_bytes(&self) -> Bytes {
        self.payload.clone()
    }

    /// Total serialized length: header plus payload
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Serialize to exactly `wire_len()` bytes, no padding
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u32_le(SYNC_MARKER);
        buf.put_u32_le(HEADER_SIZE as u32);
        buf.put_u8(self.kind.as_u8());
        buf.put_u8(self.program_index);
        buf.put_u8(self.stream_type.as_u8());
        buf.put_u8(self.stream_index);
        buf.put_u64_le(self.timestamp);
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a block from the leading bytes of `buf`
    ///
    /// Fields are read one by one from the slice; no alignment is assumed.
    /// Succeeds when the sync marker matches and the declared payload fits
    /// inside `buf`; trailing bytes beyond the block are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, FramingError> {
        if buf.len() < HEADER_SIZE {
            return Err(FramingError::Truncated {
                needed: HEADER_SIZE,
                available: buf.len(),
            });
        }

        let sync = read_u32_le(buf, 0);
        if sync != SYNC_MARKER {
            return Err(FramingError::BadSync(sync));
        }

        let header_size = read_u32_le(buf, 4) as usize;
        let kind = BlockKind::from_raw(buf[8]);
        let program_index = buf[9];
        let stream_type = StreamType::from_raw(buf[10]);
        let stream_index = buf[11];
        let timestamp = read_u64_le(buf, 12);
        let payload_size = read_u32_le(buf, 20) as usize;

        // The header declares where its payload starts; tolerate headers
        // larger than ours by skipping the extra bytes.
        if header_size < HEADER_SIZE || buf.len() < header_size + payload_size {
            return Err(FramingError::Truncated {
                needed: header_size.max(HEADER_SIZE) + payload_size,
                available: buf.len(),
            });
        }

        Ok(Self {
            kind,
            program_index,
            stream_type,
            stream_index,
            timestamp,
            payload: Bytes::copy_from_slice(&buf[header_size..header_size + payload_size]),
        })
    }
}

fn read_u32_le(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn read_u64_le(buf: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        buf[at],
        buf[at + 1],
        buf[at + 2],
        buf[at + 3],
        buf[at + 4],
        buf[at + 5],
        buf[at + 6],
        buf[at + 7],
    ])
}
