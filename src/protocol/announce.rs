//! Program announcement payloads
//!
//! An announcement describes one program's stream layout: which stream
//! indices exist, their media types and codecs, and enough codec-specific
//! detail for a receiver to open decoders. Producers emit it once at
//! stream-open time; the muxer re-emits the latest one per program so
//! late-joining receivers can still bind.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::protocol::block::{Block, BlockKind, StreamType};

/// One stream inside a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub index: u8,
    #[serde(rename = "type")]
    pub media_type: StreamType,
    pub codec: String,

    // video only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,

    // audio only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,

    #[serde(default)]
    pub bit_rate: u64,
}

impl StreamDescriptor {
    /// Descriptor for a video stream
    pub fn video(index: u8, codec: impl Into<String>, width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            index,
            media_type: StreamType::Video,
            codec: codec.into(),
            width: Some(width),
            height: Some(height),
            frame_rate: Some(frame_rate),
            sample_rate: None,
            channels: None,
            bit_rate: 0,
        }
    }

    /// Descriptor for an audio stream
    pub fn audio(index: u8, codec: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            index,
            media_type: StreamType::Audio,
            codec: codec.into(),
            width: None,
            height: None,
            frame_rate: None,
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            bit_rate: 0,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = bit_rate;
        self
    }
}

/// Announcement payload for one program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAnnouncement {
    pub program_index: u8,
    pub streams: Vec<StreamDescriptor>,
}

impl ProgramAnnouncement {
    pub fn new(program_index: u8, streams: Vec<StreamDescriptor>) -> Self {
        Self {
            program_index,
            streams,
        }
    }

    /// Encode as a UTF-8 JSON payload
    pub fn to_payload(&self) -> Result<Bytes, ControlError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| ControlError::Malformed(e.to_string()))
    }

    /// Decode from a block payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, ControlError> {
        serde_json::from_slice(payload).map_err(|e| ControlError::Malformed(e.to_string()))
    }

    /// Wrap into an announcement block ready for the transfer queue
    pub fn into_block(&self) -> Result<Block, ControlError> {
        Ok(Block::control(
            BlockKind::Announcement,
            self.program_index,
            self.to_payload()?,
        ))
    }
}
