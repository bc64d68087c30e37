//! Overlay manipulation payloads
//!
//! The second control sub-protocol: batches of actions instructing the
//! receiver to place or remove an on-screen overlay. Image data travels
//! base64-encoded inside the JSON document; placement is expressed as
//! percentages of the output frame so the receiver stays resolution
//! agnostic.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::protocol::block::{Block, BlockKind, INDEX_NONE};

/// Overlay placement rectangle, in percent of the output frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_pct: f64,
    pub y_pct: f64,
    pub width_pct: f64,
    pub height_pct: f64,
}

/// A single manipulation action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum OverlayAction {
    #[serde(rename = "add_overlay")]
    Add {
        id: u64,
        /// Presentation hint in 90 kHz ticks; 0 means as soon as possible
        #[serde(default)]
        timestamp: u64,
        /// MIME type of the embedded image ("image/png", "image/jpeg", ...)
        data_type: String,
        /// Base64-encoded image bytes
        data: String,
        x_percentage: f64,
        y_percentage: f64,
        width_percentage: f64,
        height_percentage: f64,
    },
    #[serde(rename = "remove_overlay")]
    Remove {
        id: u64,
        #[serde(default)]
        timestamp: u64,
    },
}

impl OverlayAction {
    /// Build an add action from raw image bytes
    pub fn add(id: u64, mime: impl Into<String>, image: &[u8], placement: Placement) -> Self {
        OverlayAction::Add {
            id,
            timestamp: 0,
            data_type: mime.into(),
            data: BASE64.encode(image),
            x_percentage: placement.x_pct,
            y_percentage: placement.y_pct,
            width_percentage: placement.width_pct,
            height_percentage: placement.height_pct,
        }
    }

    pub fn remove(id: u64) -> Self {
        OverlayAction::Remove { id, timestamp: 0 }
    }

    pub fn id(&self) -> u64 {
        match self {
            OverlayAction::Add { id, .. } | OverlayAction::Remove { id, .. } => *id,
        }
    }

    /// Decode the embedded image of an add action
    pub fn decode_image(&self) -> Result<Vec<u8>, ControlError> {
        match self {
            OverlayAction::Add { data, .. } => BASE64
                .decode(data)
                .map_err(|e| ControlError::Image(e.to_string())),
            OverlayAction::Remove { .. } => Err(ControlError::Image(
                "remove action carries no image".to_string(),
            )),
        }
    }

    pub fn placement(&self) -> Option<Placement> {
        match self {
            OverlayAction::Add {
                x_percentage,
                y_percentage,
                width_percentage,
                height_percentage,
                ..
            } => Some(Placement {
                x_pct: *x_percentage,
                y_pct: *y_percentage,
                width_pct: *width_percentage,
                height_pct: *height_percentage,
            }),
            OverlayAction::Remove { .. } => None,
        }
    }
}

/// Batch of actions carried by one manipulation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionBatch {
    pub actions: Vec<OverlayAction>,
}

impl ActionBatch {
    pub fn new(actions: Vec<OverlayAction>) -> Self {
        Self { actions }
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

    /// Wrap into a manipulation block ready for the transfer queue
    pub fn into_block(&self) -> Result<Block, ControlError> {
        Ok(Block::control(
            BlockKind::Manipulation,
            INDEX_NONE,
            self.to_payload()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn placement() -> Placement {
        Placement {
            x_pct: 10.0,
            y_pct: 20.0,
            width_pct: 15.0,
            height_pct: 10.0,
        }
    }

    #[test]
    fn test_batch_round_trip() {
        let batch = ActionBatch::new(vec![
            OverlayAction::add(1001, "image/png", IMAGE, placement()),
            OverlayAction::remove(1001),
        ]);
        let payload = batch.to_payload().unwrap();
        let decoded = ActionBatch::from_payload(&payload).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_action_tagging() {
        let batch = ActionBatch::new(vec![OverlayAction::add(7, "image/jpeg", IMAGE, placement())]);
        let json: serde_json::Value = serde_json::from_slice(&batch.to_payload().unwrap()).unwrap();

        assert_eq!(json["actions"][0]["action"], "add_overlay");
        assert_eq!(json["actions"][0]["id"], 7);
        assert_eq!(json["actions"][0]["data_type"], "image/jpeg");
        assert_eq!(json["actions"][0]["x_percentage"], 10.0);
    }

    #[test]
    fn test_image_round_trip() {
        let action = OverlayAction::add(1, "image/png", IMAGE, placement());
        assert_eq!(action.decode_image().unwrap(), IMAGE);
    }

    #[test]
    fn test_corrupt_image_rejected() {
        let action = OverlayAction::Add {
            id: 1,
            timestamp: 0,
            data_type: "image/png".to_string(),
            data: "!!!not base64!!!".to_string(),
            x_percentage: 0.0,
            y_percentage: 0.0,
            width_percentage: 0.0,
            height_percentage: 0.0,
        };
        assert!(action.decode_image().is_err());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let payload = br#"{"actions":[{"action":"blink","id":1}]}"#;
        assert!(ActionBatch::from_payload(payload).is_err());
    }

    #[test]
    fn test_into_block() {
        let block = ActionBatch::new(vec![OverlayAction::remove(5)]).into_block().unwrap();
        assert_eq!(block.kind, BlockKind::Manipulation);
        assert_eq!(block.program_index, INDEX_NONE);
    }
}
