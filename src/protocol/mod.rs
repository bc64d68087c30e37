//! Wire protocol: block framing and control-channel payloads
//!
//! A block is the atomic unit on the wire: a fixed sync-marked header
//! followed by an opaque payload. Announcement and overlay-manipulation
//! payloads are JSON documents carried inside blocks of their own kind.

pub mod announce;
pub mod block;
pub mod overlay;

pub use announce::{ProgramAnnouncement, StreamDescriptor};
pub use block::{Block, BlockKind, StreamType, HEADER_SIZE, SYNC_MARKER};
pub use overlay::{ActionBatch, OverlayAction, Placement};
