//! Block dispatch and control-channel state machines
//!
//! Classifies recovered blocks by kind and drives per-program binding and
//! the single overlay slot. Essence payloads and overlay images are handed
//! to the external decode/render collaborators; nothing here touches pixels
//! or codecs. No block, however malformed, may stop the dispatcher.

use std::collections::HashMap;

use bytes::Bytes;

use crate::protocol::{
    ActionBatch, Block, BlockKind, OverlayAction, Placement, ProgramAnnouncement,
    StreamDescriptor, StreamType,
};
use crate::receiver::binding::ProgramBinding;

/// External codec collaborator
///
/// Receives decoder-open signals and raw encoded essence; decoding itself
/// lives outside this crate.
pub trait MediaSink {
    /// A program's video stream was bound; open a decoder for its codec
    fn open_video_decoder(&mut self, program_index: u8, stream_index: u8, stream: &StreamDescriptor);

    /// One encoded media packet for a bound stream
    fn on_essence(
        &mut self,
        program_index: u8,
        stream_index: u8,
        stream_type: StreamType,
        timestamp: u64,
        payload: Bytes,
    );
}

/// External overlay renderer collaborator
///
/// Owns the decoded overlay resource; replacing or clearing releases it.
pub trait OverlayRenderer {
    fn show(&mut self, id: u64, mime: &str, image: &[u8], placement: Placement);
    fn clear(&mut self, id: u64);
}

/// Dispatch statistics
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub essence_forwarded: u64,
    pub essence_dropped: u64,
    pub announcements_seen: u64,
    pub actions_applied: u64,
    pub malformed_dropped: u64,
}

/// Receive-side block dispatcher
pub struct Dispatcher<M, R> {
    media: M,
    renderer: R,
    bindings: HashMap<u8, ProgramBinding>,
    /// Currently shown overlay id, if any
    active_overlay: Option<u64>,
    stats: DispatchStats,
}

impl<M: MediaSink, R: OverlayRenderer> Dispatcher<M, R> {
    pub fn new(media: M, renderer: R) -> Self {
        Self {
            media,
            renderer,
            bindings: HashMap::new(),
            active_overlay: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.clone()
    }

    pub fn binding(&self, program_index: u8) -> Option<&ProgramBinding> {
        self.bindings.get(&program_index)
    }

    pub fn active_overlay(&self) -> Option<u64> {
        self.active_overlay
    }

    /// Access the collaborators, e.g. to read back recorded test doubles
    pub fn collaborators(&self) -> (&M, &R) {
        (&self.media, &self.renderer)
    }

    /// Route one recovered block
    pub fn dispatch(&mut self, block: Block) {
        match block.kind {
            BlockKind::EssenceData => self.on_essence(block),
            BlockKind::Null => {
                // Filler only advances the byte stream; nothing to do
            }
            BlockKind::Announcement => self.on_announcement(&block),
            BlockKind::Manipulation => self.on_manipulation(&block),
            BlockKind::Unknown => {
                tracing::trace!("dropping block of unknown kind");
            }
        }
    }

    fn on_essence(&mut self, block: Block) {
        let bound = self
            .bindings
            .get(&block.program_index)
            .map(|binding| binding.follows(block.stream_index))
            .unwrap_or(false);

        if !bound {
            self.stats.essence_dropped += 1;
            return;
        }

        self.stats.essence_forwarded += 1;
        self.media.on_essence(
            block.program_index,
            block.stream_index,
            block.stream_type,
            block.timestamp,
            block.payload_bytes(),
        );
    }

    fn on_announcement(&mut self, block: &Block) {
        self.stats.announcements_seen += 1;

        // First announcement wins; renewals for a bound program are for
        // late joiners and are ignored here.
        if self.bindings.contains_key(&block.program_index) {
            return;
        }

        let announcement = match ProgramAnnouncement::from_payload(block.payload()) {
            Ok(a) => a,
            Err(e) => {
                self.stats.malformed_dropped += 1;
                tracing::warn!(error = %e, "dropping malformed announcement");
                return;
            }
        };

        let binding = ProgramBinding::resolve(&announcement);
        tracing::info!(
            program = block.program_index,
            video = ?binding.video_stream_index,
            audio = ?binding.audio_stream_index,
            "program bound"
        );

        if let Some(video_index) = binding.video_stream_index {
            if let Some(stream) = announcement
                .streams
                .iter()
                .find(|s| s.index == video_index)
            {
                self.media
                    .open_video_decoder(block.program_index, video_index, stream);
            }
        }

        self.bindings.insert(block.program_index, binding);
    }

    fn on_manipulation(&mut self, block: &Block) {
        let batch = match ActionBatch::from_payload(block.payload()) {
            Ok(b) => b,
            Err(e) => {
                self.stats.malformed_dropped += 1;
                tracing::warn!(error = %e, "dropping malformed action batch");
                return;
            }
        };

        for action in &batch.actions {
            match action {
                OverlayAction::Add { id, data_type, .. } => {
                    let image = match action.decode_image() {
                        Ok(image) => image,
                        Err(e) => {
                            self.stats.malformed_dropped += 1;
                            tracing::warn!(id, error = %e, "dropping overlay with bad image");
                            continue;
                        }
                    };
                    let placement = action.placement().unwrap_or(Placement {
                        x_pct: 0.0,
                        y_pct: 0.0,
                        width_pct: 0.0,
                        height_pct: 0.0,
                    });
                    // Replaces whatever is showing, matching id or not
                    self.renderer.show(*id, data_type, &image, placement);
                    self.active_overlay = Some(*id);
                    self.stats.actions_applied += 1;
                }
                OverlayAction::Remove { id, .. } => {
                    if self.active_overlay == Some(*id) {
                        self.renderer.clear(*id);
                        self.active_overlay = None;
                        self.stats.actions_applied += 1;
                    } else {
                        tracing::debug!(id, "remove for inactive overlay ignored");
                    }
                }
            }
        }
    }
}
