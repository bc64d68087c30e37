//! Per-program stream binding
//!
//! A binding pins which stream indices of a program the receiver follows.
//! It is resolved from the first announcement seen for the program and
//! never changes afterwards; renewals exist for late joiners, not for
//! rebinding a live receiver.

use crate::protocol::{ProgramAnnouncement, StreamType};

/// Resolved stream selection for one program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramBinding {
    pub video_stream_index: Option<u8>,
    pub audio_stream_index: Option<u8>,
}

impl ProgramBinding {
    /// Resolve a binding from an announcement: the first stream of each
    /// media type in descriptor order wins
    pub fn resolve(announcement: &ProgramAnnouncement) -> Self {
        let mut binding = Self::default();
        for stream in &announcement.streams {
            match stream.media_type {
                StreamType::Video if binding.video_stream_index.is_none() => {
                    binding.video_stream_index = Some(stream.index);
                }
                StreamType::Audio if binding.audio_stream_index.is_none() => {
                    binding.audio_stream_index = Some(stream.index);
                }
                _ => {}
            }
        }
        binding
    }

    /// Whether the given stream index is one this binding follows
    pub fn follows(&self, stream_index: u8) -> bool {
        self.video_stream_index == Some(stream_index)
            || self.audio_stream_index == Some(stream_index)
    }
}
