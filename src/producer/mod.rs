//! Essence and control-channel producers
//!
//! A producer announces its program once, then pushes encoded media packets
//! into the transfer queue for as long as its source lasts. The demuxer
//! that actually reads media lives outside this crate, behind
//! [`EssenceSource`]. The overlay producer is its control-channel sibling,
//! emitting manipulation actions on a timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{ActionBatch, Block, OverlayAction, Placement, ProgramAnnouncement, StreamDescriptor, StreamType};
use crate::queue::BlockSender;

/// One encoded media packet from a demuxer
#[derive(Debug, Clone)]
pub struct EssencePacket {
    pub stream_index: u8,
    pub stream_type: StreamType,
    /// Presentation timestamp from the source; replaced by the muxer's
    /// clock at send time
    pub timestamp: u64,
    pub data: Bytes,
}

/// External demuxer collaborator
///
/// Supplies the stream layout once, then encoded packets until exhausted.
pub trait EssenceSource {
    fn describe(&mut self) -> Vec<StreamDescriptor>;
    fn next_packet(&mut self) -> Option<EssencePacket>;
}

/// Announce a program, then drain its source into the queue
///
/// Returns when the source is exhausted or `stop` is raised.
pub fn run_producer(
    program_index: u8,
    source: &mut dyn EssenceSource,
    queue: &BlockSender,
    stop: &AtomicBool,
) -> Result<()> {
    let streams = source.describe();
    tracing::info!(program = program_index, streams = streams.len(), "producer announcing");

    let announcement = ProgramAnnouncement::new(program_index, streams);
    queue.push(announcement.into_block()?);

    let mut packets: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        let Some(packet) = source.next_packet() else {
            break;
        };
        queue.push(Block::essence(
            program_index,
            packet.stream_index,
            packet.stream_type,
            packet.timestamp,
            packet.data,
        ));
        packets += 1;
    }

    tracing::info!(program = program_index, packets, "producer finished");
    Ok(())
}

/// Overlay demo loop: alternately place and remove an overlay
///
/// Every `period` a manipulation block is pushed, first adding the given
/// image at the given placement, then removing it under the same id, with
/// the id advancing per add/remove pair.
pub fn run_overlay_producer(
    queue: &BlockSender,
    period: Duration,
    mime: &str,
    image: &[u8],
    placement: Placement,
    stop: &AtomicBool,
) -> Result<()> {
    let mut show_next = true;
    let mut action_id: u64 = 1001;
    let mut period_start = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        if period_start.elapsed() >= period {
            let action = if show_next {
                OverlayAction::add(action_id, mime, image, placement)
            } else {
                let remove = OverlayAction::remove(action_id);
                action_id += 1;
                remove
            };
            show_next = !show_next;

            queue.push(ActionBatch::new(vec![action]).into_block()?);
            period_start = Instant::now();
        }
        thread::sleep(Duration::from_millis(1));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::BlockKind;
    use crate::queue::TransferQueue;

    struct ScriptedSource {
        packets: Vec<EssencePacket>,
    }

    impl EssenceSource for ScriptedSource {
        fn describe(&mut self) -> Vec<StreamDescriptor> {
            vec![
                StreamDescriptor::video(0, "h264", 640, 360, 25.0),
                StreamDescriptor::audio(1, "aac", 48000, 2),
            ]
        }
        fn next_packet(&mut self) -> Option<EssencePacket> {
            if self.packets.is_empty() {
                None
            } else {
                Some(self.packets.remove(0))
            }
        }
    }

    #[test]
    fn test_announcement_precedes_essence() {
        let (tx, queue) = TransferQueue::new();
        let mut source = ScriptedSource {
            packets: vec![
                EssencePacket {
                    stream_index: 0,
                    stream_type: StreamType::Video,
                    timestamp: 0,
                    data: Bytes::from_static(&[1]),
                },
                EssencePacket {
                    stream_index: 1,
                    stream_type: StreamType::Audio,
                    timestamp: 0,
                    data: Bytes::from_static(&[2]),
                },
            ],
        };
        let stop = AtomicBool::new(false);
        run_producer(4, &mut source, &tx, &stop).unwrap();
        drop(tx);

        let first = queue.pop().unwrap();
        assert_eq!(first.kind, BlockKind::Announcement);
        assert_eq!(first.program_index, 4);
        let announcement = ProgramAnnouncement::from_payload(first.payload()).unwrap();
        assert_eq!(announcement.streams.len(), 2);

        let second = queue.pop().unwrap();
        assert_eq!(second.kind, BlockKind::EssenceData);
        assert_eq!(second.stream_index, 0);
        let third = queue.pop().unwrap();
        assert_eq!(third.stream_index, 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overlay_producer_alternates_with_paired_ids() {
        let (tx, queue) = TransferQueue::new();
        let stop = std::sync::Arc::new(AtomicBool::new(false));

        let stop_for_thread = stop.clone();
        let handle = thread::spawn(move || {
            let placement = Placement {
                x_pct: 10.0,
                y_pct: 20.0,
                width_pct: 15.0,
                height_pct: 10.0,
            };
            run_overlay_producer(
                &tx,
                Duration::from_millis(10),
                "image/png",
                &[0xab],
                placement,
                &stop_for_thread,
            )
            .unwrap();
        });

        thread::sleep(Duration::from_millis(55));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        let mut actions = Vec::new();
        while let Some(block) = queue.pop() {
            assert_eq!(block.kind, BlockKind::Manipulation);
            let batch = ActionBatch::from_payload(block.payload()).unwrap();
            actions.extend(batch.actions);
        }
        assert!(actions.len() >= 2);

        // add(1001), remove(1001), add(1002), remove(1002), ...
        for (i, action) in actions.iter().enumerate() {
            let expected_id = 1001 + (i as u64) / 2;
            assert_eq!(action.id(), expected_id);
            match action {
                OverlayAction::Add { .. } => assert_eq!(i % 2, 0),
                OverlayAction::Remove { .. } => assert_eq!(i % 2, 1),
            }
        }
    }
}
