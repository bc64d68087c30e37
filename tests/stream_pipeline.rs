//! End-to-end receive path: framer feeding the dispatcher
//!
//! Mirrors what a receiver does with a live stream, minus the socket:
//! serialized blocks split at awkward offsets, recovered by the framer and
//! routed through the control-channel state machines.

use bytes::Bytes;

use essence_streamer::network::BlockFramer;
use essence_streamer::protocol::{
    ActionBatch, Block, OverlayAction, Placement, ProgramAnnouncement, StreamDescriptor,
    StreamType, SYNC_MARKER,
};
use essence_streamer::receiver::{Dispatcher, MediaSink, OverlayRenderer};

#[derive(Default)]
struct RecordingSink {
    decoders_opened: Vec<(u8, u8, String)>,
    essence: Vec<(u8, u8, Vec<u8>)>,
}

impl MediaSink for RecordingSink {
    fn open_video_decoder(&mut self, program: u8, stream: u8, descriptor: &StreamDescriptor) {
        self.decoders_opened
            .push((program, stream, descriptor.codec.clone()));
    }
    fn on_essence(&mut self, program: u8, stream: u8, _: StreamType, _: u64, payload: Bytes) {
        self.essence.push((program, stream, payload.to_vec()));
    }
}

#[derive(Default)]
struct RecordingRenderer {
    shown: Vec<u64>,
    cleared: Vec<u64>,
}

impl OverlayRenderer for RecordingRenderer {
    fn show(&mut self, id: u64, _: &str, _: &[u8], _: Placement) {
        self.shown.push(id);
    }
    fn clear(&mut self, id: u64) {
        self.cleared.push(id);
    }
}

fn wire_stream(blocks: &[Block]) -> Vec<u8> {
    let mut stream: Vec<u8> = blocks.iter().flat_map(|b| b.serialize().to_vec()).collect();
    // A successor's opening marker flushes the final block out of the framer
    stream.extend_from_slice(&SYNC_MARKER.to_le_bytes());
    stream
}

#[test]
fn announcement_essence_and_null_drive_the_receiver() {
    let announcement = ProgramAnnouncement::new(
        0,
        vec![StreamDescriptor::video(2, "h264", 1920, 1080, 25.0)],
    )
    .into_block()
    .unwrap();
    let essence = Block::essence(0, 2, StreamType::Video, 0, Bytes::from_static(&[0x00, 0x01]));
    let null = Block::null();

    let stream = wire_stream(&[announcement, essence, null]);

    let mut framer = BlockFramer::default();
    let mut dispatcher = Dispatcher::new(RecordingSink::default(), RecordingRenderer::default());

    // Datagram boundaries are meaningless to the framer; feed awkwardly
    for piece in stream.chunks(13) {
        for block in framer.feed(piece) {
            dispatcher.dispatch(block);
        }
    }

    let binding = dispatcher.binding(0).expect("program 0 bound");
    assert_eq!(binding.video_stream_index, Some(2));
    assert_eq!(binding.audio_stream_index, None);

    let (sink, _) = dispatcher.collaborators();
    assert_eq!(sink.decoders_opened, vec![(0, 2, "h264".to_string())]);
    assert_eq!(sink.essence, vec![(0, 2, vec![0x00, 0x01])]);

    // The null block had no observable effect
    let stats = dispatcher.stats();
    assert_eq!(stats.essence_forwarded, 1);
    assert_eq!(stats.essence_dropped, 0);
}

#[test]
fn overlay_actions_travel_the_same_path() {
    let placement = Placement {
        x_pct: 10.0,
        y_pct: 20.0,
        width_pct: 15.0,
        height_pct: 10.0,
    };
    let add = ActionBatch::new(vec![OverlayAction::add(1001, "image/png", &[0xab, 0xcd], placement)])
        .into_block()
        .unwrap();
    let remove_wrong = ActionBatch::new(vec![OverlayAction::remove(7)])
        .into_block()
        .unwrap();
    let remove_right = ActionBatch::new(vec![OverlayAction::remove(1001)])
        .into_block()
        .unwrap();

    let stream = wire_stream(&[add, remove_wrong, remove_right]);

    let mut framer = BlockFramer::default();
    let mut dispatcher = Dispatcher::new(RecordingSink::default(), RecordingRenderer::default());
    for block in framer.feed(&stream) {
        dispatcher.dispatch(block);
    }

    assert_eq!(dispatcher.active_overlay(), None);
    let (_, renderer) = dispatcher.collaborators();
    assert_eq!(renderer.shown, vec![1001]);
    assert_eq!(renderer.cleared, vec![1001]);
}

#[test]
fn renewed_announcements_do_not_rebind() {
    let first = ProgramAnnouncement::new(
        0,
        vec![StreamDescriptor::video(2, "h264", 1280, 720, 25.0)],
    )
    .into_block()
    .unwrap();
    let second = ProgramAnnouncement::new(
        0,
        vec![StreamDescriptor::video(4, "hevc", 3840, 2160, 50.0)],
    )
    .into_block()
    .unwrap();

    let stream = wire_stream(&[first, second]);

    let mut framer = BlockFramer::default();
    let mut dispatcher = Dispatcher::new(RecordingSink::default(), RecordingRenderer::default());
    for block in framer.feed(&stream) {
        dispatcher.dispatch(block);
    }

    assert_eq!(dispatcher.binding(0).unwrap().video_stream_index, Some(2));
    let (sink, _) = dispatcher.collaborators();
    assert_eq!(sink.decoders_opened.len(), 1);
}
