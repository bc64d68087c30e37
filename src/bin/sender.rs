//! Essence Sender Application
//!
//! Streams two synthetic programs plus a demo overlay channel to a
//! receiver at a constant bitrate. The synthetic source stands in for a
//! real demuxer collaborator; it emits a patterned video and audio packet
//! cadence forever, so the process runs until interrupted.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use essence_streamer::{
    mux::{Muxer, MuxerConfig},
    network::{BlockWriter, UdpWriter, WriterConfig},
    producer::{run_overlay_producer, run_producer, EssencePacket, EssenceSource},
    protocol::{Placement, StreamDescriptor, StreamType},
    queue::TransferQueue,
};

/// Stand-in for an external demuxer: paced, patterned packets forever
struct SyntheticSource {
    label: String,
    frame_interval: Duration,
    counter: u64,
}

impl SyntheticSource {
    fn new(label: String) -> Self {
        Self {
            label,
            frame_interval: Duration::from_millis(40), // 25 fps
            counter: 0,
        }
    }
}

impl EssenceSource for SyntheticSource {
    fn describe(&mut self) -> Vec<StreamDescriptor> {
        tracing::info!(source = %self.label, "describing synthetic streams");
        vec![
            StreamDescriptor::video(0, "h264", 1280, 720, 25.0).with_bit_rate(4_000_000),
            StreamDescriptor::audio(1, "aac", 48000, 2).with_bit_rate(128_000),
        ]
    }

    fn next_packet(&mut self) -> Option<EssencePacket> {
        thread::sleep(self.frame_interval);
        self.counter += 1;

        // Every fourth packet is audio, the rest video
        let (stream_index, stream_type, size) = if self.counter % 4 == 0 {
            (1, StreamType::Audio, 256)
        } else {
            (0, StreamType::Video, 1300)
        };

        let payload: Vec<u8> = (0..size).map(|i| (self.counter as usize + i) as u8).collect();
        Some(EssencePacket {
            stream_index,
            stream_type,
            timestamp: self.counter * 3600, // 40 ms in 90 kHz ticks
            data: Bytes::from(payload),
        })
    }
}

/// Demo overlay image payload; opaque to the protocol
const DEMO_OVERLAY: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D',
    b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01,
];

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        bail!("Usage: {} <source> <dest_ip> <dest_port> <bitrate>", args[0]);
    }

    let source_label = args[1].clone();
    let dest: SocketAddr = format!("{}:{}", args[2], args[3])
        .parse()
        .context("invalid destination address")?;
    let bitrate_bps: u64 = args[4].parse().context("invalid bitrate")?;

    tracing::info!(source = %source_label, %dest, bitrate_bps, "starting essence sender");

    let (block_tx, queue) = TransferQueue::new();
    let stop = Arc::new(AtomicBool::new(false));

    // One producer thread per program
    let mut producer_handles = Vec::new();
    for program_index in 0..2u8 {
        let tx = block_tx.clone();
        let stop = stop.clone();
        let label = source_label.clone();
        let handle = thread::Builder::new()
            .name(format!("producer-{}", program_index))
            .spawn(move || {
                let mut source = SyntheticSource::new(label);
                if let Err(e) = run_producer(program_index, &mut source, &tx, &stop) {
                    tracing::error!(program = program_index, error = %e, "producer failed");
                }
            })?;
        producer_handles.push(handle);
    }

    // Overlay control channel
    let overlay_handle = {
        let tx = block_tx.clone();
        let stop = stop.clone();
        thread::Builder::new().name("overlay-producer".into()).spawn(move || {
            let placement = Placement {
                x_pct: 10.0,
                y_pct: 20.0,
                width_pct: 15.0,
                height_pct: 10.0,
            };
            if let Err(e) = run_overlay_producer(
                &tx,
                Duration::from_secs(5),
                "image/png",
                DEMO_OVERLAY,
                placement,
                &stop,
            ) {
                tracing::error!(error = %e, "overlay producer failed");
            }
        })?
    };

    // Muxer thread owns the writer and is the sole queue consumer
    let muxer_handle = {
        let stop = stop.clone();
        thread::Builder::new().name("muxer".into()).spawn(move || {
            let mut writer = UdpWriter::new(dest, WriterConfig::default());
            let mut muxer = Muxer::new(MuxerConfig {
                bitrate_bps,
                ..Default::default()
            });
            if let Err(e) = muxer.run(&queue, &mut writer, &stop) {
                tracing::error!(error = %e, "muxer failed");
                writer.close();
            }
            let stats = muxer.stats();
            tracing::info!(
                blocks = stats.blocks_sent,
                bytes = stats.bytes_sent,
                filler = stats.filler_blocks,
                "muxer exited"
            );
        })?
    };

    drop(block_tx);

    for handle in producer_handles {
        let _ = handle.join();
    }
    let _ = overlay_handle.join();
    let _ = muxer_handle.join();

    Ok(())
}
