//! Essence Receiver Application
//!
//! Joins the stream (multicast group or unicast port), recovers blocks
//! from the datagram flow and drives the dispatcher with logging
//! collaborators. Real deployments plug a decoder and a renderer in where
//! this binary only logs what it would hand them.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use std::net::IpAddr;
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use essence_streamer::{
    network::{ReaderConfig, UdpReader},
    protocol::{Placement, StreamDescriptor, StreamType},
    receiver::{Dispatcher, MediaSink, OverlayRenderer},
};

/// Logs decoder-open signals and essence hand-offs
#[derive(Default)]
struct LoggingSink;

impl MediaSink for LoggingSink {
    fn open_video_decoder(&mut self, program: u8, stream: u8, descriptor: &StreamDescriptor) {
        tracing::info!(
            program,
            stream,
            codec = %descriptor.codec,
            width = ?descriptor.width,
            height = ?descriptor.height,
            "would open video decoder"
        );
    }

    fn on_essence(
        &mut self,
        program: u8,
        stream: u8,
        stream_type: StreamType,
        timestamp: u64,
        payload: Bytes,
    ) {
        tracing::debug!(
            program,
            stream,
            ?stream_type,
            timestamp,
            bytes = payload.len(),
            "essence packet"
        );
    }
}

/// Logs overlay placement and removal
#[derive(Default)]
struct LoggingRenderer;

impl OverlayRenderer for LoggingRenderer {
    fn show(&mut self, id: u64, mime: &str, image: &[u8], placement: Placement) {
        tracing::info!(
            id,
            mime,
            bytes = image.len(),
            x = placement.x_pct,
            y = placement.y_pct,
            "overlay shown"
        );
    }

    fn clear(&mut self, id: u64) {
        tracing::info!(id, "overlay cleared");
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        bail!("Usage: {} <group_ip> <port>", args[0]);
    }

    let group: IpAddr = args[1].parse().context("invalid group address")?;
    let port: u16 = args[2].parse().context("invalid port")?;

    tracing::info!(%group, port, "starting essence receiver");

    let mut dispatcher = Dispatcher::new(LoggingSink, LoggingRenderer);
    let mut reader = UdpReader::new(ReaderConfig::new(group, port));
    reader.start(move |block| dispatcher.dispatch(block))?;

    tracing::info!("waiting for blocks...");

    loop {
        thread::sleep(Duration::from_secs(5));
        let stats = reader.stats();
        tracing::info!(
            datagrams = stats.datagrams_received.load(std::sync::atomic::Ordering::Relaxed),
            bytes = stats.bytes_received.load(std::sync::atomic::Ordering::Relaxed),
            blocks = stats.blocks_recovered.load(std::sync::atomic::Ordering::Relaxed),
            "receiver stats"
        );
    }
}
