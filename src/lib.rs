//! # Essence Streamer
//!
//! Constant-bitrate multiplexed media streaming over UDP with an embedded
//! control channel for program announcements and on-screen overlay actions.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              SENDER                                  │
//! │  ┌───────────────┐  ┌───────────────┐  ┌─────────────────────────┐  │
//! │  │  Producer 0   │  │  Producer 1   │  │    Overlay Producer     │  │
//! │  │  (program 0)  │  │  (program 1)  │  │ (manipulation actions)  │  │
//! │  └───────┬───────┘  └───────┬───────┘  └────────────┬────────────┘  │
//! │          │ announcement     │ essence               │ actions       │
//! │          ▼ + essence blocks ▼ blocks                ▼ (JSON+base64) │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │             Transfer Queue (queue::TransferQueue)           │    │
//! │  │       blocking, unbounded, multi-producer / one consumer    │    │
//! │  └──────────────────────────────┬──────────────────────────────┘    │
//! │                                 ▼                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │               Muxer (mux::Muxer) - single thread            │    │
//! │  │    stamps 90 kHz timestamps, paces to the target bitrate    │    │
//! │  │    with null filler, periodically renews announcements      │    │
//! │  └──────────────────────────────┬──────────────────────────────┘    │
//! │                                 ▼                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │        UDP Writer (network::UdpWriter) - 1 KiB chunks       │    │
//! │  └──────────────────────────────┬──────────────────────────────┘    │
//! └─────────────────────────────────┼───────────────────────────────────┘
//!                                   │ UDP (unicast or multicast)
//! ┌─────────────────────────────────┼───────────────────────────────────┐
//! │                              RECEIVER                               │
//! │  ┌──────────────────────────────▼──────────────────────────────┐    │
//! │  │       UDP Reader (network::UdpReader) - reader thread       │    │
//! │  │    recovers block boundaries from the raw byte stream by    │    │
//! │  │    sync-marker scanning (network::BlockFramer)              │    │
//! │  └──────────────────────────────┬──────────────────────────────┘    │
//! │                                 ▼ recovered blocks                  │
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │              Dispatcher (receiver::Dispatcher)              │    │
//! │  │    program binding / overlay slot state machines; essence   │    │
//! │  │    payloads are handed to the MediaSink / OverlayRenderer   │    │
//! │  │    collaborators (decoding and rendering live outside)      │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loss is tolerated silently: the wire format is self-describing and the
//! reader resynchronizes on the next sync marker after any gap.

pub mod error;
pub mod mux;
pub mod network;
pub mod producer;
pub mod protocol;
pub mod queue;
pub mod receiver;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default target bitrate in bits per second
    pub const DEFAULT_BITRATE_BPS: u64 = 8_000_000;

    /// Default UDP port for block streaming
    pub const DEFAULT_UDP_PORT: u16 = 5000;

    /// Payload size of a null (filler) block
    pub const NULL_PAYLOAD_SIZE: usize = 2 * 1024;

    /// Datagram chunk size for the writer, kept under common path MTU
    pub const CHUNK_SIZE: usize = 1024;

    /// Receive buffer for a single datagram (typical UDP packet size)
    pub const DATAGRAM_BUFFER_SIZE: usize = 1500;

    /// Ceiling for the reader's resync accumulator
    pub const MAX_ACCUMULATED_BYTES: usize = 4 * 1024 * 1024;

    /// Bitrate measurement window in milliseconds
    pub const BITRATE_WINDOW_MS: u64 = 100;

    /// Announcement re-emission period in milliseconds
    pub const ANNOUNCE_PERIOD_MS: u64 = 50;
}
