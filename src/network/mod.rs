//! Network subsystem for UDP block transport

pub mod framer;
pub mod reader;
pub mod writer;

pub use framer::BlockFramer;
pub use reader::{ReaderConfig, ReaderStats, UdpReader};
pub use writer::{UdpWriter, WriterConfig};

use crate::error::TransportError;

/// Destination for serialized blocks
///
/// The muxer drives whichever writer it is handed; tests substitute an
/// in-memory implementation. Known transports are fixed, so the trait stays
/// minimal rather than growing plugin machinery.
pub trait BlockWriter {
    fn open(&mut self) -> Result<(), TransportError>;
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;
    fn close(&mut self);
}
