//! Chunked, retrying UDP datagram writer
//!
//! A serialized block can be far larger than a datagram, so the writer
//! splits it into chunks kept under common path MTU and sends each one
//! individually. A would-block condition is retried on the same chunk after
//! a short sleep; nothing is skipped or reordered. Every `yield_every_chunks`
//! sends the writer pauses briefly regardless, so a sustained burst does not
//! monopolize the socket buffer.

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::constants::CHUNK_SIZE;
use crate::error::TransportError;
use crate::network::BlockWriter;

/// Writer tuning knobs
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Bytes per datagram, kept under common path MTU
    pub chunk_size: usize,
    /// Kernel send buffer size requested at open
    pub send_buffer_bytes: usize,
    /// Sleep between retries of a blocked chunk
    pub retry_sleep: Duration,
    /// Unconditional brief pause after this many chunks
    pub yield_every_chunks: u32,
    /// Give up on a chunk after this many retries; `None` retries forever,
    /// preferring a stall over dropped media on a saturated link
    pub max_retries_per_chunk: Option<u32>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            send_buffer_bytes: 1024 * 1024,
            retry_sleep: Duration::from_millis(1),
            yield_every_chunks: 50,
            max_retries_per_chunk: None,
        }
    }
}

/// Writer statistics
#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub retries: u64,
}

/// UDP writer targeting a fixed destination
pub struct UdpWriter {
    dest: SocketAddr,
    config: WriterConfig,
    socket: Option<UdpSocket>,
    stats: WriterStats,
}

impl UdpWriter {
    pub fn new(dest: SocketAddr, config: WriterConfig) -> Self {
        Self {
            dest,
            config,
            socket: None,
            stats: WriterStats::default(),
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.stats.clone()
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<usize, TransportError> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        let mut retries: u32 = 0;

        loop {
            match socket.send_to(chunk, self.dest) {
                Ok(sent) => return Ok(sent),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    retries += 1;
                    self.stats.retries += 1;
                    if let Some(max) = self.config.max_retries_per_chunk {
                        if retries > max {
                            return Err(TransportError::Saturated { retries });
                        }
                    }
                    thread::sleep(self.config.retry_sleep);
                }
                Err(e) => return Err(TransportError::Send(e.to_string())),
            }
        }
    }
}

impl BlockWriter for UdpWriter {
    /// Bind and configure the outbound socket: non-blocking, reusable
    /// address, enlarged send buffer
    fn open(&mut self) -> Result<(), TransportError> {
        let domain = if self.dest.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::Setup(format!("socket create: {}", e)))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::Setup(format!("SO_REUSEADDR: {}", e)))?;
        socket
            .set_send_buffer_size(self.config.send_buffer_bytes)
            .map_err(|e| TransportError::Setup(format!("SO_SNDBUF: {}", e)))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::Setup(format!("nonblocking: {}", e)))?;

        self.socket = Some(socket.into());
        tracing::info!(dest = %self.dest, "UDP writer open");
        Ok(())
    }

    /// Send the whole buffer as consecutive chunks, in order, without loss
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let chunk_size = self.config.chunk_size;
        let mut sent_total = 0usize;
        let mut chunks: u32 = 0;

        for chunk in bytes.chunks(chunk_size) {
            sent_total += self.send_chunk(chunk)?;
            self.stats.chunks_sent += 1;
            self.stats.bytes_sent += chunk.len() as u64;

            // A full send buffer does not always surface as WouldBlock for
            // UDP; pausing periodically keeps large blocks deliverable.
            chunks += 1;
            if chunks % self.config.yield_every_chunks == 0 {
                thread::sleep(self.config.retry_sleep);
            }
        }

        Ok(sent_total)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!(dest = %self.dest, "UDP writer closed");
        }
    }
}
