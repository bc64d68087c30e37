//! UDP reader thread feeding the resynchronizing framer
//!
//! Binds a port (joining the destination group when it is multicast),
//! receives datagrams on a dedicated thread and pushes every recovered
//! block into the supplied handler. No receive-path error may stop the
//! thread; malformed traffic is shed by the framer and socket hiccups are
//! logged and retried.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::constants::{DATAGRAM_BUFFER_SIZE, MAX_ACCUMULATED_BYTES};
use crate::error::TransportError;
use crate::network::framer::BlockFramer;
use crate::protocol::Block;

/// Reader tuning knobs
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Port to bind
    pub port: u16,
    /// Sender address; joined as a group when multicast
    pub group: IpAddr,
    /// Receive timeout, bounding how long a stop request can go unnoticed
    pub recv_timeout: Duration,
    /// Accumulator ceiling handed to the framer
    pub max_accumulated: usize,
}

impl ReaderConfig {
    pub fn new(group: IpAddr, port: u16) -> Self {
        Self {
            port,
            group,
            recv_timeout: Duration::from_millis(50),
            max_accumulated: MAX_ACCUMULATED_BYTES,
        }
    }
}

/// Reader statistics, updated by the reader thread
#[derive(Debug, Default)]
pub struct ReaderStats {
    pub datagrams_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub blocks_recovered: AtomicU64,
}

/// Receiving endpoint: socket plus reader thread
pub struct UdpReader {
    config: ReaderConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
    thread_handle: Option<JoinHandle<()>>,
}

impl UdpReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ReaderStats::default()),
            thread_handle: None,
        }
    }

    /// Bind the socket and spawn the reader thread
    ///
    /// Every recovered block is passed to `on_block` on the reader thread.
    pub fn start<F>(&mut self, mut on_block: F) -> Result<(), TransportError>
    where
        F: FnMut(Block) + Send + 'static,
    {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let socket = self.open_socket()?;
        let running = self.running.clone();
        let stats = self.stats.clone();
        let max_accumulated = self.config.max_accumulated;

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name(format!("udp-reader-{}", self.config.port))
            .spawn(move || {
                let mut framer = BlockFramer::new(max_accumulated);
                let mut buffer = [0u8; DATAGRAM_BUFFER_SIZE];

                while running.load(Ordering::SeqCst) {
                    let received = match socket.recv(&mut buffer) {
                        Ok(n) => n,
                        Err(e)
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "recv failed, continuing");
                            continue;
                        }
                    };

                    stats.datagrams_received.fetch_add(1, Ordering::Relaxed);
                    stats.bytes_received.fetch_add(received as u64, Ordering::Relaxed);

                    for block in framer.feed(&buffer[..received]) {
                        stats.blocks_recovered.fetch_add(1, Ordering::Relaxed);
                        on_block(block);
                    }
                }
            })
            .map_err(|e| TransportError::Setup(format!("reader thread: {}", e)))?;

        self.thread_handle = Some(handle);
        tracing::info!(port = self.config.port, group = %self.config.group, "UDP reader started");
        Ok(())
    }

    /// Request the reader thread to stop and wait for it
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            tracing::info!(port = self.config.port, "UDP reader stopped");
        }
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    fn open_socket(&self) -> Result<UdpSocket, TransportError> {
        let domain = match self.config.group {
            IpAddr::V4(_) => Domain::IPV4,
            IpAddr::V6(_) => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::Setup(format!("socket create: {}", e)))?;
        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::Setup(format!("SO_REUSEADDR: {}", e)))?;

        let bind_addr: SocketAddr = match self.config.group {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.config.port),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), self.config.port),
        };
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::Setup(format!("bind {}: {}", bind_addr, e)))?;

        match self.config.group {
            IpAddr::V4(group) if group.is_multicast() => {
                socket
                    .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
                    .map_err(|e| TransportError::Setup(format!("join {}: {}", group, e)))?;
            }
            IpAddr::V6(group) if group.is_multicast() => {
                socket
                    .join_multicast_v6(&group, 0)
                    .map_err(|e| TransportError::Setup(format!("join {}: {}", group, e)))?;
            }
            _ => {}
        }

        socket
            .set_read_timeout(Some(self.config.recv_timeout))
            .map_err(|e| TransportError::Setup(format!("SO_RCVTIMEO: {}", e)))?;

        Ok(socket.into())
    }
}

impl Drop for UdpReader {
    fn drop(&mut self) {
        self.stop();
    }
}
