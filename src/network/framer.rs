//! Resynchronizing block framer
//!
//! Rebuilds block boundaries from an unstructured byte stream. Datagram
//! boundaries carry no meaning: bytes are accumulated one at a time, and
//! whenever the trailing four bytes spell the sync marker, everything before
//! them is taken as one complete block (whose own marker sits at its start,
//! by construction of the wire format). Bytes that fail to parse are
//! discarded at that point, which is how the framer recovers after joining
//! a stream mid-block or after datagram loss.
//!
//! Known limitation, kept for wire compatibility: a payload that happens to
//! contain the four marker bytes is misframed at that spot. Both halves then
//! fail to parse and are dropped, and the framer recovers at the next real
//! boundary.

use crate::constants::MAX_ACCUMULATED_BYTES;
use crate::protocol::{Block, HEADER_SIZE, SYNC_MARKER};

/// Framer statistics
#[derive(Debug, Clone, Default)]
pub struct FramerStats {
    pub blocks_recovered: u64,
    pub bytes_discarded: u64,
    pub overflows: u64,
}

/// Accumulating sync-marker scanner
pub struct BlockFramer {
    accumulator: Vec<u8>,
    max_accumulated: usize,
    stats: FramerStats,
}

impl Default for BlockFramer {
    fn default() -> Self {
        Self::new(MAX_ACCUMULATED_BYTES)
    }
}

impl BlockFramer {
    /// Create a framer with the given accumulator ceiling
    pub fn new(max_accumulated: usize) -> Self {
        Self {
            accumulator: Vec::new(),
            max_accumulated,
            stats: FramerStats::default(),
        }
    }

    /// Feed received bytes, returning every block completed by them
    ///
    /// Blocks come back in stream order. A block is only recovered once the
    /// sync marker of its successor arrives, so the final block of a stream
    /// stays pending until more traffic (filler included) follows it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Block> {
        let mut recovered = Vec::new();

        for &byte in bytes {
            self.accumulator.push(byte);
            let len = self.accumulator.len();

            if len >= 4 && self.trailing_marker() && len >= HEADER_SIZE {
                let candidate = &self.accumulator[..len - 4];
                match Block::parse(candidate) {
                    Ok(block) => {
                        self.stats.blocks_recovered += 1;
                        recovered.push(block);
                    }
                    Err(e) => {
                        self.stats.bytes_discarded += candidate.len() as u64;
                        tracing::trace!(error = %e, dropped = candidate.len(), "resync discarded bytes");
                    }
                }
                // Keep only the marker that opens the next block
                self.accumulator.drain(..len - 4);
            }

            if self.accumulator.len() > self.max_accumulated {
                self.stats.bytes_discarded += self.accumulator.len() as u64;
                self.stats.overflows += 1;
                tracing::warn!(
                    dropped = self.accumulator.len(),
                    "accumulator overflow, dropping data"
                );
                self.accumulator.clear();
            }
        }

        recovered
    }

    fn trailing_marker(&self) -> bool {
        let len = self.accumulator.len();
        let tail = [
            self.accumulator[len - 4],
            self.accumulator[len - 3],
            self.accumulator[len - 2],
            self.accumulator[len - 1],
        ];
        u32::from_le_bytes(tail) == SYNC_MARKER
    }

    /// Bytes currently waiting for a boundary
    pub fn accumulated_len(&self) -> usize {
        self.accumulator.len()
    }

    pub fn stats(&self) -> FramerStats {
        self.stats.clone()
    }
}
