//! Blocking hand-off queue between producers and the muxer
//!
//! Unbounded multi-producer / single-consumer. Producers never block; the
//! consumer blocks in `pop` until a block arrives. Ownership of a block
//! moves into the queue on push and out on pop, exactly once per hop.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::protocol::Block;

/// Cloneable producer side of the transfer queue
#[derive(Clone)]
pub struct BlockSender {
    tx: Sender<Block>,
}

impl BlockSender {
    /// Push a block; always succeeds and wakes the consumer
    pub fn push(&self, block: Block) {
        // The consumer never closes the receiving side while producers are
        // alive; a failed send can only mean shutdown, where the block is
        // dropped with the rest of the pipeline.
        let _ = self.tx.send(block);
    }
}

/// Consumer side of the transfer queue
pub struct TransferQueue {
    rx: Receiver<Block>,
}

impl TransferQueue {
    /// Create a queue, returning the producer handle and the consumer
    pub fn new() -> (BlockSender, TransferQueue) {
        let (tx, rx) = unbounded();
        (BlockSender { tx }, TransferQueue { rx })
    }

    /// Block until the next element arrives, in global FIFO arrival order
    ///
    /// Returns `None` once every producer handle has been dropped and the
    /// queue is drained.
    pub fn pop(&self) -> Option<Block> {
        self.rx.recv().ok()
    }

    /// Advisory emptiness check
    ///
    /// May be stale immediately after it returns under concurrent pushes;
    /// usable only as a non-blocking scheduling hint, never for
    /// synchronization.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Current queue depth (advisory, like `is_empty`)
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}
