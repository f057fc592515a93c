//! Bounded block queue shared between an async adapter and its worker.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;

/// Options for [`AsyncReader`](crate::AsyncReader) and
/// [`AsyncWriter`](crate::AsyncWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncOptions {
    /// Size of each queued block in bytes.
    pub block_size: usize,
    /// Maximum number of queued blocks.
    pub max_blocks: usize,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            block_size: 2048,
            max_blocks: 16,
        }
    }
}

impl AsyncOptions {
    /// Sets the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the queue bound.
    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    /// Checks that both sizes are non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }
        if self.max_blocks == 0 {
            return Err(Error::InvalidConfig("max_blocks must be > 0".into()));
        }
        Ok(())
    }
}

pub(crate) struct QueueState {
    pub blocks: VecDeque<MemoryBlock>,
    /// Cleared to ask the worker to stop, or by the worker when it gives up.
    pub running: bool,
    /// Set once by the worker when it has exited. Terminal.
    pub finished: bool,
    /// The writer worker holds a popped block it has not finished writing.
    pub in_flight: bool,
    /// The writer worker should flush its stream once the queue is drained.
    pub flush_requested: bool,
    /// The writer worker stopped because of a failed write.
    pub failed: bool,
    /// First error raised by the worker, handed to the consumer once.
    pub error: Option<Error>,
}

/// A queue of at most `max_blocks` blocks guarded by one mutex, with one
/// condition variable for every state change.
pub(crate) struct BlockQueue {
    state: Mutex<QueueState>,
    changed: Condvar,
    max_blocks: usize,
}

impl BlockQueue {
    pub fn new(max_blocks: usize) -> Self {
        BlockQueue {
            state: Mutex::new(QueueState {
                blocks: VecDeque::with_capacity(max_blocks),
                running: false,
                finished: false,
                in_flight: false,
                flush_requested: false,
                failed: false,
                error: None,
            }),
            changed: Condvar::new(),
            max_blocks,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    pub fn wait(&self, state: &mut MutexGuard<'_, QueueState>) {
        self.changed.wait(state);
    }

    pub fn notify(&self) {
        self.changed.notify_all();
    }

    pub fn is_full(&self, state: &QueueState) -> bool {
        state.blocks.len() >= self.max_blocks
    }

    /// Blocks while the queue is full and the worker is running, then
    /// appends `block`. Returns false if the queue stopped instead.
    pub fn push(&self, block: MemoryBlock) -> bool {
        let mut state = self.lock();
        while state.running && self.is_full(&state) {
            self.wait(&mut state);
        }
        if !state.running {
            return false;
        }
        state.blocks.push_back(block);
        self.notify();
        true
    }

    /// Clears `running` and wakes every waiter.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.running = false;
        self.notify();
    }

    /// Number of queued blocks.
    pub fn len(&self) -> usize {
        self.lock().blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_options_validate() {
        assert!(AsyncOptions::default().validate().is_ok());
        assert!(AsyncOptions::default().with_block_size(0).validate().is_err());
        assert!(AsyncOptions::default().with_max_blocks(0).validate().is_err());
    }

    #[test]
    fn test_options_serde_defaults() {
        let opts: AsyncOptions = serde_json::from_str(r#"{"max_blocks": 4}"#).unwrap();
        assert_eq!(opts, AsyncOptions::default().with_max_blocks(4));
        let text = serde_json::to_string(&opts).unwrap();
        assert!(text.contains("\"block_size\":2048"));
    }

    #[test]
    fn test_push_requires_running() {
        let queue = BlockQueue::new(2);
        assert!(!queue.push(MemoryBlock::with_capacity(1)));
        queue.lock().running = true;
        assert!(queue.push(MemoryBlock::with_capacity(1)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_push_blocks_when_full() {
        let queue = Arc::new(BlockQueue::new(1));
        queue.lock().running = true;
        assert!(queue.push(MemoryBlock::with_capacity(1)));

        let q = Arc::clone(&queue);
        let pusher = thread::spawn(move || q.push(MemoryBlock::with_capacity(1)));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);

        {
            let mut state = queue.lock();
            state.blocks.pop_front();
            queue.notify();
        }
        assert!(pusher.join().unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_stop_releases_pusher() {
        let queue = Arc::new(BlockQueue::new(1));
        queue.lock().running = true;
        assert!(queue.push(MemoryBlock::with_capacity(1)));

        let q = Arc::clone(&queue);
        let pusher = thread::spawn(move || q.push(MemoryBlock::with_capacity(1)));

        thread::sleep(Duration::from_millis(50));
        queue.stop();
        assert!(!pusher.join().unwrap());
    }
}
