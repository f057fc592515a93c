//! Read-ahead on a background thread.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use crate::queue::{AsyncOptions, BlockQueue};
use crate::stream::Readable;

/// A reader that pulls from the inner stream on a worker thread.
///
/// The worker fills blocks of `block_size` bytes and queues up to
/// `max_blocks` of them ahead of the consumer. A partial block is queued
/// early when the consumer has nothing to read. The worker exits on the
/// first read that returns 0 or fails; a failure is reported by `read` once,
/// after every queued byte has been delivered.
///
/// The worker starts on the first `read` ([`AsyncReader::new`]) or
/// immediately ([`AsyncReader::spawn`]). Dropping the reader stops and joins
/// the worker, discarding unread blocks.
///
/// # Example
///
/// ```
/// use teas_iostream::{AsyncOptions, AsyncReader, MemoryBlock, Readable};
///
/// let source = MemoryBlock::new(vec![9u8; 5000].into_boxed_slice());
/// let mut reader = AsyncReader::new(source, AsyncOptions::default()).unwrap();
///
/// let mut total = 0;
/// let mut buf = [0u8; 1000];
/// loop {
///     let n = reader.read(&mut buf).unwrap();
///     if n == 0 {
///         break;
///     }
///     total += n;
/// }
/// assert_eq!(total, 5000);
/// ```
pub struct AsyncReader<S: Readable + Send + 'static> {
    queue: Arc<BlockQueue>,
    stream: Option<S>,
    worker: Option<JoinHandle<S>>,
    block_size: usize,
}

impl<S: Readable + Send + 'static> AsyncReader<S> {
    /// Wraps `stream`; the worker starts on the first read.
    pub fn new(stream: S, opts: AsyncOptions) -> Result<Self> {
        opts.validate()?;
        Ok(AsyncReader {
            queue: Arc::new(BlockQueue::new(opts.max_blocks)),
            stream: Some(stream),
            worker: None,
            block_size: opts.block_size,
        })
    }

    /// Wraps `stream` and starts the worker right away.
    pub fn spawn(stream: S, opts: AsyncOptions) -> Result<Self> {
        let mut reader = Self::new(stream, opts)?;
        reader.start()?;
        Ok(reader)
    }

    /// Starts the worker if it has not run yet.
    pub fn start(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        self.queue.lock().running = true;

        let queue = Arc::clone(&self.queue);
        let block_size = self.block_size;
        let spawned = thread::Builder::new()
            .name("iostream-async-reader".into())
            .spawn(move || read_worker(stream, queue, block_size));
        match spawned {
            Ok(handle) => {
                debug!("async reader started (block_size={})", block_size);
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut state = self.queue.lock();
                state.running = false;
                state.finished = true;
                Err(Error::Io(e))
            }
        }
    }

    /// Returns true once the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.queue.lock().finished
    }

    /// Number of blocks waiting to be consumed.
    pub fn queued_blocks(&self) -> usize {
        self.queue.len()
    }

    /// Stops the worker and returns the inner stream.
    ///
    /// Data already read ahead is lost.
    pub fn into_inner(mut self) -> Result<S> {
        if let Some(stream) = self.stream.take() {
            return Ok(stream);
        }
        self.queue.stop();
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Err(Error::WorkerPanicked),
        }
    }
}

impl<S: Readable + Send + 'static> Readable for AsyncReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.start()?;
        if buf.is_empty() {
            return Ok(0);
        }

        let mut state = self.queue.lock();
        while state.running && state.blocks.is_empty() {
            self.queue.wait(&mut state);
        }

        let mut total = 0;
        while total < buf.len() {
            let Some(front) = state.blocks.front_mut() else {
                break;
            };
            total += front.read(&mut buf[total..])?;
            if front.eof() {
                state.blocks.pop_front();
                self.queue.notify();
            }
        }

        if total == 0 {
            if let Some(err) = state.error.take() {
                return Err(err);
            }
        }
        Ok(total)
    }
}

impl<S: Readable + Send + 'static> Drop for AsyncReader<S> {
    fn drop(&mut self) {
        self.queue.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("async reader worker panicked");
            }
        }
    }
}

fn read_worker<S: Readable>(mut stream: S, queue: Arc<BlockQueue>, block_size: usize) -> S {
    let mut current = MemoryBlock::with_capacity(block_size);
    loop {
        let queued = {
            let mut state = queue.lock();
            while state.running && queue.is_full(&state) {
                queue.wait(&mut state);
            }
            if !state.running {
                debug!("async reader stopped by consumer");
                break;
            }
            state.blocks.len()
        };

        let (n, err) = match current.fill_from(&mut stream) {
            Ok(n) => (n, None),
            Err(e) => {
                warn!("async reader: read failed: {}", e);
                (0, Some(e))
            }
        };

        let full = current.size() == current.capacity();
        if current.size() > 0 && (full || queued == 0 || n == 0) {
            let block = mem::replace(&mut current, MemoryBlock::with_capacity(block_size));
            let mut state = queue.lock();
            state.blocks.push_back(block);
            queue.notify();
        }

        if n == 0 {
            let mut state = queue.lock();
            state.error = err;
            debug!("async reader reached end of input");
            break;
        }
    }

    let mut state = queue.lock();
    state.running = false;
    state.finished = true;
    queue.notify();
    drop(state);
    stream
}
