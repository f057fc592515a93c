//! Write-behind on a background thread.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::MutexGuard;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use crate::queue::{AsyncOptions, BlockQueue};
use crate::stream::Writable;
use crate::util::write_fully;

/// A writer that pushes into the inner stream on a worker thread.
///
/// Writes are copied into a private block of `block_size` bytes; each full
/// block is queued for the worker. `write` blocks while `max_blocks` blocks
/// are queued. [`flush`](Writable::flush) queues the partial block, waits
/// until the worker has written everything and then flushes the inner
/// stream from the worker.
///
/// A short or failed write in the worker stops it for good; later `write`
/// and `flush` calls fail with [`Error::WriterStopped`], except that the
/// first `flush` afterwards reports the underlying error if there was one.
///
/// Dropping the writer flushes, stops and joins the worker.
///
/// # Example
///
/// ```
/// use teas_iostream::{AsyncOptions, AsyncWriter, GrowableBuffer, Writable};
///
/// let mut writer = AsyncWriter::new(GrowableBuffer::with_capacity(100), AsyncOptions::default()).unwrap();
/// writer.write(b"queued").unwrap();
/// writer.flush().unwrap();
///
/// let sink = writer.into_inner().unwrap();
/// assert_eq!(sink.data(), b"queued");
/// ```
pub struct AsyncWriter<S: Writable + Send + 'static> {
    queue: Arc<BlockQueue>,
    stream: Option<S>,
    worker: Option<JoinHandle<S>>,
    current: MemoryBlock,
    block_size: usize,
}

impl<S: Writable + Send + 'static> AsyncWriter<S> {
    /// Wraps `stream`; the worker starts with the first queued block.
    pub fn new(stream: S, opts: AsyncOptions) -> Result<Self> {
        opts.validate()?;
        Ok(AsyncWriter {
            queue: Arc::new(BlockQueue::new(opts.max_blocks)),
            stream: Some(stream),
            worker: None,
            current: MemoryBlock::with_capacity(opts.block_size),
            block_size: opts.block_size,
        })
    }

    /// Wraps `stream` and starts the worker right away.
    pub fn spawn(stream: S, opts: AsyncOptions) -> Result<Self> {
        let mut writer = Self::new(stream, opts)?;
        writer.start()?;
        Ok(writer)
    }

    /// Starts the worker if it has not run yet.
    pub fn start(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        self.queue.lock().running = true;

        let queue = Arc::clone(&self.queue);
        let spawned = thread::Builder::new()
            .name("iostream-async-writer".into())
            .spawn(move || write_worker(stream, queue));
        match spawned {
            Ok(handle) => {
                debug!("async writer started (block_size={})", self.block_size);
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                let mut state = self.queue.lock();
                state.running = false;
                state.finished = true;
                state.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    /// Number of full blocks waiting for the worker.
    pub fn queued_blocks(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if the worker stopped after a failed write.
    pub fn is_failed(&self) -> bool {
        self.queue.lock().failed
    }

    /// Flushes, stops the worker and returns the inner stream.
    pub fn into_inner(mut self) -> Result<S> {
        self.flush()?;
        if let Some(stream) = self.stream.take() {
            return Ok(stream);
        }
        self.queue.stop();
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::WorkerPanicked),
            None => Err(Error::WorkerPanicked),
        }
    }

    fn push_current(&mut self) -> Result<()> {
        if self.current.size() == 0 {
            return Ok(());
        }
        self.start()?;
        let block = mem::replace(&mut self.current, MemoryBlock::with_capacity(self.block_size));
        if !self.queue.push(block) {
            return Err(Error::WriterStopped);
        }
        Ok(())
    }
}

impl<S: Writable + Send + 'static> Writable for AsyncWriter<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.is_failed() {
            return Err(Error::WriterStopped);
        }
        let mut accepted = 0;
        while accepted < data.len() {
            accepted += self.current.write(&data[accepted..])?;
            if self.current.size() == self.current.capacity() {
                self.push_current()?;
            }
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> Result<()> {
        if self.stream.is_some() && self.current.size() == 0 {
            // Never started and nothing to send.
            return Ok(());
        }
        let pushed = self.push_current();

        let mut state = self.queue.lock();
        if pushed.is_ok() && state.running {
            state.flush_requested = true;
            self.queue.notify();
            while state.running
                && (state.flush_requested || state.in_flight || !state.blocks.is_empty())
            {
                self.queue.wait(&mut state);
            }
        }
        if state.failed {
            return Err(state.error.take().unwrap_or(Error::WriterStopped));
        }
        pushed
    }
}

impl<S: Writable + Send + 'static> Drop for AsyncWriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("async writer dropped: flush failed: {}", e);
        }
        self.queue.stop();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("async writer worker panicked");
            }
        }
    }
}

fn write_worker<S: Writable>(mut stream: S, queue: Arc<BlockQueue>) -> S {
    let mut state = queue.lock();
    loop {
        while state.running && state.blocks.is_empty() && !state.flush_requested {
            queue.wait(&mut state);
        }

        if let Some(block) = state.blocks.pop_front() {
            state.in_flight = true;
            queue.notify();
            let result = MutexGuard::unlocked(&mut state, || write_fully(&mut stream, block.data()));
            state.in_flight = false;
            match result {
                Ok(n) if n == block.size() => {
                    trace!("async writer wrote {} bytes", n);
                    queue.notify();
                    continue;
                }
                Ok(n) => {
                    warn!("async writer: short write ({} of {} bytes)", n, block.size());
                    state.error = Some(Error::ShortWrite {
                        expected: block.size(),
                        written: n,
                    });
                }
                Err(e) => {
                    warn!("async writer: write failed: {}", e);
                    state.error = Some(e);
                }
            }
            state.failed = true;
            break;
        }

        if state.flush_requested {
            let result = MutexGuard::unlocked(&mut state, || stream.flush());
            state.flush_requested = false;
            queue.notify();
            if let Err(e) = result {
                warn!("async writer: flush failed: {}", e);
                state.error = Some(e);
                state.failed = true;
                break;
            }
            continue;
        }

        if !state.running {
            break;
        }
    }

    state.running = false;
    state.finished = true;
    state.blocks.clear();
    queue.notify();
    let failed = state.failed;
    drop(state);

    if !failed {
        if let Err(e) = stream.flush() {
            warn!("async writer: final flush failed: {}", e);
        }
    }
    debug!("async writer stopped");
    stream
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Collects everything written, sleeping on each call.
    #[derive(Clone, Default)]
    struct SlowSink {
        data: Arc<Mutex<Vec<u8>>>,
        flushes: Arc<Mutex<usize>>,
        delay: Duration,
    }

    impl Writable for SlowSink {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            thread::sleep(self.delay);
            self.data.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> Result<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// Accepts `limit` bytes in total, then reports short writes.
    struct Cramped {
        limit: usize,
    }

    impl Writable for Cramped {
        fn write(&mut self, data: &[u8]) -> Result<usize> {
            let n = data.len().min(self.limit);
            self.limit -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_flush_delivers_partial_block() {
        let sink = SlowSink::default();
        let mut writer = AsyncWriter::new(sink.clone(), AsyncOptions::default()).unwrap();
        writer.write(b"hello").unwrap();
        assert!(sink.data.lock().unwrap().is_empty());

        writer.flush().unwrap();
        assert_eq!(sink.data.lock().unwrap().as_slice(), b"hello");
        assert_eq!(*sink.flushes.lock().unwrap(), 1);
    }

    #[test]
    fn test_flush_without_writes_is_noop() {
        let sink = SlowSink::default();
        let mut writer = AsyncWriter::new(sink.clone(), AsyncOptions::default()).unwrap();
        writer.flush().unwrap();
        drop(writer);
        assert_eq!(*sink.flushes.lock().unwrap(), 0);
    }

    #[test]
    fn test_drop_flushes() {
        let sink = SlowSink {
            delay: Duration::from_millis(5),
            ..Default::default()
        };
        {
            let opts = AsyncOptions::default().with_block_size(16).with_max_blocks(2);
            let mut writer = AsyncWriter::new(sink.clone(), opts).unwrap();
            for i in 0..10u8 {
                writer.write(&[i; 10]).unwrap();
            }
        }
        let data = sink.data.lock().unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(data[99], 9);
    }

    #[test]
    fn test_backpressure_bounds_queue() {
        let sink = SlowSink {
            delay: Duration::from_millis(10),
            ..Default::default()
        };
        let opts = AsyncOptions::default().with_block_size(64).with_max_blocks(2);
        let mut writer = AsyncWriter::spawn(sink.clone(), opts).unwrap();
        for _ in 0..20 {
            writer.write(&[1u8; 64]).unwrap();
            assert!(writer.queued_blocks() <= 2);
        }
        writer.flush().unwrap();
        assert_eq!(sink.data.lock().unwrap().len(), 20 * 64);
    }

    #[test]
    fn test_short_write_stops_worker() {
        let opts = AsyncOptions::default().with_block_size(8).with_max_blocks(4);
        let mut writer = AsyncWriter::new(Cramped { limit: 10 }, opts).unwrap();
        writer.write(&[0u8; 16]).unwrap();

        let err = writer.flush().unwrap_err();
        assert!(matches!(err, Error::ShortWrite { expected: 8, written: 2 }));
        assert!(writer.is_failed());
        assert!(matches!(writer.flush(), Err(Error::WriterStopped)));
        assert!(matches!(writer.write(b"x"), Err(Error::WriterStopped)));
    }

    #[test]
    fn test_into_inner_returns_stream() {
        let opts = AsyncOptions::default().with_block_size(4);
        let mut writer = AsyncWriter::new(MemoryBlock::with_capacity(32), opts).unwrap();
        writer.write(b"0123456789").unwrap();
        let block = writer.into_inner().unwrap();
        assert_eq!(block.data(), b"0123456789");
    }
}
