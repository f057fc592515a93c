//! Read/write buffering adapter.
//!
//! [`BufferedStream`] batches small reads and writes against an inner stream
//! through one [`GrowableBuffer`]. It switches between read and write mode on
//! demand: switching to read flushes pending writes, switching to write drops
//! the read-ahead and puts the inner stream back at the logical position.
//!
//! The inner stream must report its position. Streams that cannot seek are
//! wrapped in [`Tracked`] (see [`BufferedStream::reader`] and
//! [`BufferedStream::writer`]).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::memory::GrowableBuffer;
use crate::stream::{Origin, Readable, Seekable, Writable};

/// Options for [`BufferedStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferOptions {
    /// Buffer capacity in bytes.
    pub capacity: usize,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl BufferOptions {
    /// Sets the buffer capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Checks that the capacity is non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidConfig("buffer capacity must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Reading,
    Writing,
}

// Captured on the first write so read, seek and drop can push pending bytes
// without requiring `S: Writable`.
type SinkFn<S> = fn(&mut S, &[u8]) -> Result<usize>;

/// A buffering layer over an inner stream.
///
/// `tell()` is the inner position at the start of the buffer plus the
/// buffer cursor. Pending writes are pushed on [`flush`](Writable::flush),
/// on a mode switch, on any seek and, best effort, on drop.
///
/// # Example
///
/// ```
/// use teas_iostream::{BufferedStream, GrowableBuffer, Origin, Readable, Seekable, Writable};
///
/// let mut buffered = BufferedStream::new(GrowableBuffer::with_capacity(4096));
/// buffered.write(b"hello ").unwrap();
/// buffered.write(b"world").unwrap();
/// buffered.seek(0, Origin::Begin).unwrap();
///
/// let mut out = [0u8; 11];
/// assert_eq!(buffered.read(&mut out).unwrap(), 11);
/// assert_eq!(&out, b"hello world");
/// ```
pub struct BufferedStream<S> {
    inner: S,
    buffer: GrowableBuffer,
    offset: u64,
    mode: Mode,
    sink: Option<SinkFn<S>>,
}

impl<S: Seekable> BufferedStream<S> {
    /// Wraps `inner` with a buffer of the default capacity (1024 bytes).
    pub fn new(inner: S) -> Self {
        Self::with_buffer(inner, BufferOptions::default().capacity)
    }

    /// Wraps `inner` with a buffer of `capacity` bytes.
    pub fn with_capacity(inner: S, capacity: usize) -> Result<Self> {
        Self::with_options(inner, BufferOptions::default().with_capacity(capacity))
    }

    /// Wraps `inner` using `opts`.
    pub fn with_options(inner: S, opts: BufferOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self::with_buffer(inner, opts.capacity))
    }

    fn with_buffer(inner: S, capacity: usize) -> Self {
        let offset = inner.tell();
        BufferedStream {
            inner,
            buffer: GrowableBuffer::with_capacity(capacity),
            offset,
            mode: Mode::Idle,
            sink: None,
        }
    }

    /// Pushes pending writes into the inner stream without flushing it.
    fn flush_pending(&mut self) -> Result<()> {
        if self.mode != Mode::Writing || self.buffer.tell() == 0 {
            return Ok(());
        }
        let Some(sink) = self.sink else {
            return Ok(());
        };
        let pending = self.buffer.tell() as usize;
        let written = write_all_with(sink, &mut self.inner, &self.buffer.data()[..pending])?;
        self.buffer.truncate(0);
        self.offset = self.inner.tell();
        if written != pending {
            return Err(Error::ShortWrite {
                expected: pending,
                written,
            });
        }
        Ok(())
    }

    // Discards the buffer and rebases on the inner position `pos`.
    fn reset(&mut self, pos: u64) {
        self.buffer.truncate(0);
        self.offset = pos;
        self.mode = Mode::Idle;
    }
}

impl<S> BufferedStream<S> {
    /// Returns the buffer capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Changes the buffer capacity.
    ///
    /// Only allowed while nothing is buffered.
    pub fn set_buffer_size(&mut self, capacity: usize) -> Result<()> {
        BufferOptions { capacity }.validate()?;
        if self.buffer.size() > 0 {
            return Err(Error::BufferBusy);
        }
        self.buffer.set_capacity(capacity, false);
        Ok(())
    }

    /// Returns a reference to the inner stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Returns a mutable reference to the inner stream.
    ///
    /// Reading or writing through it bypasses the buffer.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Returns the bytes waiting to be written.
    pub fn pending(&self) -> &[u8] {
        match self.mode {
            Mode::Writing => &self.buffer.data()[..self.buffer.tell() as usize],
            _ => &[],
        }
    }
}

impl<S: Readable> BufferedStream<Tracked<S>> {
    /// Buffers a stream that can only be read.
    pub fn reader(inner: S) -> Self {
        Self::new(Tracked::new(inner))
    }
}

impl<S: Writable> BufferedStream<Tracked<S>> {
    /// Buffers a stream that can only be written.
    pub fn writer(inner: S) -> Self {
        Self::new(Tracked::new(inner))
    }
}

fn write_all_with<S>(sink: SinkFn<S>, inner: &mut S, data: &[u8]) -> Result<usize> {
    let mut written = 0;
    while written < data.len() {
        let n = sink(inner, &data[written..])?;
        if n == 0 {
            break;
        }
        written += n;
    }
    Ok(written)
}

impl<S: Readable + Seekable> BufferedStream<S> {
    // Tops the buffer up from the inner stream. A fully consumed buffer is
    // recycled first.
    fn fill(&mut self) -> Result<usize> {
        if self.buffer.eof() {
            self.offset += self.buffer.size() as u64;
            self.buffer.truncate(0);
        }
        self.buffer.fill_from(&mut self.inner)
    }
}

impl<S: Readable + Seekable> Readable for BufferedStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.mode == Mode::Writing {
            self.flush_pending()?;
            self.reset(self.offset);
        }
        self.mode = Mode::Reading;

        let mut total = self.buffer.read(buf)?;
        if total == buf.len() {
            return Ok(total);
        }

        if buf.len() - total >= self.buffer.capacity() {
            self.reset(self.offset + self.buffer.size() as u64);
            self.mode = Mode::Reading;
            let n = match self.inner.read(&mut buf[total..]) {
                Ok(n) => n,
                Err(e) if total == 0 => return Err(e),
                Err(e) => {
                    warn!("buffered read: direct read failed after {} bytes: {}", total, e);
                    0
                }
            };
            self.offset = self.inner.tell();
            return Ok(total + n);
        }

        for _ in 0..2 {
            match self.fill() {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if total == 0 => return Err(e),
                Err(e) => {
                    warn!("buffered read: refill failed after {} bytes: {}", total, e);
                    break;
                }
            }
            total += self.buffer.read(&mut buf[total..])?;
            if total == buf.len() {
                break;
            }
        }
        Ok(total)
    }
}

impl<S: Writable + Seekable> Writable for BufferedStream<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.sink = Some(<S as Writable>::write);
        if self.mode == Mode::Reading {
            let pos = self.offset + self.buffer.tell();
            let pos = self.inner.seek(pos as i64, Origin::Begin)?;
            self.reset(pos);
        }
        self.mode = Mode::Writing;

        if data.len() >= self.buffer.capacity() {
            self.flush_pending()?;
            let n = self.inner.write(data)?;
            self.offset = self.inner.tell();
            return Ok(n);
        }

        let mut written = 0;
        while written < data.len() {
            written += self.buffer.write(&data[written..])?;
            if self.buffer.tell() as usize == self.buffer.capacity() {
                self.flush_pending()?;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_pending()?;
        self.inner.flush()
    }
}

impl<S: Seekable> Seekable for BufferedStream<S> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        self.flush_pending()?;

        let target = match origin {
            Origin::Begin => offset as i128,
            Origin::Current => self.tell() as i128 + offset as i128,
            Origin::End => {
                let pos = self.inner.seek(offset, Origin::End)?;
                self.reset(pos);
                return Ok(pos);
            }
        };
        let target = target.clamp(0, i64::MAX as i128) as u64;

        if self.mode == Mode::Reading {
            let start = self.offset;
            let end = start + self.buffer.size() as u64;
            if (start..=end).contains(&target) {
                self.buffer.seek((target - start) as i64, Origin::Begin)?;
                return Ok(target);
            }
        }

        let pos = self.inner.seek(target as i64, Origin::Begin)?;
        self.reset(pos);
        Ok(pos)
    }

    fn tell(&self) -> u64 {
        self.offset + self.buffer.tell()
    }
}

impl<S> Drop for BufferedStream<S> {
    fn drop(&mut self) {
        if self.mode != Mode::Writing || self.buffer.tell() == 0 {
            return;
        }
        let Some(sink) = self.sink else {
            return;
        };
        let pending = self.buffer.tell() as usize;
        match write_all_with(sink, &mut self.inner, &self.buffer.data()[..pending]) {
            Ok(n) if n == pending => {}
            Ok(n) => warn!("buffered stream dropped: wrote {} of {} pending bytes", n, pending),
            Err(e) => warn!("buffered stream dropped: flush failed: {}", e),
        }
    }
}

/// Adds position tracking to a stream that cannot seek.
///
/// `tell()` counts the bytes transferred. `seek` succeeds only when it
/// resolves to the current position.
#[derive(Debug)]
pub struct Tracked<S> {
    inner: S,
    pos: u64,
}

impl<S> Tracked<S> {
    /// Wraps `inner`, starting the count at zero.
    pub fn new(inner: S) -> Self {
        Tracked { inner, pos: 0 }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Readable> Readable for Tracked<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: Writable> Writable for Tracked<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self.inner.write(data)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

impl<S> Seekable for Tracked<S> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        let target = match origin {
            Origin::Begin => offset as i128,
            Origin::Current => self.pos as i128 + offset as i128,
            Origin::End => return Err(Error::Unsupported("seek from end")),
        };
        if target != self.pos as i128 {
            return Err(Error::Unsupported("seek"));
        }
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}
