//! Windowed and size-limited sub-streams.

use crate::error::{Error, Result};
use crate::stream::{Origin, Readable, Seekable, Writable};

/// A window `[min, max)` over a borrowed seekable stream.
///
/// Positions are reported relative to `min`. Reads and writes never cross
/// `max`, and seeks are clamped into the window.
///
/// # Example
///
/// ```
/// use teas_iostream::{MemoryBlock, Readable, Seekable, ViewStream};
///
/// let data: Vec<u8> = (0..=255).collect();
/// let mut block = MemoryBlock::new(&data[..]);
/// let mut view = ViewStream::new(&mut block, 100, 110).unwrap();
///
/// let mut buf = [0u8; 64];
/// assert_eq!(view.read(&mut buf).unwrap(), 10);
/// assert_eq!(buf[0], 100);
/// assert_eq!(view.tell(), 10);
/// ```
pub struct ViewStream<'a, S: ?Sized> {
    stream: &'a mut S,
    min: u64,
    max: u64,
}

impl<'a, S: Seekable + ?Sized> ViewStream<'a, S> {
    /// Creates a view over `[min, max)`.
    ///
    /// If the stream is positioned outside the window it is moved to `min`.
    pub fn new(stream: &'a mut S, min: u64, max: u64) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidWindow { min, max });
        }
        let pos = stream.tell();
        if pos < min || pos > max {
            stream.seek(to_offset(min), Origin::Begin)?;
        }
        Ok(ViewStream { stream, min, max })
    }

    /// Creates a view starting at the current position with no upper bound.
    pub fn from_current(stream: &'a mut S) -> Self {
        let min = stream.tell();
        ViewStream {
            stream,
            min,
            max: u64::MAX,
        }
    }

    /// Returns the window start in inner-stream coordinates.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Returns the window end in inner-stream coordinates.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Returns the size of the visible content, `min(end, max) - min`.
    ///
    /// The inner stream is seeked to its end and back.
    pub fn size(&mut self) -> Result<u64> {
        let pos = self.stream.tell();
        let end = self.stream.seek(0, Origin::End)?;
        self.stream.seek(to_offset(pos), Origin::Begin)?;
        Ok(end.clamp(self.min, self.max) - self.min)
    }

    // Bytes that may be transferred from the current position.
    fn room(&self, want: usize) -> usize {
        let pos = self.stream.tell();
        if pos >= self.max {
            return 0;
        }
        (self.max - pos).min(want as u64) as usize
    }
}

fn to_offset(pos: u64) -> i64 {
    i64::try_from(pos).unwrap_or(i64::MAX)
}

impl<S: Readable + Seekable + ?Sized> Readable for ViewStream<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.room(buf.len());
        if n == 0 {
            return Ok(0);
        }
        self.stream.read(&mut buf[..n])
    }
}

impl<S: Writable + Seekable + ?Sized> Writable for ViewStream<'_, S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self.room(data.len());
        if n == 0 {
            return Ok(0);
        }
        self.stream.write(&data[..n])
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush()
    }
}

impl<S: Seekable + ?Sized> Seekable for ViewStream<'_, S> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        let base = match origin {
            Origin::Begin => 0,
            Origin::Current => self.tell() as i128,
            Origin::End => self.size()? as i128,
        };
        let target = (self.min as i128 + base + offset as i128)
            .clamp(self.min as i128, self.max.min(i64::MAX as u64) as i128);
        self.stream.seek(target as i64, Origin::Begin)?;
        Ok(self.tell())
    }

    fn tell(&self) -> u64 {
        self.stream.tell().saturating_sub(self.min)
    }
}

/// Caps the number of bytes transferred through a stream.
///
/// Works on streams that cannot seek: the count starts at zero and only
/// grows with reads and writes.
#[derive(Debug)]
pub struct Limited<S> {
    inner: S,
    limit: u64,
    used: u64,
}

impl<S> Limited<S> {
    /// Allows at most `limit` bytes through `inner`.
    pub fn new(inner: S, limit: u64) -> Self {
        Limited {
            inner,
            limit,
            used: 0,
        }
    }

    /// Bytes still allowed.
    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn room(&self, want: usize) -> usize {
        self.remaining().min(want as u64) as usize
    }
}

impl<S: Readable> Readable for Limited<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.room(buf.len());
        if n == 0 {
            return Ok(0);
        }
        let got = self.inner.read(&mut buf[..n])?;
        self.used += got as u64;
        Ok(got)
    }
}

impl<S: Writable> Writable for Limited<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self.room(data.len());
        if n == 0 {
            return Ok(0);
        }
        let put = self.inner.write(&data[..n])?;
        self.used += put as u64;
        Ok(put)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
