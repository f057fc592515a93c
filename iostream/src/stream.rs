//! Stream capability traits.
//!
//! A stream is any type implementing some subset of [`Readable`],
//! [`Writable`] and [`Seekable`]. Adapters enable a capability only when the
//! type they wrap provides what that capability needs, so calling an
//! unsupported operation is a compile error rather than a runtime failure.
//!
//! `&mut S` implements every trait `S` implements, which makes a borrowed
//! stream the non-owning form of any adapter input. `Box<dyn Readable>` and
//! friends are the polymorphic handles.
//!
//! # Example
//!
//! ```
//! use teas_iostream::{GrowableBuffer, Origin, Readable, Seekable, Writable};
//!
//! let mut buf = GrowableBuffer::with_capacity(16);
//! buf.write(b"hello").unwrap();
//! buf.seek(0, Origin::Begin).unwrap();
//!
//! let mut out = [0u8; 5];
//! assert_eq!(buf.read(&mut out).unwrap(), 5);
//! assert_eq!(&out, b"hello");
//! ```

use crate::error::Result;

/// Reference point for [`Seekable::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Offset from the start of the stream.
    Begin,
    /// Offset from the current position.
    Current,
    /// Offset from the end of the stream.
    End,
}

/// A stream that produces bytes.
pub trait Readable {
    /// Reads up to `buf.len()` bytes into `buf`.
    ///
    /// Returns the number of bytes read. `Ok(0)` for a non-empty `buf`
    /// means no more data is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// A stream that accepts bytes.
pub trait Writable {
    /// Writes up to `data.len()` bytes.
    ///
    /// Returns the number of bytes accepted. A count below `data.len()` is a
    /// short write: the sink is full or closed.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Pushes any buffered bytes towards the final sink.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A stream with a position.
pub trait Seekable {
    /// Moves the position and returns the new absolute position.
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64>;

    /// Returns the current absolute position.
    fn tell(&self) -> u64;
}

impl<S: Readable + ?Sized> Readable for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<S: Writable + ?Sized> Writable for &mut S {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Seekable + ?Sized> Seekable for &mut S {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        (**self).seek(offset, origin)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }
}

impl<S: Readable + ?Sized> Readable for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }
}

impl<S: Writable + ?Sized> Writable for Box<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: Seekable + ?Sized> Seekable for Box<S> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        (**self).seek(offset, origin)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }
}

/// Resolves `offset` against `origin` and clamps the result into `[0, end]`.
pub(crate) fn resolve_clamped(offset: i64, origin: Origin, current: u64, end: u64) -> u64 {
    let base = match origin {
        Origin::Begin => 0,
        Origin::Current => current as i128,
        Origin::End => end as i128,
    };
    (base + offset as i128).clamp(0, end as i128) as u64
}

/// A stream that has nothing to read and discards everything written.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStream;

impl NullStream {
    /// Creates a new null stream.
    pub fn new() -> Self {
        NullStream
    }
}

impl Readable for NullStream {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Ok(0)
    }
}

impl Writable for NullStream {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }
}

/// A stream that reads an endless run of zero bytes and discards writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroStream;

impl ZeroStream {
    /// Creates a new zero stream.
    pub fn new() -> Self {
        ZeroStream
    }
}

impl Readable for ZeroStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        buf.fill(0);
        Ok(buf.len())
    }
}

impl Writable for ZeroStream {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(data.len())
    }
}
