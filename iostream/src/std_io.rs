//! Bridges to and from `std::io`.
//!
//! [`StdStream`] lets files, sockets, stdin/stdout and anything else that
//! implements `std::io::{Read, Write, Seek}` take part in a stream pipeline.
//! [`IoBridge`] goes the other way, for handing a pipeline to code that
//! expects `std::io`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::stream::{Origin, Readable, Seekable, Writable};

/// Adapts a `std::io` object to the stream traits.
///
/// The position is counted from the bytes transferred, starting at zero (or
/// at the object's position for [`StdStream::seekable`]).
#[derive(Debug)]
pub struct StdStream<T> {
    inner: T,
    pos: u64,
}

impl<T> StdStream<T> {
    /// Wraps `inner`, counting the position from zero.
    pub fn new(inner: T) -> Self {
        StdStream { inner, pos: 0 }
    }

    /// Returns a reference to the wrapped object.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Returns the wrapped object.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Seek> StdStream<T> {
    /// Wraps `inner`, starting from its current position.
    pub fn seekable(mut inner: T) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(StdStream { inner, pos })
    }
}

impl<T: Read> Readable for StdStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(n) => {
                    self.pos += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<T: Write> Writable for StdStream<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        loop {
            match self.inner.write(data) {
                Ok(n) => {
                    self.pos += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<T: Seek> Seekable for StdStream<T> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        let from = match origin {
            Origin::Begin => SeekFrom::Start(offset.max(0) as u64),
            Origin::Current => SeekFrom::Current(offset),
            Origin::End => SeekFrom::End(offset),
        };
        self.pos = self.inner.seek(from)?;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }
}

/// Adapts a stream to `std::io::{Read, Write, Seek}`.
#[derive(Debug)]
pub struct IoBridge<S> {
    inner: S,
}

impl<S> IoBridge<S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        IoBridge { inner }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Readable> Read for IoBridge<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.inner.read(buf)?)
    }
}

impl<S: Writable> Write for IoBridge<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.inner.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.inner.flush()?)
    }
}

impl<S: Seekable> Seek for IoBridge<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, origin) = match pos {
            SeekFrom::Start(n) => (
                i64::try_from(n).map_err(|_| Error::Unsupported("seek offset"))?,
                Origin::Begin,
            ),
            SeekFrom::Current(n) => (n, Origin::Current),
            SeekFrom::End(n) => (n, Origin::End),
        };
        Ok(self.inner.seek(offset, origin)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::memory::GrowableBuffer;
    use crate::util::copy;

    #[test]
    fn test_std_stream_read() {
        let mut s = StdStream::new(Cursor::new(b"hello".to_vec()));
        let mut buf = [0u8; 3];
        assert_eq!(Readable::read(&mut s, &mut buf).unwrap(), 3);
        assert_eq!(s.tell(), 3);
    }

    #[test]
    fn test_std_stream_seek() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        cursor.set_position(4);
        let mut s = StdStream::seekable(cursor).unwrap();
        assert_eq!(s.tell(), 4);
        assert_eq!(Seekable::seek(&mut s, -2, Origin::End).unwrap(), 8);
        assert_eq!(Seekable::seek(&mut s, -1, Origin::Current).unwrap(), 7);
    }

    #[test]
    fn test_std_stream_write() {
        let mut s = StdStream::new(Vec::new());
        Writable::write(&mut s, b"abc").unwrap();
        Writable::flush(&mut s).unwrap();
        assert_eq!(s.pos, 3);
        assert_eq!(s.into_inner(), b"abc");
    }

    #[test]
    fn test_bridge_round_trip() {
        let mut bridge = IoBridge::new(GrowableBuffer::with_capacity(64));
        bridge.write_all(b"through std").unwrap();
        bridge.seek(SeekFrom::Start(8)).unwrap();
        let mut out = String::new();
        bridge.read_to_string(&mut out).unwrap();
        assert_eq!(out, "std");
    }

    #[test]
    fn test_bridge_error_kind() {
        let mut bridge = IoBridge::new(GrowableBuffer::with_capacity(2));
        let err = bridge.write_all(b"too long").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_copy_between_std_objects() {
        let mut src = StdStream::new(Cursor::new(vec![3u8; 5000]));
        let mut dst = StdStream::new(Vec::new());
        let result = copy(&mut src, &mut dst).unwrap();
        assert_eq!(result.total_write, 5000);
        assert_eq!(dst.get_ref().len(), 5000);
    }
}
