//! Extension methods for typed I/O.
//!
//! ```
//! use teas_iostream::{GrowableBuffer, Origin, ReadableExt, Seekable, WritableExt};
//!
//! let mut buf = GrowableBuffer::with_capacity(16);
//! buf.write_le(0x1234u16).unwrap();
//! buf.write_be(-2i32).unwrap();
//! buf.seek(0, Origin::Begin).unwrap();
//!
//! assert_eq!(buf.read_le::<u16>().unwrap(), 0x1234);
//! assert_eq!(buf.read_be::<i32>().unwrap(), -2);
//! ```

use std::io;

use crate::error::{Error, Result};
use crate::lines::Lines;
use crate::stream::{Readable, Writable};
use crate::util::{read_fully, write_fully};

/// A fixed-size value with a defined byte order.
pub trait Primitive: Sized + Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encodes as little-endian into `out[..SIZE]`.
    fn put_le(self, out: &mut [u8]);
    /// Encodes as big-endian into `out[..SIZE]`.
    fn put_be(self, out: &mut [u8]);
    /// Decodes little-endian `bytes[..SIZE]`.
    fn get_le(bytes: &[u8]) -> Self;
    /// Decodes big-endian `bytes[..SIZE]`.
    fn get_be(bytes: &[u8]) -> Self;
}

macro_rules! impl_primitive {
    ($($t:ty),* $(,)?) => {
        $(
            impl Primitive for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn put_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn put_be(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_be_bytes());
                }

                fn get_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_le_bytes(raw)
                }

                fn get_be(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_primitive!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

const MAX_PRIMITIVE: usize = 8;

fn unexpected_eof() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "stream ended inside a value",
    ))
}

/// Typed reads on any [`Readable`].
pub trait ReadableExt: Readable {
    /// Reads a little-endian value.
    fn read_le<T: Primitive>(&mut self) -> Result<T> {
        let mut raw = [0u8; MAX_PRIMITIVE];
        if read_fully(self, &mut raw[..T::SIZE])? != T::SIZE {
            return Err(unexpected_eof());
        }
        Ok(T::get_le(&raw))
    }

    /// Reads a big-endian value.
    fn read_be<T: Primitive>(&mut self) -> Result<T> {
        let mut raw = [0u8; MAX_PRIMITIVE];
        if read_fully(self, &mut raw[..T::SIZE])? != T::SIZE {
            return Err(unexpected_eof());
        }
        Ok(T::get_be(&raw))
    }

    /// Iterates over `\n`-terminated lines.
    fn lines(self) -> Lines<Self>
    where
        Self: Sized,
    {
        Lines::new(self)
    }
}

impl<R: Readable + ?Sized> ReadableExt for R {}

/// Typed writes on any [`Writable`].
pub trait WritableExt: Writable {
    /// Writes a little-endian value.
    fn write_le<T: Primitive>(&mut self, value: T) -> Result<()> {
        let mut raw = [0u8; MAX_PRIMITIVE];
        value.put_le(&mut raw);
        self.write_exact(&raw[..T::SIZE])
    }

    /// Writes a big-endian value.
    fn write_be<T: Primitive>(&mut self, value: T) -> Result<()> {
        let mut raw = [0u8; MAX_PRIMITIVE];
        value.put_be(&mut raw);
        self.write_exact(&raw[..T::SIZE])
    }

    /// Writes the UTF-8 bytes of `text`.
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.write_exact(text.as_bytes())
    }

    /// Writes all of `data`, failing on a short write.
    fn write_exact(&mut self, data: &[u8]) -> Result<()> {
        let written = write_fully(self, data)?;
        if written != data.len() {
            return Err(Error::ShortWrite {
                expected: data.len(),
                written,
            });
        }
        Ok(())
    }
}

impl<W: Writable + ?Sized> WritableExt for W {}
