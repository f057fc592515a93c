//! Fixed-capacity and growable memory streams.
//!
//! [`MemoryBlock`] is a stream over a byte region with a cursor and a logical
//! end. Reads stop at the end, writes stop at the capacity and never grow the
//! storage. The backing can be owned (`Box<[u8]>`), borrowed mutably
//! (`&mut [u8]`) or borrowed read-only (`&[u8]`); a read-only backing only
//! gets the read and seek capabilities.
//!
//! [`GrowableBuffer`] owns its storage and can be resized explicitly.

use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::stream::{Origin, Readable, Seekable, Writable, resolve_clamped};

/// A stream over a fixed byte region.
///
/// Invariant: `cursor <= end <= capacity`.
///
/// # Example
///
/// ```
/// use teas_iostream::{MemoryBlock, Readable, Writable};
///
/// let mut storage = [0u8; 4];
/// let mut block = MemoryBlock::empty(&mut storage[..]);
/// assert_eq!(block.write(b"abcdef").unwrap(), 4);
/// assert_eq!(block.size(), 4);
///
/// let mut reader = MemoryBlock::new(&b"xyz"[..]);
/// let mut out = [0u8; 8];
/// assert_eq!(reader.read(&mut out).unwrap(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBlock<B = Box<[u8]>> {
    storage: B,
    cursor: usize,
    end: usize,
}

impl MemoryBlock<Box<[u8]>> {
    /// Creates an empty owned block with `capacity` bytes of storage.
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryBlock {
            storage: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
            end: 0,
        }
    }
}

impl<B: AsRef<[u8]>> MemoryBlock<B> {
    /// Creates a block whose content is the whole of `storage`.
    ///
    /// The cursor starts at the beginning, so the content can be read back.
    pub fn new(storage: B) -> Self {
        let end = storage.as_ref().len();
        MemoryBlock {
            storage,
            cursor: 0,
            end,
        }
    }

    /// Creates an empty block that writes into `storage`.
    pub fn empty(storage: B) -> Self {
        MemoryBlock {
            storage,
            cursor: 0,
            end: 0,
        }
    }

    /// Returns the logical size of the content.
    pub fn size(&self) -> usize {
        self.end
    }

    /// Returns the storage size.
    pub fn capacity(&self) -> usize {
        self.storage.as_ref().len()
    }

    /// Returns the number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.end - self.cursor
    }

    /// Returns true when the cursor is at the logical end.
    pub fn eof(&self) -> bool {
        self.cursor == self.end
    }

    /// Returns the whole content, `[0, size)`.
    pub fn data(&self) -> &[u8] {
        &self.storage.as_ref()[..self.end]
    }

    /// Returns the unread content, `[cursor, size)`.
    pub fn unread(&self) -> &[u8] {
        &self.storage.as_ref()[self.cursor..self.end]
    }

    /// Sets the logical size to `min(size, capacity)`.
    ///
    /// The cursor is pulled back if it lies past the new end.
    pub fn truncate(&mut self, size: usize) {
        self.end = size.min(self.capacity());
        self.cursor = self.cursor.min(self.end);
    }

    /// Advances the cursor as if `n` bytes were written, without touching
    /// the storage. Returns the number of bytes skipped.
    pub fn skip_write(&mut self, n: usize) -> usize {
        let n = n.min(self.capacity() - self.cursor);
        self.cursor += n;
        self.end = self.end.max(self.cursor);
        n
    }

    /// Moves the cursor back to the beginning.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Consumes the block and returns its storage.
    pub fn into_inner(self) -> B {
        self.storage
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.storage.as_ref()[self.cursor..self.cursor + n]);
        self.cursor += n;
        n
    }

    fn seek_to(&mut self, offset: i64, origin: Origin) -> u64 {
        self.cursor =
            resolve_clamped(offset, origin, self.cursor as u64, self.end as u64) as usize;
        self.cursor as u64
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> MemoryBlock<B> {
    fn write_from(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.capacity() - self.cursor);
        self.storage.as_mut()[self.cursor..self.cursor + n].copy_from_slice(&data[..n]);
        self.cursor += n;
        self.end = self.end.max(self.cursor);
        n
    }

    /// Reads from `src` directly into the unused tail `[size, capacity)`.
    ///
    /// The cursor does not move; the logical end grows by the number of bytes
    /// read, which is returned. Returns `Ok(0)` when the block is full or
    /// `src` is exhausted.
    pub fn fill_from<R: Readable + ?Sized>(&mut self, src: &mut R) -> Result<usize> {
        let end = self.end;
        let n = src.read(&mut self.storage.as_mut()[end..])?;
        self.end += n;
        Ok(n)
    }
}

impl<B: AsRef<[u8]>> Readable for MemoryBlock<B> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Writable for MemoryBlock<B> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.write_from(data))
    }
}

impl<B: AsRef<[u8]>> Seekable for MemoryBlock<B> {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        Ok(self.seek_to(offset, origin))
    }

    fn tell(&self) -> u64 {
        self.cursor as u64
    }
}

/// An owned memory stream whose capacity can be changed.
///
/// Writes never grow the buffer implicitly; use [`set_capacity`] or
/// [`append`] for that. All [`MemoryBlock`] accessors are available through
/// `Deref`.
///
/// [`set_capacity`]: GrowableBuffer::set_capacity
/// [`append`]: GrowableBuffer::append
#[derive(Debug, Clone)]
pub struct GrowableBuffer {
    block: MemoryBlock,
}

impl Default for GrowableBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GrowableBuffer {
    /// Creates an empty buffer with no storage.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty buffer with `capacity` bytes of storage.
    pub fn with_capacity(capacity: usize) -> Self {
        GrowableBuffer {
            block: MemoryBlock::with_capacity(capacity),
        }
    }

    /// Reallocates the storage to `capacity` bytes.
    ///
    /// With `copy`, the first `min(size, capacity)` bytes are kept and the
    /// cursor is clamped to the new size. Without it the buffer is empty
    /// afterwards.
    pub fn set_capacity(&mut self, capacity: usize, copy: bool) {
        if capacity == self.block.capacity() {
            if !copy {
                self.block.truncate(0);
            }
            return;
        }
        let mut next = MemoryBlock::with_capacity(capacity);
        if copy {
            let keep = self.block.size().min(capacity);
            next.storage[..keep].copy_from_slice(&self.block.data()[..keep]);
            next.end = keep;
            next.cursor = self.block.cursor.min(keep);
        }
        self.block = next;
    }

    /// Writes all of `data` at the cursor, growing the storage as needed.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let needed = self.block.cursor + data.len();
        if needed > self.block.capacity() {
            let grown = (self.block.capacity() * 2).max(needed);
            self.set_capacity(grown, true);
        }
        self.block.write_from(data)
    }

    /// Consumes the buffer and returns its content.
    pub fn into_vec(self) -> Vec<u8> {
        let size = self.block.size();
        let mut data = self.block.storage.into_vec();
        data.truncate(size);
        data
    }
}

impl Deref for GrowableBuffer {
    type Target = MemoryBlock;

    fn deref(&self) -> &MemoryBlock {
        &self.block
    }
}

impl DerefMut for GrowableBuffer {
    fn deref_mut(&mut self) -> &mut MemoryBlock {
        &mut self.block
    }
}

impl Readable for GrowableBuffer {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.block.read_into(buf))
    }
}

impl Writable for GrowableBuffer {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.block.write_from(data))
    }
}

impl Seekable for GrowableBuffer {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        Ok(self.block.seek_to(offset, origin))
    }

    fn tell(&self) -> u64 {
        self.block.cursor as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ZeroStream;

    #[test]
    fn test_block_write_clamps_to_capacity() {
        let mut block = MemoryBlock::with_capacity(4);
        assert_eq!(block.write(b"abcdef").unwrap(), 4);
        assert_eq!(block.size(), 4);
        assert_eq!(block.tell(), 4);
        assert_eq!(block.write(b"g").unwrap(), 0);
        assert_eq!(block.data(), b"abcd");
    }

    #[test]
    fn test_block_read_stops_at_end() {
        let mut block = MemoryBlock::with_capacity(16);
        block.write(b"hello").unwrap();
        block.seek(0, Origin::Begin).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(block.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert!(block.eof());
        assert_eq!(block.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_block_seek_clamps_to_size() {
        let mut block = MemoryBlock::new(&b"0123456789"[..]);
        assert_eq!(block.seek(4, Origin::Begin).unwrap(), 4);
        assert_eq!(block.seek(3, Origin::Current).unwrap(), 7);
        assert_eq!(block.seek(-2, Origin::End).unwrap(), 8);
        assert_eq!(block.seek(100, Origin::Begin).unwrap(), 10);
        assert_eq!(block.seek(-100, Origin::Current).unwrap(), 0);
        assert_eq!(block.unread(), b"0123456789");
    }

    #[test]
    fn test_block_overwrite_keeps_end() {
        let mut block = MemoryBlock::with_capacity(8);
        block.write(b"abcdef").unwrap();
        block.seek(1, Origin::Begin).unwrap();
        block.write(b"XY").unwrap();
        assert_eq!(block.size(), 6);
        assert_eq!(block.data(), b"aXYdef");
    }

    #[test]
    fn test_block_truncate() {
        let mut block = MemoryBlock::with_capacity(8);
        block.write(b"abcdef").unwrap();
        block.truncate(3);
        assert_eq!(block.size(), 3);
        assert_eq!(block.tell(), 3);
        block.truncate(100);
        assert_eq!(block.size(), 8);
    }

    #[test]
    fn test_block_skip_write() {
        let mut block = MemoryBlock::with_capacity(8);
        assert_eq!(block.skip_write(5), 5);
        assert_eq!(block.size(), 5);
        assert_eq!(block.skip_write(5), 3);
        assert_eq!(block.size(), 8);
    }

    #[test]
    fn test_block_borrowed_storage() {
        let mut storage = [0u8; 6];
        {
            let mut block = MemoryBlock::empty(&mut storage[..]);
            block.write(b"abc").unwrap();
            assert_eq!(block.size(), 3);
        }
        assert_eq!(&storage[..3], b"abc");
    }

    #[test]
    fn test_block_fill_from() {
        let mut block = MemoryBlock::with_capacity(6);
        block.write(b"ab").unwrap();
        block.seek(0, Origin::Begin).unwrap();

        let mut src = ZeroStream::new();
        assert_eq!(block.fill_from(&mut src).unwrap(), 4);
        assert_eq!(block.tell(), 0);
        assert_eq!(block.size(), 6);
        assert_eq!(block.data(), b"ab\0\0\0\0");
        assert_eq!(block.fill_from(&mut src).unwrap(), 0);
    }

    #[test]
    fn test_growable_set_capacity_copy() {
        let mut buf = GrowableBuffer::with_capacity(4);
        buf.write(b"abcd").unwrap();
        buf.seek(2, Origin::Begin).unwrap();

        buf.set_capacity(8, true);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.size(), 4);
        assert_eq!(buf.tell(), 2);
        assert_eq!(buf.data(), b"abcd");

        buf.set_capacity(3, true);
        assert_eq!(buf.size(), 3);
        assert_eq!(buf.tell(), 2);
        assert_eq!(buf.data(), b"abc");
    }

    #[test]
    fn test_growable_set_capacity_discard() {
        let mut buf = GrowableBuffer::with_capacity(4);
        buf.write(b"abcd").unwrap();
        buf.set_capacity(16, false);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.size(), 0);
        assert_eq!(buf.tell(), 0);
    }

    #[test]
    fn test_growable_append_grows() {
        let mut buf = GrowableBuffer::new();
        assert_eq!(buf.write(b"x").unwrap(), 0);
        assert_eq!(buf.append(b"hello"), 5);
        assert_eq!(buf.append(b" world"), 6);
        assert!(buf.capacity() >= 11);
        assert_eq!(buf.into_vec(), b"hello world");
    }

    #[test]
    fn test_growable_clone_is_deep() {
        let mut a = GrowableBuffer::with_capacity(4);
        a.write(b"ab").unwrap();
        let mut b = a.clone();
        b.seek(0, Origin::Begin).unwrap();
        b.write(b"Z").unwrap();
        assert_eq!(a.data(), b"ab");
        assert_eq!(b.data(), b"Zb");
    }
}
