//! Fixed-block I/O adapters.
//!
//! Some devices only transfer whole blocks. [`BlockReader`] pulls the inner
//! stream one block at a time and serves arbitrary reads from it;
//! [`BlockWriter`] collects writes and forwards them in whole blocks.

use tracing::warn;

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use crate::stream::{Readable, Writable};
use crate::util::write_fully;

fn check_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(Error::InvalidConfig("block_size must be > 0".into()));
    }
    Ok(())
}

/// Reads the inner stream in requests of exactly `block_size` bytes.
///
/// The first short block marks the end of the data.
pub struct BlockReader<S> {
    inner: S,
    block: MemoryBlock,
}

impl<S: Readable> BlockReader<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        let mut block = MemoryBlock::with_capacity(block_size);
        // Start "exhausted" so the first read pulls a block.
        block.skip_write(block_size);
        Ok(BlockReader { inner, block })
    }

    /// Returns the block size.
    pub fn block_size(&self) -> usize {
        self.block.capacity()
    }

    /// Size of the block currently held.
    pub fn current_block_size(&self) -> usize {
        self.block.size()
    }

    /// Reads the next block from the inner stream, discarding whatever is
    /// left of the current one. Returns true if a whole block was read.
    pub fn read_next_block(&mut self) -> Result<bool> {
        self.block.truncate(0);
        let n = self.block.fill_from(&mut self.inner)?;
        self.block.rewind();
        Ok(n == self.block.capacity())
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Readable> Readable for BlockReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            if self.block.eof() {
                // Only a whole block means there may be more.
                if self.block.size() < self.block.capacity() {
                    break;
                }
                self.read_next_block()?;
                if self.block.size() == 0 {
                    break;
                }
            }
            total += self.block.read(&mut buf[total..])?;
        }
        Ok(total)
    }
}

/// Writes the inner stream in requests of exactly `block_size` bytes.
///
/// A trailing partial block is written by [`flush`](Writable::flush) or on
/// drop.
pub struct BlockWriter<S: Writable> {
    inner: S,
    block: MemoryBlock,
}

impl<S: Writable> BlockWriter<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        Ok(BlockWriter {
            inner,
            block: MemoryBlock::with_capacity(block_size),
        })
    }

    /// Returns the block size.
    pub fn block_size(&self) -> usize {
        self.block.capacity()
    }

    fn write_block(&mut self) -> Result<()> {
        let size = self.block.size();
        if size == 0 {
            return Ok(());
        }
        let written = write_fully(&mut self.inner, self.block.data())?;
        self.block.truncate(0);
        if written != size {
            return Err(Error::ShortWrite {
                expected: size,
                written,
            });
        }
        Ok(())
    }
}

impl<S: Writable> Writable for BlockWriter<S> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let block_size = self.block.capacity();
        let mut written = 0;

        // Top up a started block first.
        if self.block.size() > 0 {
            written += self.block.write(data)?;
            if self.block.size() < block_size {
                return Ok(written);
            }
            self.write_block()?;
        }

        // Whole blocks go straight through.
        let whole = (data.len() - written) / block_size * block_size;
        if whole > 0 {
            let n = write_fully(&mut self.inner, &data[written..written + whole])?;
            written += n;
            if n != whole {
                return Ok(written);
            }
        }

        written += self.block.write(&data[written..])?;
        Ok(written)
    }

    fn flush(&mut self) -> Result<()> {
        self.write_block()?;
        self.inner.flush()
    }
}

impl<S: Writable> Drop for BlockWriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.write_block() {
            warn!("block writer dropped: {}", e);
        }
    }
}
