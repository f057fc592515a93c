//! Unbounded heap stream built from a list of memory blocks.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::memory::MemoryBlock;
use crate::stream::{Origin, Readable, Seekable, Writable, resolve_clamped};

/// Block size limits for [`BlockList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockListOptions {
    /// Smallest block allocated on growth.
    pub min_block_size: usize,
    /// Largest block allocated on growth.
    pub max_block_size: usize,
}

impl Default for BlockListOptions {
    fn default() -> Self {
        Self {
            min_block_size: 1024,
            max_block_size: 8192,
        }
    }
}

impl BlockListOptions {
    /// Sets the minimum block size.
    pub fn with_min_block_size(mut self, size: usize) -> Self {
        self.min_block_size = size;
        self
    }

    /// Sets the maximum block size.
    pub fn with_max_block_size(mut self, size: usize) -> Self {
        self.max_block_size = size;
        self
    }

    /// Checks `0 < min_block_size <= max_block_size`.
    pub fn validate(&self) -> Result<()> {
        if self.min_block_size == 0 {
            return Err(Error::InvalidConfig("min_block_size must be > 0".into()));
        }
        if self.min_block_size > self.max_block_size {
            return Err(Error::InvalidConfig(format!(
                "min_block_size {} > max_block_size {}",
                self.min_block_size, self.max_block_size
            )));
        }
        Ok(())
    }
}

/// A growable stream stored as an ordered list of fixed blocks.
///
/// Writing past the last block appends a new block sized from the remaining
/// request, rounded up to a multiple of 4 and clamped into
/// `[min_block_size, max_block_size]`. Existing blocks are never moved, so
/// growth never copies data.
///
/// # Example
///
/// ```
/// use teas_iostream::{BlockList, Origin, Readable, Seekable, Writable};
///
/// let mut list = BlockList::new();
/// list.write(&[7u8; 3000]).unwrap();
/// assert_eq!(list.size(), 3000);
///
/// list.seek(0, Origin::Begin).unwrap();
/// let mut out = vec![0u8; 3000];
/// assert_eq!(list.read(&mut out).unwrap(), 3000);
/// ```
#[derive(Debug, Clone)]
pub struct BlockList {
    blocks: Vec<MemoryBlock>,
    current: usize,
    min_block_size: usize,
    max_block_size: usize,
}

impl Default for BlockList {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockList {
    /// Creates an empty list with default block sizes.
    pub fn new() -> Self {
        let opts = BlockListOptions::default();
        BlockList {
            blocks: Vec::new(),
            current: 0,
            min_block_size: opts.min_block_size,
            max_block_size: opts.max_block_size,
        }
    }

    /// Creates an empty list with the given block sizes.
    pub fn with_options(opts: BlockListOptions) -> Result<Self> {
        opts.validate()?;
        Ok(BlockList {
            blocks: Vec::new(),
            current: 0,
            min_block_size: opts.min_block_size,
            max_block_size: opts.max_block_size,
        })
    }

    /// Returns the minimum block size.
    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }

    /// Returns the maximum block size.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Sets the minimum block size, raising the maximum if needed.
    ///
    /// Affects only blocks allocated afterwards.
    pub fn set_min_block_size(&mut self, size: usize) {
        self.min_block_size = size.max(1);
        self.max_block_size = self.max_block_size.max(self.min_block_size);
    }

    /// Sets the maximum block size, lowering the minimum if needed.
    ///
    /// Affects only blocks allocated afterwards.
    pub fn set_max_block_size(&mut self, size: usize) {
        self.max_block_size = size.max(1);
        self.min_block_size = self.min_block_size.min(self.max_block_size);
    }

    /// Returns the number of allocated blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the total content size.
    pub fn size(&self) -> usize {
        self.blocks.iter().map(MemoryBlock::size).sum()
    }

    /// Returns the total allocated storage.
    pub fn capacity(&self) -> usize {
        self.blocks.iter().map(MemoryBlock::capacity).sum()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends blocks until the total capacity is at least `size`.
    pub fn reserve(&mut self, size: usize) {
        let mut capacity = self.capacity();
        while capacity < size {
            capacity += self.add_block(size - capacity);
        }
    }

    /// Drops all blocks.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.current = 0;
    }

    /// Copies the whole content into a `Vec`.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        for block in &self.blocks {
            out.extend_from_slice(block.data());
        }
        out
    }

    fn add_block(&mut self, size: usize) -> usize {
        let size = (size.saturating_add(3) / 4 * 4).clamp(self.min_block_size, self.max_block_size);
        self.blocks.push(MemoryBlock::with_capacity(size));
        size
    }

    // Moves to the block after the current (full) one for writing,
    // allocating it when the current block is the last.
    fn advance_for_write(&mut self, remaining: usize) {
        if !self.blocks.is_empty() {
            self.current += 1;
        }
        if self.current == self.blocks.len() {
            self.add_block(remaining);
        }
        self.blocks[self.current].rewind();
    }

    // Moves to the next block for reading. Fails when there is no next block
    // or it holds no data. A block is only left once it is full, so a partly
    // filled block is never followed by data.
    fn advance_for_read(&mut self) -> bool {
        match self.blocks.get(self.current + 1) {
            Some(next) if next.size() > 0 => {
                self.current += 1;
                self.blocks[self.current].rewind();
                true
            }
            _ => false,
        }
    }
}

impl Readable for BlockList {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let Some(block) = self.blocks.get_mut(self.current) else {
                break;
            };
            total += block.read(&mut buf[total..])?;
            if total < buf.len() && !self.advance_for_read() {
                break;
            }
        }
        Ok(total)
    }
}

impl Writable for BlockList {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < data.len() {
            if let Some(block) = self.blocks.get_mut(self.current) {
                written += block.write(&data[written..])?;
            }
            if written < data.len() {
                self.advance_for_write(data.len() - written);
            }
        }
        Ok(written)
    }
}

impl Seekable for BlockList {
    fn seek(&mut self, offset: i64, origin: Origin) -> Result<u64> {
        if self.blocks.is_empty() {
            return Ok(0);
        }
        let target =
            resolve_clamped(offset, origin, self.tell(), self.size() as u64) as usize;

        // Only the last non-empty block may be partly filled. The target
        // belongs to the first block that holds it or that still has room at
        // its end; past every block it is the end of the last one.
        let mut base = 0;
        let mut index = None;
        for (i, block) in self.blocks.iter().enumerate() {
            let end = base + block.size();
            if target < end || (target == end && block.size() < block.capacity()) {
                index = Some(i);
                break;
            }
            base += block.size();
        }
        let index = match index {
            Some(i) => i,
            None => {
                let last = self.blocks.len() - 1;
                base -= self.blocks[last].size();
                last
            }
        };

        self.current = index;
        self.blocks[index].seek((target - base) as i64, Origin::Begin)?;
        Ok(self.tell())
    }

    fn tell(&self) -> u64 {
        let before: usize = self.blocks[..self.current.min(self.blocks.len())]
            .iter()
            .map(MemoryBlock::size)
            .sum();
        let within = self.blocks.get(self.current).map_or(0, |b| b.tell());
        before as u64 + within
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_options_validate() {
        assert!(BlockListOptions::default().validate().is_ok());
        assert!(
            BlockListOptions::default()
                .with_min_block_size(0)
                .validate()
                .is_err()
        );
        assert!(
            BlockListOptions::default()
                .with_min_block_size(4096)
                .with_max_block_size(1024)
                .validate()
                .is_err()
        );
        assert!(BlockList::with_options(BlockListOptions::default().with_min_block_size(0)).is_err());
    }

    #[test]
    fn test_options_serde_defaults() {
        let opts: BlockListOptions = serde_json::from_str(r#"{"max_block_size": 4096}"#).unwrap();
        assert_eq!(opts.min_block_size, 1024);
        assert_eq!(opts.max_block_size, 4096);
    }

    #[test]
    fn test_block_sizing() {
        let mut list = BlockList::new();
        list.reserve(10);
        assert_eq!(list.capacity(), 1024);

        let mut list = BlockList::new();
        list.reserve(2001);
        assert_eq!(list.block_count(), 1);
        assert_eq!(list.capacity(), 2004);

        let mut list = BlockList::new();
        list.reserve(20000);
        assert_eq!(list.capacity(), 8192 * 2 + 3616);
    }

    #[test]
    fn test_write_spans_blocks() {
        let data = pattern(5000);
        let mut list = BlockList::with_options(
            BlockListOptions::default()
                .with_min_block_size(1024)
                .with_max_block_size(1024),
        )
        .unwrap();

        assert_eq!(list.write(&data).unwrap(), 5000);
        assert_eq!(list.block_count(), 5);
        assert_eq!(list.size(), 5000);
        assert_eq!(list.tell(), 5000);
        assert_eq!(list.to_vec(), data);
    }

    #[test]
    fn test_read_back_in_pieces() {
        let data = pattern(3000);
        let mut list = BlockList::new();
        list.set_max_block_size(1024);
        for chunk in data.chunks(333) {
            list.write(chunk).unwrap();
        }
        list.seek(0, Origin::Begin).unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 100];
        loop {
            let n = list.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, data);
        assert_eq!(list.tell(), 3000);
    }

    #[test]
    fn test_seek_across_blocks() {
        let data = pattern(4096);
        let mut list = BlockList::new();
        list.set_max_block_size(1024);
        list.write(&data).unwrap();

        assert_eq!(list.seek(1500, Origin::Begin).unwrap(), 1500);
        let mut buf = [0u8; 10];
        list.read(&mut buf).unwrap();
        assert_eq!(&buf, &data[1500..1510]);

        assert_eq!(list.seek(-6, Origin::End).unwrap(), 4090);
        assert_eq!(list.read(&mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], &data[4090..]);

        assert_eq!(list.seek(-100, Origin::Current).unwrap(), 3996);
        assert_eq!(list.seek(1 << 20, Origin::Begin).unwrap(), 4096);
        assert_eq!(list.seek(-1 << 20, Origin::Begin).unwrap(), 0);
    }

    #[test]
    fn test_overwrite_middle() {
        let mut list = BlockList::new();
        list.set_max_block_size(1024);
        list.write(&[1u8; 2048]).unwrap();
        list.seek(1020, Origin::Begin).unwrap();
        list.write(&[9u8; 8]).unwrap();

        assert_eq!(list.size(), 2048);
        assert_eq!(list.tell(), 1028);
        let data = list.to_vec();
        assert_eq!(&data[1018..1030], &[1, 1, 9, 9, 9, 9, 9, 9, 9, 9, 1, 1]);
    }

    #[test]
    fn test_reserved_blocks_stop_reads() {
        let mut list = BlockList::new();
        list.reserve(20000);
        assert_eq!(list.block_count(), 3);
        list.write(b"abc").unwrap();
        list.seek(0, Origin::Begin).unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(list.read(&mut buf).unwrap(), 3);
        assert_eq!(list.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_reserved_blocks_overwrite_in_place() {
        let mut list = BlockList::new();
        list.reserve(20000);
        list.write(b"abc").unwrap();
        assert_eq!(list.seek(0, Origin::End).unwrap(), 3);
        list.write(b"def").unwrap();
        assert_eq!(list.seek(0, Origin::Begin).unwrap(), 0);
        list.write(b"XXXXXX").unwrap();

        assert_eq!(list.size(), 6);
        assert_eq!(list.tell(), 6);
        assert_eq!(list.to_vec(), b"XXXXXX");
        assert_eq!(list.blocks.iter().filter(|b| b.size() > 0).count(), 1);
    }

    #[test]
    fn test_seek_to_block_boundary() {
        let mut list = BlockList::new();
        list.set_max_block_size(1024);
        list.reserve(4096);
        list.write(&[1u8; 1024]).unwrap();

        // The first block is full, so its end is the start of the next one.
        assert_eq!(list.seek(1024, Origin::Begin).unwrap(), 1024);
        assert_eq!(list.current, 1);
        list.write(b"tail").unwrap();
        list.seek(-2, Origin::End).unwrap();
        list.write(b"!!").unwrap();
        assert_eq!(list.size(), 1028);
        assert_eq!(&list.to_vec()[1020..], b"\x01\x01\x01\x01ta!!");
    }

    #[test]
    fn test_empty_list() {
        let mut list = BlockList::new();
        let mut buf = [0u8; 4];
        assert_eq!(list.read(&mut buf).unwrap(), 0);
        assert_eq!(list.seek(10, Origin::Begin).unwrap(), 0);
        assert_eq!(list.tell(), 0);
        assert!(list.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut list = BlockList::new();
        list.write(b"data").unwrap();
        list.clear();
        assert_eq!(list.size(), 0);
        assert_eq!(list.block_count(), 0);
        list.write(b"more").unwrap();
        assert_eq!(list.to_vec(), b"more");
    }

    #[test]
    fn test_block_size_setters_keep_order() {
        let mut list = BlockList::new();
        list.set_min_block_size(10000);
        assert_eq!(list.max_block_size(), 10000);
        list.set_max_block_size(512);
        assert_eq!(list.min_block_size(), 512);
    }
}
