//! Helpers built on the capability traits.

use crate::block_list::BlockList;
use crate::error::Result;
use crate::stream::{Origin, Readable, Seekable, Writable};

/// Scratch size used by [`copy`] and [`skip_read`].
pub const DEFAULT_COPY_BUFFER: usize = 2048;

/// Reads until `buf` is full or the stream reports no more data.
///
/// Returns the number of bytes read.
pub fn read_fully<R: Readable + ?Sized>(stream: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Writes until all of `data` is accepted or the stream accepts nothing.
///
/// Returns the number of bytes written.
pub fn write_fully<W: Writable + ?Sized>(stream: &mut W, data: &[u8]) -> Result<usize> {
    let mut total = 0;
    while total < data.len() {
        let n = stream.write(&data[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Outcome of [`copy_stream`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyResult {
    /// Bytes read from the input.
    pub total_read: u64,
    /// Bytes written to the output.
    pub total_write: u64,
    /// False if the output stopped accepting data before the input ended.
    pub success: bool,
}

/// Copies `input` into `output` through `scratch` until the input ends.
pub fn copy_stream<R, W>(input: &mut R, output: &mut W, scratch: &mut [u8]) -> Result<CopyResult>
where
    R: Readable + ?Sized,
    W: Writable + ?Sized,
{
    let mut result = CopyResult {
        success: true,
        ..Default::default()
    };
    loop {
        let n = input.read(scratch)?;
        if n == 0 {
            break;
        }
        result.total_read += n as u64;
        let written = write_fully(output, &scratch[..n])?;
        result.total_write += written as u64;
        if written != n {
            result.success = false;
            break;
        }
    }
    Ok(result)
}

/// [`copy_stream`] with a [`DEFAULT_COPY_BUFFER`] byte scratch buffer.
pub fn copy<R, W>(input: &mut R, output: &mut W) -> Result<CopyResult>
where
    R: Readable + ?Sized,
    W: Writable + ?Sized,
{
    let mut scratch = [0u8; DEFAULT_COPY_BUFFER];
    copy_stream(input, output, &mut scratch)
}

/// Skips `n` bytes by reading and discarding them.
///
/// Returns the number of bytes skipped, less than `n` if the stream ended.
pub fn skip_read<R: Readable + ?Sized>(stream: &mut R, n: u64) -> Result<u64> {
    let mut scratch = [0u8; DEFAULT_COPY_BUFFER];
    let mut skipped = 0;
    while skipped < n {
        let want = (n - skipped).min(scratch.len() as u64) as usize;
        let got = stream.read(&mut scratch[..want])?;
        if got == 0 {
            break;
        }
        skipped += got as u64;
    }
    Ok(skipped)
}

/// Skips `n` bytes by seeking forward. Returns the distance moved.
pub fn skip_seek<S: Seekable + ?Sized>(stream: &mut S, n: u64) -> Result<u64> {
    let before = stream.tell();
    let offset = i64::try_from(n).unwrap_or(i64::MAX);
    let after = stream.seek(offset, Origin::Current)?;
    Ok(after.saturating_sub(before))
}

/// Reads everything left in `stream`.
pub fn read_to_end<R: Readable + ?Sized>(stream: &mut R) -> Result<Vec<u8>> {
    let mut list = BlockList::new();
    copy(stream, &mut list)?;
    Ok(list.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{GrowableBuffer, MemoryBlock};
    use crate::stream::{NullStream, ZeroStream};

    /// Yields at most `chunk` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Readable for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.chunk).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_fully_across_short_reads() {
        let data: Vec<u8> = (0..100).collect();
        let mut src = Trickle { data: &data, chunk: 7 };
        let mut buf = [0u8; 60];
        assert_eq!(read_fully(&mut src, &mut buf).unwrap(), 60);
        assert_eq!(&buf[..], &data[..60]);

        let mut rest = [0u8; 60];
        assert_eq!(read_fully(&mut src, &mut rest).unwrap(), 40);
    }

    #[test]
    fn test_write_fully_stops_when_full() {
        let mut block = MemoryBlock::with_capacity(5);
        assert_eq!(write_fully(&mut block, b"abcdefgh").unwrap(), 5);
    }

    #[test]
    fn test_copy_stream() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let mut src = Trickle { data: &data, chunk: 333 };
        let mut dst = GrowableBuffer::new();
        dst.set_capacity(10_000, false);

        let result = copy(&mut src, &mut dst).unwrap();
        assert!(result.success);
        assert_eq!(result.total_read, 10_000);
        assert_eq!(result.total_write, 10_000);
        assert_eq!(dst.data(), &data[..]);
    }

    #[test]
    fn test_copy_stream_short_sink() {
        let mut src = ZeroStream::new();
        let mut dst = MemoryBlock::with_capacity(100);
        let mut scratch = [0u8; 64];
        let result = copy_stream(&mut src, &mut dst, &mut scratch).unwrap();
        assert!(!result.success);
        assert_eq!(result.total_read, 128);
        assert_eq!(result.total_write, 100);
    }

    #[test]
    fn test_skip_read() {
        let data: Vec<u8> = (0..50).collect();
        let mut src = Trickle { data: &data, chunk: 9 };
        assert_eq!(skip_read(&mut src, 20).unwrap(), 20);
        let mut b = [0u8; 1];
        src.read(&mut b).unwrap();
        assert_eq!(b[0], 20);
        assert_eq!(skip_read(&mut src, 1000).unwrap(), 29);
        assert_eq!(skip_read(&mut NullStream::new(), 5).unwrap(), 0);
    }

    #[test]
    fn test_skip_seek() {
        let mut block = MemoryBlock::new(&b"0123456789"[..]);
        assert_eq!(skip_seek(&mut block, 4).unwrap(), 4);
        assert_eq!(block.tell(), 4);
        assert_eq!(skip_seek(&mut block, 100).unwrap(), 6);
    }

    #[test]
    fn test_read_to_end() {
        let data: Vec<u8> = (0..=255).cycle().take(20_000).collect();
        let mut src = Trickle { data: &data, chunk: 1000 };
        assert_eq!(read_to_end(&mut src).unwrap(), data);
    }
}
