//! Composable byte streams.
//!
//! This crate provides stream adapters that stack into I/O pipelines. Each
//! adapter is generic over the stream it wraps, so a pipeline built in code
//! is a concrete type with no dynamic dispatch. Runtime-assembled pipelines
//! use [`ReadChain`] and [`WriteChain`].
//!
//! # Capabilities
//!
//! A stream implements any subset of [`Readable`], [`Writable`] and
//! [`Seekable`]. An adapter offers a capability only if the stream it wraps
//! has what that capability needs. A short read or write is the normal
//! end-of-data / sink-full signal; [`Error`] is reserved for failures.
//!
//! # Building blocks
//!
//! - [`MemoryBlock`]: fixed-capacity memory stream (owned or borrowed)
//! - [`GrowableBuffer`]: owned memory stream with explicit resizing
//! - [`BlockList`]: unbounded memory stream made of blocks
//! - [`BufferedStream`]: read/write buffering over any positioned stream
//! - [`AsyncReader`] / [`AsyncWriter`]: read-ahead / write-behind on a worker thread
//! - [`ViewStream`] / [`Limited`]: windowed and size-capped sub-streams
//! - [`BlockReader`] / [`BlockWriter`]: whole-block transfers
//! - [`StdStream`] / [`IoBridge`]: `std::io` interop
//!
//! # Example
//!
//! ```
//! use teas_iostream::{AsyncOptions, AsyncReader, BufferedStream, MemoryBlock, read_to_end};
//!
//! let source = MemoryBlock::new(vec![1u8; 10_000].into_boxed_slice());
//! let reader = AsyncReader::new(source, AsyncOptions::default()).unwrap();
//! let mut buffered = BufferedStream::reader(reader);
//!
//! assert_eq!(read_to_end(&mut buffered).unwrap().len(), 10_000);
//! ```
//!
//! # Threads
//!
//! Only the async adapters spawn threads, one per adapter. Everything else
//! runs on the caller's thread.

mod async_reader;
mod async_writer;
mod block;
mod block_list;
mod buffered;
mod chain;
mod error;
mod ext;
mod lines;
mod memory;
mod queue;
mod std_io;
mod stream;
mod util;
mod view;

pub use async_reader::AsyncReader;
pub use async_writer::AsyncWriter;
pub use block::{BlockReader, BlockWriter};
pub use block_list::{BlockList, BlockListOptions};
pub use buffered::{BufferOptions, BufferedStream, Tracked};
pub use chain::{ReadChain, ReadLink, WriteChain, WriteLink};
pub use error::{Error, Result};
pub use ext::{Primitive, ReadableExt, WritableExt};
pub use lines::Lines;
pub use memory::{GrowableBuffer, MemoryBlock};
pub use queue::AsyncOptions;
pub use std_io::{IoBridge, StdStream};
pub use stream::{NullStream, Origin, Readable, Seekable, Writable, ZeroStream};
pub use util::{
    CopyResult, DEFAULT_COPY_BUFFER, copy, copy_stream, read_fully, read_to_end, skip_read,
    skip_seek, write_fully,
};
pub use view::{Limited, ViewStream};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streams_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<MemoryBlock>();
        assert_send::<GrowableBuffer>();
        assert_send::<BlockList>();
        assert_send::<BufferedStream<GrowableBuffer>>();
        assert_send::<AsyncReader<MemoryBlock>>();
        assert_send::<AsyncWriter<GrowableBuffer>>();
        assert_send::<ReadChain>();
        assert_send::<WriteChain>();
        assert_send::<ReadLink>();
        assert_send::<WriteLink>();
    }

    #[test]
    fn test_async_adapters_nest() {
        fn assert_readable<T: Readable>() {}
        fn assert_writable<T: Writable>() {}
        assert_readable::<AsyncReader<AsyncReader<MemoryBlock>>>();
        assert_writable::<AsyncWriter<BufferedStream<GrowableBuffer>>>();
        assert_readable::<BufferedStream<Tracked<AsyncReader<ReadLink>>>>();
    }
}
