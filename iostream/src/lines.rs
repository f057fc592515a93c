//! Line iteration over a readable stream.

use crate::error::Result;
use crate::stream::Readable;

/// Iterator over the lines of a stream.
///
/// Lines are split on a terminator (`\n` by default, `\r\n` works too)
/// which is not included in the item. An empty terminator never matches.
/// A final line without terminator is still yielded. Bytes are pulled one
/// at a time, so wrap unbuffered sources in a
/// [`BufferedStream`](crate::BufferedStream) first.
///
/// ```
/// use teas_iostream::{Lines, MemoryBlock};
///
/// let text = MemoryBlock::new(&b"one\ntwo\nthree"[..]);
/// let lines: Vec<String> = Lines::new(text).map(|l| l.unwrap()).collect();
/// assert_eq!(lines, ["one", "two", "three"]);
/// ```
pub struct Lines<S> {
    inner: S,
    terminator: Vec<u8>,
    pending: Vec<u8>,
    chunk: [u8; 1],
    done: bool,
}

impl<S: Readable> Lines<S> {
    /// Splits on `\n`.
    pub fn new(inner: S) -> Self {
        Self::with_terminator(inner, b"\n")
    }

    /// Splits on `terminator`.
    pub fn with_terminator(inner: S, terminator: &[u8]) -> Self {
        Lines {
            inner,
            terminator: terminator.to_vec(),
            pending: Vec::new(),
            chunk: [0],
            done: false,
        }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            // One byte at a time: nothing past the terminator is consumed.
            if self.inner.read(&mut self.chunk)? == 0 {
                self.done = true;
                if self.pending.is_empty() {
                    return Ok(None);
                }
                break;
            }
            self.pending.push(self.chunk[0]);
            if !self.terminator.is_empty() && self.pending.ends_with(&self.terminator) {
                self.pending.truncate(self.pending.len() - self.terminator.len());
                break;
            }
        }
        let line = String::from_utf8(std::mem::take(&mut self.pending))?;
        Ok(Some(line))
    }
}

impl<S: Readable> Iterator for Lines<S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
