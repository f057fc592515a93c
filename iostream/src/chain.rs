//! Pipelines assembled at run time.
//!
//! Generic adapters are composed at compile time: `BufferedStream<AsyncReader<S>>`
//! is a concrete type. When the layers are only known at run time (flags,
//! configuration), a [`ReadChain`] or [`WriteChain`] holds them as trait
//! objects instead.
//!
//! Each new layer is built around a link to the current outermost layer.
//! Links do not own their target; the chain owns every layer and drops them
//! outermost first, so a layer can still push pending data into the layer
//! beneath it while it is being torn down.
//!
//! # Example
//!
//! ```
//! use teas_iostream::{BufferedStream, GrowableBuffer, WriteChain, Writable};
//!
//! let mut chain = WriteChain::new(GrowableBuffer::with_capacity(64));
//! chain.push_new(|link| Ok(BufferedStream::writer(link))).unwrap();
//! chain.write(b"layered").unwrap();
//! chain.close().unwrap();
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::stream::{Readable, Writable};

type ReadLayer = Arc<Mutex<dyn Readable + Send>>;
type WriteLayer = Arc<Mutex<dyn Writable + Send>>;

/// Non-owning handle to a layer of a [`ReadChain`].
///
/// Fails with [`Error::Detached`] once the layer is gone.
#[derive(Clone)]
pub struct ReadLink {
    target: Weak<Mutex<dyn Readable + Send>>,
}

impl Readable for ReadLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let target = self.target.upgrade().ok_or(Error::Detached)?;
        let mut layer = target.lock();
        layer.read(buf)
    }
}

/// Non-owning handle to a layer of a [`WriteChain`].
///
/// Fails with [`Error::Detached`] once the layer is gone.
#[derive(Clone)]
pub struct WriteLink {
    target: Weak<Mutex<dyn Writable + Send>>,
}

impl Writable for WriteLink {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let target = self.target.upgrade().ok_or(Error::Detached)?;
        let mut layer = target.lock();
        layer.write(data)
    }

    fn flush(&mut self) -> Result<()> {
        let target = self.target.upgrade().ok_or(Error::Detached)?;
        let mut layer = target.lock();
        layer.flush()
    }
}

/// An owned stack of readable layers. Reads go to the outermost layer.
pub struct ReadChain {
    layers: Vec<ReadLayer>,
}

impl ReadChain {
    /// Starts a chain with `source` as its innermost layer.
    pub fn new<S: Readable + Send + 'static>(source: S) -> Self {
        let layer: ReadLayer = Arc::new(Mutex::new(source));
        ReadChain {
            layers: vec![layer],
        }
    }

    /// Builds a layer around a link to the current outermost layer and
    /// makes it the new outermost layer.
    pub fn push_new<L, F>(&mut self, make: F) -> Result<&mut Self>
    where
        L: Readable + Send + 'static,
        F: FnOnce(ReadLink) -> Result<L>,
    {
        let link = ReadLink {
            target: Arc::downgrade(self.outermost()),
        };
        let layer: ReadLayer = Arc::new(Mutex::new(make(link)?));
        self.layers.push(layer);
        Ok(self)
    }

    /// Adds an already built layer, handing it a link to the current
    /// outermost layer through `attach`.
    pub fn push<L, F>(&mut self, mut layer: L, attach: F) -> &mut Self
    where
        L: Readable + Send + 'static,
        F: FnOnce(&mut L, ReadLink),
    {
        let link = ReadLink {
            target: Arc::downgrade(self.outermost()),
        };
        attach(&mut layer, link);
        let layer: ReadLayer = Arc::new(Mutex::new(layer));
        self.layers.push(layer);
        self
    }

    /// Number of layers, including the source.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the chain holds no layers, which only happens once
    /// it has been torn down.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Tears the chain down, outermost layer first.
    pub fn close(mut self) {
        self.teardown();
    }

    fn outermost(&self) -> &ReadLayer {
        // The source is pushed by `new` and only `teardown` removes layers.
        &self.layers[self.layers.len() - 1]
    }

    fn teardown(&mut self) {
        while let Some(layer) = self.layers.pop() {
            drop(layer);
        }
        debug!("read chain closed");
    }
}

impl Readable for ReadChain {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut layer = self.outermost().lock();
        layer.read(buf)
    }
}

impl Drop for ReadChain {
    fn drop(&mut self) {
        if !self.layers.is_empty() {
            self.teardown();
        }
    }
}

/// An owned stack of writable layers. Writes go to the outermost layer.
pub struct WriteChain {
    layers: Vec<WriteLayer>,
}

impl WriteChain {
    /// Starts a chain with `sink` as its innermost layer.
    pub fn new<S: Writable + Send + 'static>(sink: S) -> Self {
        let layer: WriteLayer = Arc::new(Mutex::new(sink));
        WriteChain {
            layers: vec![layer],
        }
    }

    /// Builds a layer around a link to the current outermost layer and
    /// makes it the new outermost layer.
    pub fn push_new<L, F>(&mut self, make: F) -> Result<&mut Self>
    where
        L: Writable + Send + 'static,
        F: FnOnce(WriteLink) -> Result<L>,
    {
        let link = WriteLink {
            target: Arc::downgrade(self.outermost()),
        };
        let layer: WriteLayer = Arc::new(Mutex::new(make(link)?));
        self.layers.push(layer);
        Ok(self)
    }

    /// Adds an already built layer, handing it a link to the current
    /// outermost layer through `attach`.
    pub fn push<L, F>(&mut self, mut layer: L, attach: F) -> &mut Self
    where
        L: Writable + Send + 'static,
        F: FnOnce(&mut L, WriteLink),
    {
        let link = WriteLink {
            target: Arc::downgrade(self.outermost()),
        };
        attach(&mut layer, link);
        let layer: WriteLayer = Arc::new(Mutex::new(layer));
        self.layers.push(layer);
        self
    }

    /// Number of layers, including the sink.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the chain holds no layers, which only happens once
    /// it has been torn down.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Flushes and drops every layer, outermost first.
    ///
    /// Every layer is torn down even if one fails to flush; the first
    /// failure is returned.
    pub fn close(mut self) -> Result<()> {
        self.teardown()
    }

    fn outermost(&self) -> &WriteLayer {
        // The sink is pushed by `new` and only `teardown` removes layers.
        &self.layers[self.layers.len() - 1]
    }

    fn teardown(&mut self) -> Result<()> {
        let mut first_err = None;
        while let Some(layer) = self.layers.pop() {
            let flushed = layer.lock().flush();
            if let Err(e) = flushed {
                warn!("write chain: layer {} flush failed: {}", self.layers.len(), e);
                first_err.get_or_insert(e);
            }
            drop(layer);
        }
        debug!("write chain closed");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Writable for WriteChain {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut layer = self.outermost().lock();
        layer.write(data)
    }

    fn flush(&mut self) -> Result<()> {
        let mut layer = self.outermost().lock();
        layer.flush()
    }
}

impl Drop for WriteChain {
    fn drop(&mut self) {
        if !self.layers.is_empty() {
            // Failures are already logged per layer.
            let _ = self.teardown();
        }
    }
}
