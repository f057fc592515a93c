//! Pipeline configuration file.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use teas_iostream::{AsyncOptions, BufferOptions};

/// Layer settings, loadable from JSON.
///
/// ```json
/// { "buffer": { "capacity": 65536 }, "async": { "block_size": 8192, "max_blocks": 8 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub buffer: BufferOptions,
    #[serde(rename = "async")]
    pub async_io: AsyncOptions,
}

impl PipelineConfig {
    /// Loads the config at `path`, or the defaults when there is none.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn validate(&self) -> teas_iostream::Result<()> {
        self.buffer.validate()?;
        self.async_io.validate()
    }
}
