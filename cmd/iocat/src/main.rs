//! iocat - copy bytes through a layered stream pipeline.
//!
//! The pipeline is assembled at run time from the flags:
//!
//! ```text
//! source -> [async reader] -> buffer -> [skip] -> [limit]
//!     -> buffer -> [async writer] -> sink
//! ```

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{debug, info};

use teas_iostream::{
    AsyncReader, AsyncWriter, BufferedStream, Limited, ReadChain, StdStream, Tracked, WriteChain,
    copy_stream, skip_read,
};

mod config;

use config::PipelineConfig;

/// iocat - copy bytes through a layered stream pipeline.
#[derive(Parser)]
#[command(name = "iocat")]
#[command(about = "Copy bytes through a layered stream pipeline")]
#[command(version)]
pub struct Cli {
    /// Input file (default: stdin)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Pipeline config file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bytes to drop from the start of the input
    #[arg(long, default_value_t = 0)]
    pub skip: u64,

    /// Copy at most this many bytes
    #[arg(long)]
    pub limit: Option<u64>,

    /// Capacity of the buffering layers
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Read ahead on a worker thread
    #[arg(long)]
    pub async_read: bool,

    /// Write behind on a worker thread
    #[arg(long)]
    pub async_write: bool,

    /// Block size of the async layers
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Queue depth of the async layers
    #[arg(long)]
    pub max_blocks: Option<usize>,

    /// Verbose output (to stderr)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if let Some(size) = self.buffer_size {
            config.buffer.capacity = size;
        }
        if let Some(size) = self.block_size {
            config.async_io.block_size = size;
        }
        if let Some(depth) = self.max_blocks {
            config.async_io.max_blocks = depth;
        }
        config.validate().context("invalid pipeline config")?;
        Ok(config)
    }
}

fn open_input(cli: &Cli, config: &PipelineConfig) -> anyhow::Result<ReadChain> {
    let mut chain = match &cli.input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("open input {}", path.display()))?;
            ReadChain::new(StdStream::new(file))
        }
        None => ReadChain::new(StdStream::new(io::stdin())),
    };
    if cli.async_read {
        let opts = config.async_io;
        chain.push_new(|link| AsyncReader::new(link, opts))?;
    }
    let opts = config.buffer;
    chain.push_new(|link| BufferedStream::with_options(Tracked::new(link), opts))?;
    debug!("input chain has {} layers", chain.len());
    Ok(chain)
}

fn open_output(cli: &Cli, config: &PipelineConfig) -> anyhow::Result<WriteChain> {
    let mut chain = match &cli.output {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("create output {}", path.display()))?;
            WriteChain::new(StdStream::new(file))
        }
        None => WriteChain::new(StdStream::new(io::stdout())),
    };
    if cli.async_write {
        let opts = config.async_io;
        chain.push_new(|link| AsyncWriter::new(link, opts))?;
    }
    let opts = config.buffer;
    chain.push_new(|link| BufferedStream::with_options(Tracked::new(link), opts))?;
    debug!("output chain has {} layers", chain.len());
    Ok(chain)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }

    let config = cli.pipeline_config()?;
    let mut input = open_input(&cli, &config)?;
    let mut output = open_output(&cli, &config)?;

    if cli.skip > 0 {
        let skipped = skip_read(&mut input, cli.skip).context("skip input")?;
        debug!("skipped {} bytes", skipped);
    }
    if let Some(limit) = cli.limit {
        input.push_new(|link| Ok(Limited::new(link, limit)))?;
    }

    let mut scratch = vec![0u8; config.buffer.capacity];
    let result = copy_stream(&mut input, &mut output, &mut scratch).context("copy")?;

    input.close();
    output.close().context("flush output")?;

    info!(
        "copied {} bytes ({} read)",
        result.total_write, result.total_read
    );
    if !result.success {
        bail!(
            "output accepted {} of {} bytes",
            result.total_write,
            result.total_read
        );
    }
    Ok(())
}
