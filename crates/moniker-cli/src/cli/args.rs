use clap::{Args, Parser, Subcommand};
use moniker_core::CacheConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "moniker",
    version,
    about = "Inspect moniker names and run files through the stream cache"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a moniker name and print its chain, root first
    Parse(ParseArgs),
    /// Read a file through the stream cache to stdout
    Cat(CatArgs),
    /// Write bytes into a file through the stream cache
    Patch(PatchArgs),
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Full moniker name, e.g. "OAFIID:Demo_Folder!notes#cache:"
    pub name: String,

    /// Print the chain as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CatArgs {
    /// File to read
    pub path: PathBuf,

    /// Start reading at this byte offset
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Read at most this many bytes (default: to end of file)
    #[arg(long)]
    pub length: Option<u64>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// File to modify
    pub path: PathBuf,

    /// Byte offset to write at
    #[arg(long)]
    pub offset: u64,

    /// Text to write
    #[arg(long)]
    pub data: String,

    /// Revert instead of committing; the file is left untouched
    #[arg(long)]
    pub revert: bool,

    #[command(flatten)]
    pub cache: CacheArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Bytes per cache line (power of two)
    #[arg(long, env = "MONIKER_CACHE_PAGE_SIZE")]
    pub page_size: Option<usize>,

    /// Number of cache lines (power of two)
    #[arg(long, env = "MONIKER_CACHE_LINES")]
    pub lines: Option<usize>,

    /// Print cache statistics to stderr as JSON
    #[arg(long)]
    pub stats: bool,
}

impl CacheArgs {
    pub fn config(&self) -> CacheConfig {
        let mut config = CacheConfig::default();
        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(lines) = self.lines {
            config = config.with_lines(lines);
        }
        config
    }
}
