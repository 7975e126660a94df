//! `moniker patch`: transactional edit of a file through the stream cache.
//!
//! The file is staged in a memory stream so the edit can be reverted. On
//! commit the staged content replaces the file and is synced to disk.

use anyhow::Context;
use moniker_core::{FileStream, MemoryStream, SeekWhence, Stream, StreamCache};

use crate::cli::args::PatchArgs;
use crate::exit_codes::SUCCESS;

pub fn run(args: PatchArgs) -> anyhow::Result<i32> {
    let config = args.cache.config();
    let original = std::fs::read(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;

    let staging = MemoryStream::from_bytes(original);
    let mut cache = StreamCache::new(staging.clone(), &config)?;

    let offset = i64::try_from(args.offset).context("offset out of range")?;
    cache.seek(offset, SeekWhence::Start)?;
    cache.write(args.data.as_bytes())?;

    if args.revert {
        cache.revert()?;
        println!(
            "discarded {} bytes at offset {}",
            args.data.len(),
            args.offset
        );
    } else {
        cache.commit()?;

        let mut file = FileStream::open(&args.path)
            .with_context(|| format!("failed to open {}", args.path.display()))?;
        file.truncate(0)?;
        file.write(&staging.committed())?;
        file.commit()?;
        tracing::debug!(path = %args.path.display(), size = staging.len(), "patched file");

        println!("wrote {} bytes at offset {}", args.data.len(), args.offset);
    }

    if args.cache.stats {
        eprintln!("{}", serde_json::to_string(&cache.stats())?);
    }
    Ok(SUCCESS)
}
