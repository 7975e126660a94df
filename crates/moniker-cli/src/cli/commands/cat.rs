use std::io::Write;

use anyhow::Context;
use moniker_core::{FileStream, SeekWhence, Stream, StreamCache};

use crate::cli::args::CatArgs;
use crate::exit_codes::SUCCESS;

pub fn run(args: CatArgs) -> anyhow::Result<i32> {
    let config = args.cache.config();
    let file = FileStream::open_read_only(&args.path)
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    let mut cache = StreamCache::new(file, &config)?;

    let offset = i64::try_from(args.offset).context("offset out of range")?;
    cache.seek(offset, SeekWhence::Start)?;

    let chunk = cache.page_size() as u64;
    let mut remaining = args.length;
    let mut stdout = std::io::stdout().lock();

    loop {
        let want = remaining.map_or(chunk, |r| r.min(chunk));
        if want == 0 {
            break;
        }
        let data = cache.read(want as i64)?;
        if data.is_empty() {
            break;
        }
        stdout.write_all(&data).context("writing output")?;
        if let Some(r) = remaining.as_mut() {
            *r -= data.len() as u64;
        }
    }
    stdout.flush().context("writing output")?;

    if args.cache.stats {
        eprintln!("{}", serde_json::to_string(&cache.stats())?);
    }
    Ok(SUCCESS)
}
