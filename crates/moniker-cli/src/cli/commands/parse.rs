use moniker_core::{MonikerChain, MonikerKind};
use serde::Serialize;

use crate::cli::args::ParseArgs;
use crate::exit_codes::SUCCESS;

#[derive(Debug, Serialize)]
struct ChainReport<'a> {
    /// Canonical rendering of the whole name.
    name: String,
    segments: Vec<SegmentReport<'a>>,
}

#[derive(Debug, Serialize)]
struct SegmentReport<'a> {
    kind: MonikerKind,
    name: &'a str,
    has_parent: bool,
}

pub fn run(args: ParseArgs) -> anyhow::Result<i32> {
    let chain = MonikerChain::parse(&args.name)?;
    tracing::debug!(segments = chain.len(), "parsed moniker name");

    if args.json {
        let report = ChainReport {
            name: chain.to_string(),
            segments: chain
                .iter()
                .map(|m| SegmentReport {
                    kind: m.kind(),
                    name: m.name(),
                    has_parent: m.has_parent(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for moniker in chain.iter() {
            println!("{}\t{}", moniker.kind(), moniker.name());
        }
    }

    Ok(SUCCESS)
}
