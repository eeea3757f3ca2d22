//! Integrity audits.

use std::io::{self, BufRead};

use clap::{Args, Subcommand};
use tracing::info;

use barrow::{BlobId, Db, Error, blob_paranoia, util};

/// End-to-end integrity audits
#[derive(Args, Debug)]
pub struct ParanoiaArgs {
    #[command(subcommand)]
    target: ParanoiaTarget,
}

#[derive(Subcommand, Debug)]
enum ParanoiaTarget {
    /// Fully download, decrypt, decompress and re-hash blobs.
    ///
    /// Reads blob ids in hex from stdin, one per line. For example:
    /// `sqlite3 ~/.barrow.db "SELECT DISTINCT hex(blob_id) FROM
    /// blob_entries WHERE compression_alg = 'zstd'" | barrow paranoia blob
    /// offsite` if, for some reason, you didn't trust zstd.
    Blob {
        /// Label of the storage destination to audit against
        label: String,
    },
}

pub fn run(db: &Db, args: ParanoiaArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match args.target {
        ParanoiaTarget::Blob { label } => blobs_from_stdin(db, &label),
    }
}

fn blobs_from_stdin(db: &Db, label: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("reading blob ids (hex, one per line) from stdin");
    let lines: Vec<String> = io::stdin()
        .lock()
        .lines()
        .collect::<Result<_, _>>()?;

    let total = lines.iter().filter(|l| !l.is_empty()).count();
    let mut done = 0usize;
    let mut bytes = 0u64;
    for line in &lines {
        if line.is_empty() {
            continue;
        }
        if line.len() != 64 {
            return Err(Error::Invalid(format!(
                "expected 64 hex characters per line, got {}",
                line.len()
            ))
            .into());
        }
        let blob = BlobId::from_hex(line)?;
        bytes += blob_paranoia(db, &blob, label)?;
        done += 1;
        info!(
            "verified {done} of {total} blobs, {} bytes downloaded",
            util::format_commas(bytes)
        );
    }
    Ok(())
}
