//! Stream stored contents to stdout.

use std::io;

use clap::Args;

use barrow::{Db, Hash256, util};

/// Stream the contents stored for a hash to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Content hash, 64 hex characters
    hash: String,
}

pub fn run(db: &mut Db, args: CatArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let hash = Hash256::from_hex(&args.hash)?;
    let stream = barrow::cat(db, &hash)?;
    util::copy(stream, io::stdout().lock())?;
    Ok(())
}
