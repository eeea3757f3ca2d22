//! Content retrieval: stream any stored hash back out.
//!
//! The pipeline is locate, ranged read, decrypt, decompress. Every stage is
//! a blocking reader pulling from the one before it, so backpressure comes
//! for free and nothing buffers a whole entry. No integrity checking
//! happens here; that is the paranoia path's job.

use std::io::{self, Read};

use rusqlite::Transaction;
use tracing::debug;

use crate::crypto;
use crate::db::{self, Db};
use crate::error::Result;
use crate::id::Hash256;
use crate::storage;

/// An owning composite over the backend reader, cipher and decompressor.
/// Dropping it releases the backend connection.
pub struct CatStream {
    inner: Box<dyn Read + Send>,
}

impl Read for CatStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Stream the contents stored for `hash`.
///
/// The metadata lookup runs in its own read transaction which commits
/// before this returns, so the caller can hold the stream for as long as
/// it likes without pinning a transaction.
pub fn cat(db: &mut Db, hash: &Hash256) -> Result<CatStream> {
    let tx = db.transaction()?;
    let stream = cat_in_tx(&tx, hash)?;
    tx.commit()?;
    Ok(stream)
}

/// Like [`cat`], sharing the caller's transaction for the metadata lookup.
pub fn cat_in_tx(tx: &Transaction<'_>, hash: &Hash256) -> Result<CatStream> {
    let plan = db::retrieval_plan(tx, hash)?;
    debug!(
        %hash,
        blob = %plan.blob_id,
        offset = plan.offset,
        final_size = plan.final_size,
        "resolved placement"
    );

    let backend = storage::connect(&plan.storage)?;
    let raw = backend.download_section(&plan.path, plan.offset, plan.final_size)?;
    let decrypted = crypto::decrypt_blob_entry(raw, plan.offset, &plan.key);
    let decompressed = plan.compression.decompress(Box::new(decrypted))?;

    Ok(CatStream {
        inner: decompressed,
    })
}
