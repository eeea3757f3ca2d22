//! Barrow - deduplicating, encrypted, multi-destination backup engine.
//!
//! This library is the blob storage and retrieval core: the
//! content-addressable schema binding file contents to packed encrypted
//! blobs, the streaming read pipeline that materializes any stored hash
//! (locate, ranged read, decrypt, decompress), and the paranoia audit that
//! verifies a blob end to end against one backend.

pub mod cat;
pub mod compression;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod hasher;
pub mod id;
pub mod paranoia;
pub mod schema;
pub mod storage;
pub mod util;

pub use cat::{CatStream, cat, cat_in_tx};
pub use compression::{ByteStream, Compression};
pub use config::Config;
pub use crypto::{CipherReader, decrypt_blob_entry, encrypt_blob_entry};
pub use db::{BlobAudit, BlobEntry, Db, NewBlob, RetrievalPlan};
pub use error::{Corruption, Error, Result};
pub use hasher::{HasherSizer, Md5Sizer, Sha256Sizer, TeeReader};
pub use id::{BlobId, Hash256, Key128, StorageId};
pub use paranoia::{blob_paranoia, verify_blob_stream};
pub use schema::create_schema;
pub use storage::{
    HttpStorage, LocalDisk, SectionReader, Storage, StorageDescriptor, StorageKind, connect,
};
