//! Storage backend capability and registry.
//!
//! Every destination a blob can live on implements [`Storage`]. The core
//! only needs ranged reads; upload, list and delete exist for the packing
//! and maintenance paths that share the trait.

use std::io::Read;
use std::str::FromStr;

mod http;
mod local;

pub use http::HttpStorage;
pub use local::LocalDisk;

use crate::error::{Error, Result};
use crate::id::StorageId;

/// A blocking byte stream out of a backend. Dropping it releases the
/// underlying connection or file handle.
pub type SectionReader = Box<dyn Read + Send>;

pub trait Storage: Send + Sync {
    /// Stable identity, matching `storage.storage_id`.
    fn id(&self) -> StorageId;

    /// Stream bytes `[offset, offset + length)` of the named object.
    ///
    /// Implementations must deliver exactly `length` bytes or fail; partial
    /// reads are theirs to retry. Requesting past the end of the object is
    /// an error.
    fn download_section(&self, path: &str, offset: u64, length: u64) -> Result<SectionReader>;

    /// Store an object, returning the provider's checksum for it if the
    /// provider reports one.
    fn upload(&self, path: &str, data: SectionReader) -> Result<Option<String>>;

    /// All object names under this backend's root.
    fn list(&self) -> Result<Vec<String>>;

    fn delete(&self, path: &str) -> Result<()>;
}

/// Backend kind tag, the `storage.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Locally mounted filesystem.
    Disk,
    /// HTTP object server with ranged GET support.
    Http,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Disk => "disk",
            StorageKind::Http => "http",
        }
    }
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disk" => Ok(StorageKind::Disk),
            "http" => Ok(StorageKind::Http),
            other => Err(Error::Schema(format!("unknown storage type {other:?}"))),
        }
    }
}

/// Everything needed to construct a backend handle, as stored in the
/// `storage` table. `identifier` is kind-specific: a device UUID for disk,
/// a server URL for http.
#[derive(Debug, Clone)]
pub struct StorageDescriptor {
    pub storage_id: StorageId,
    pub kind: StorageKind,
    pub identifier: String,
    pub root_path: String,
}

/// Resolve a descriptor to a concrete backend handle.
pub fn connect(desc: &StorageDescriptor) -> Result<Box<dyn Storage>> {
    Ok(match desc.kind {
        StorageKind::Disk => Box::new(LocalDisk::new(desc.storage_id, &desc.root_path)),
        StorageKind::Http => Box::new(HttpStorage::new(
            desc.storage_id,
            &desc.identifier,
            &desc.root_path,
        )?),
    })
}
