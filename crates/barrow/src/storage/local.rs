//! Locally mounted filesystem backend.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::hasher::{Sha256Sizer, TeeReader};
use crate::id::StorageId;
use crate::util;

use super::{SectionReader, Storage};

pub struct LocalDisk {
    storage_id: StorageId,
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(storage_id: StorageId, root: impl Into<PathBuf>) -> Self {
        Self {
            storage_id,
            root: root.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for LocalDisk {
    fn id(&self) -> StorageId {
        self.storage_id
    }

    fn download_section(&self, path: &str, offset: u64, length: u64) -> Result<SectionReader> {
        let full = self.full_path(path);
        let mut file = File::open(&full)
            .map_err(|e| Error::Backend(format!("open {}: {e}", full.display())))?;
        let object_size = file.metadata()?.len();
        if offset + length > object_size {
            return Err(Error::Backend(format!(
                "range [{offset}, {}) exceeds object size {object_size} for {}",
                offset + length,
                full.display()
            )));
        }
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(file.take(length)))
    }

    fn upload(&self, path: &str, data: SectionReader) -> Result<Option<String>> {
        let full = self.full_path(path);
        let parent = full.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        // Write to a tempfile and rename, so a crash never leaves a partial
        // object at the final name.
        let temp = tempfile::NamedTempFile::new_in(parent)?;
        let sizer = Arc::new(Sha256Sizer::new());
        let tee = TeeReader::new(data, sizer.clone());
        util::copy(tee, temp.as_file())?;
        temp.as_file().sync_all()?;
        temp.persist(&full).map_err(|e| Error::Backend(e.to_string()))?;

        debug!(path, bytes = sizer.size(), "stored object");
        Ok(Some(hex::encode(sizer.finish())))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| Error::Backend(e.to_string()))?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path());
                names.push(rel.to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(self.full_path(path))?;
        Ok(())
    }
}
