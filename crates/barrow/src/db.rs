//! Metadata store: transactional queries over the backup schema.
//!
//! All reads that feed the retrieval pipeline take a `&Connection` so they
//! run equally well against a [`Db`] or inside a caller's transaction.
//! Values never get interpolated into SQL; everything is bound.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Transaction, params};

use crate::compression::Compression;
use crate::error::{Error, Result};
use crate::id::{BlobId, Hash256, Key128, StorageId};
use crate::schema;
use crate::storage::{StorageDescriptor, StorageKind};

/// Handle on the metadata database.
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open (creating if necessary) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path).map_err(|e| Error::Backend(e.to_string()))?)
    }

    /// Open a private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(|e| Error::Backend(e.to_string()))?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::create_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a transaction. Retrieval materializes its plan inside one and
    /// commits before the caller starts consuming the stream.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }
}

/// Everything needed to stream one entry's bytes back out, resolved in a
/// single consistent snapshot.
#[derive(Debug, Clone)]
pub struct RetrievalPlan {
    pub blob_id: BlobId,
    pub offset: u64,
    pub final_size: u64,
    pub compression: Compression,
    pub key: Key128,
    pub path: String,
    pub storage: StorageDescriptor,
}

/// Blob-level facts needed to audit one blob end to end.
#[derive(Debug, Clone)]
pub struct BlobAudit {
    pub size: u64,
    pub hash_post_enc: Hash256,
    pub encryption_key: Key128,
    pub padding_key: Key128,
}

/// One row of `blob_entries`, in verification order.
#[derive(Debug, Clone)]
pub struct BlobEntry {
    pub hash: Hash256,
    pub offset: u64,
    pub final_size: u64,
    pub compression: Compression,
}

fn hash256(bytes: Vec<u8>) -> Result<Hash256> {
    Hash256::try_from(bytes).map_err(|_| Error::Schema("hash column is not 32 bytes".into()))
}

fn blob_id(bytes: Vec<u8>) -> Result<BlobId> {
    BlobId::try_from(bytes).map_err(|_| Error::Schema("blob_id column is not 32 bytes".into()))
}

fn storage_id(bytes: Vec<u8>) -> Result<StorageId> {
    StorageId::try_from(bytes).map_err(|_| Error::Schema("storage_id column is not 32 bytes".into()))
}

fn key128(bytes: Vec<u8>) -> Result<Key128> {
    Key128::try_from(bytes).map_err(|_| Error::Schema("key column is not 16 bytes".into()))
}

/// Resolve a content hash to the placement the retrieval pipeline will
/// read. With several placements the storage with the lexicographically
/// smallest label wins; ordering in SQL keeps selection on one snapshot
/// and makes operational debugging reproducible.
pub fn retrieval_plan(conn: &Connection, hash: &Hash256) -> Result<RetrievalPlan> {
    let row = conn
        .query_row(
            r#"
            SELECT
                blob_entries.blob_id,
                blob_entries.offset,
                blob_entries.final_size,
                blob_entries.compression_alg,
                blobs.encryption_key,
                blob_storage.full_path,
                storage.storage_id,
                storage.type,
                storage.identifier,
                storage.root_path
            FROM blob_entries
                INNER JOIN blobs ON blobs.blob_id = blob_entries.blob_id
                INNER JOIN blob_storage ON blob_storage.blob_id = blobs.blob_id
                INNER JOIN storage ON storage.storage_id = blob_storage.storage_id
            WHERE blob_entries.hash = ?1
            ORDER BY storage.readable_label ASC
            LIMIT 1
            "#,
            params![hash.as_slice()],
            |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, u64>(1)?,
                    row.get::<_, u64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Vec<u8>>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, String>(9)?,
                ))
            },
        )
        .optional()?;

    let Some((blob, offset, final_size, alg, key, path, sid, kind, identifier, root_path)) = row
    else {
        return Err(Error::NotFound(format!("no placement for hash {hash}")));
    };

    Ok(RetrievalPlan {
        blob_id: blob_id(blob)?,
        offset,
        final_size,
        compression: Compression::by_name(alg.as_deref())?,
        key: key128(key)?,
        path,
        storage: StorageDescriptor {
            storage_id: storage_id(sid)?,
            kind: kind.parse::<StorageKind>()?,
            identifier,
            root_path,
        },
    })
}

/// Blob row facts for paranoia.
pub fn blob_audit(conn: &Connection, blob: &BlobId) -> Result<BlobAudit> {
    let row = conn
        .query_row(
            "SELECT size, hash_post_enc, encryption_key, padding_key FROM blobs WHERE blob_id = ?1",
            params![blob.as_slice()],
            |row| {
                Ok((
                    row.get::<_, u64>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((size, post, enc, pad)) = row else {
        return Err(Error::NotFound(format!("no such blob {blob}")));
    };

    Ok(BlobAudit {
        size,
        hash_post_enc: hash256(post)?,
        encryption_key: key128(enc)?,
        padding_key: key128(pad)?,
    })
}

/// All entries of a blob, ordered for a single forward pass. The
/// `final_size` tiebreak puts a zero-length entry before the nonzero entry
/// sharing its offset.
pub fn entries_for_blob(conn: &Connection, blob: &BlobId) -> Result<Vec<BlobEntry>> {
    let mut stmt = conn.prepare(
        "SELECT hash, offset, final_size, compression_alg
         FROM blob_entries WHERE blob_id = ?1
         ORDER BY offset ASC, final_size ASC",
    )?;
    let rows = stmt.query_map(params![blob.as_slice()], |row| {
        Ok((
            row.get::<_, Vec<u8>>(0)?,
            row.get::<_, u64>(1)?,
            row.get::<_, u64>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (hash, offset, final_size, alg) = row?;
        entries.push(BlobEntry {
            hash: hash256(hash)?,
            offset,
            final_size,
            compression: Compression::by_name(alg.as_deref())?,
        });
    }
    Ok(entries)
}

/// Resolve a storage destination by its operator-chosen label.
pub fn storage_by_label(conn: &Connection, label: &str) -> Result<StorageDescriptor> {
    let row = conn
        .query_row(
            "SELECT storage_id, type, identifier, root_path FROM storage WHERE readable_label = ?1",
            params![label],
            |row| {
                Ok((
                    row.get::<_, Vec<u8>>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((sid, kind, identifier, root_path)) = row else {
        return Err(Error::NotFound(format!("no storage labelled {label:?}")));
    };

    Ok(StorageDescriptor {
        storage_id: storage_id(sid)?,
        kind: kind.parse::<StorageKind>()?,
        identifier,
        root_path,
    })
}

/// The object name a blob was stored under on a given destination.
pub fn blob_path_on(conn: &Connection, blob: &BlobId, storage: &StorageId) -> Result<String> {
    conn.query_row(
        "SELECT full_path FROM blob_storage WHERE blob_id = ?1 AND storage_id = ?2",
        params![blob.as_slice(), storage.as_slice()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "blob {blob} was never backed up to storage {storage}"
        ))
    })
}

/// The original (uncompressed) size recorded for a content hash.
pub fn hash_size(conn: &Connection, hash: &Hash256) -> Result<Option<u64>> {
    Ok(conn
        .query_row(
            "SELECT size FROM hashes WHERE hash = ?1",
            params![hash.as_slice()],
            |row| row.get(0),
        )
        .optional()?)
}

// Write side: the packer's contract. The retrieval core never calls these,
// but fixtures and the packing path do.

pub fn insert_hash(conn: &Connection, hash: &Hash256, size: u64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO hashes (hash, size) VALUES (?1, ?2)",
        params![hash.as_slice(), size],
    )?;
    Ok(())
}

pub fn insert_file(
    conn: &Connection,
    path: &str,
    hash: &Hash256,
    start: i64,
    end: Option<i64>,
    fs_modified: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO files (path, hash, start, end, fs_modified) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![path, hash.as_slice(), start, end, fs_modified],
    )?;
    Ok(())
}

/// A new blob row. Blobs are immutable once inserted.
pub struct NewBlob {
    pub blob_id: BlobId,
    pub encryption_key: Key128,
    pub padding_key: Key128,
    pub size: u64,
    pub hash_pre_enc: Hash256,
    pub hash_post_enc: Hash256,
}

pub fn insert_blob(conn: &Connection, blob: &NewBlob) -> Result<()> {
    conn.execute(
        "INSERT INTO blobs (blob_id, encryption_key, padding_key, size, hash_pre_enc, hash_post_enc)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            blob.blob_id.as_slice(),
            blob.encryption_key.as_slice(),
            blob.padding_key.as_slice(),
            blob.size,
            blob.hash_pre_enc.as_slice(),
            blob.hash_post_enc.as_slice(),
        ],
    )?;
    Ok(())
}

pub fn insert_blob_entry(
    conn: &Connection,
    hash: &Hash256,
    blob: &BlobId,
    offset: u64,
    final_size: u64,
    compression: Compression,
) -> Result<()> {
    conn.execute(
        "INSERT INTO blob_entries (hash, blob_id, final_size, offset, compression_alg)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            hash.as_slice(),
            blob.as_slice(),
            final_size,
            offset,
            compression.name(),
        ],
    )?;
    Ok(())
}

pub fn insert_storage(conn: &Connection, desc: &StorageDescriptor, label: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO storage (storage_id, readable_label, type, identifier, root_path)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            desc.storage_id.as_slice(),
            label,
            desc.kind.as_str(),
            desc.identifier,
            desc.root_path,
        ],
    )?;
    Ok(())
}

pub fn insert_blob_storage(
    conn: &Connection,
    blob: &BlobId,
    storage: &StorageId,
    full_path: &str,
    checksum: Option<&str>,
) -> Result<()> {
    let timestamp = jiff::Timestamp::now().as_second();
    conn.execute(
        "INSERT INTO blob_storage (blob_id, storage_id, full_path, checksum, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            blob.as_slice(),
            storage.as_slice(),
            full_path,
            checksum,
            timestamp,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage(label: &str, root: &str) -> (StorageDescriptor, String) {
        (
            StorageDescriptor {
                storage_id: StorageId::random(),
                kind: StorageKind::Disk,
                identifier: format!("dev-{label}"),
                root_path: root.to_string(),
            },
            label.to_string(),
        )
    }

    fn seed_one_entry(db: &Db) -> (Hash256, BlobId, StorageDescriptor) {
        let conn = db.conn();
        let hash = Hash256::digest(b"hello");
        let blob = NewBlob {
            blob_id: BlobId::random(),
            encryption_key: Key128::random(),
            padding_key: Key128::random(),
            size: 16,
            hash_pre_enc: Hash256::digest(b"pre"),
            hash_post_enc: Hash256::digest(b"post"),
        };
        let (desc, label) = test_storage("main", "/tmp/backups");

        insert_hash(conn, &hash, 5).unwrap();
        insert_blob(conn, &blob).unwrap();
        insert_blob_entry(conn, &hash, &blob.blob_id, 0, 5, Compression::None).unwrap();
        insert_storage(conn, &desc, &label).unwrap();
        insert_blob_storage(conn, &blob.blob_id, &desc.storage_id, "objects/b1", None).unwrap();
        (hash, blob.blob_id, desc)
    }

    #[test]
    fn retrieval_plan_resolves_join() {
        let db = Db::open_in_memory().unwrap();
        let (hash, blob_id, desc) = seed_one_entry(&db);

        let plan = retrieval_plan(db.conn(), &hash).unwrap();
        assert_eq!(plan.blob_id, blob_id);
        assert_eq!(plan.offset, 0);
        assert_eq!(plan.final_size, 5);
        assert_eq!(plan.compression, Compression::None);
        assert_eq!(plan.path, "objects/b1");
        assert_eq!(plan.storage.storage_id, desc.storage_id);
        assert_eq!(plan.storage.kind, StorageKind::Disk);
    }

    #[test]
    fn retrieval_plan_misses_are_not_found() {
        let db = Db::open_in_memory().unwrap();
        let absent = Hash256::digest(b"never stored");
        assert!(matches!(
            retrieval_plan(db.conn(), &absent),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn placement_selection_prefers_smallest_label() {
        let db = Db::open_in_memory().unwrap();
        let (hash, blob_id, _) = seed_one_entry(&db);
        let conn = db.conn();

        // Insert in descending label order to prove the ORDER BY does the
        // work, not insertion order.
        let (zz, zz_label) = test_storage("zz", "/tmp/zz");
        let (aa, aa_label) = test_storage("aa", "/tmp/aa");
        insert_storage(conn, &zz, &zz_label).unwrap();
        insert_storage(conn, &aa, &aa_label).unwrap();
        insert_blob_storage(conn, &blob_id, &zz.storage_id, "zz/b1", None).unwrap();
        insert_blob_storage(conn, &blob_id, &aa.storage_id, "aa/b1", None).unwrap();

        let plan = retrieval_plan(conn, &hash).unwrap();
        assert_eq!(plan.storage.storage_id, aa.storage_id);
        assert_eq!(plan.path, "aa/b1");
    }

    #[test]
    fn entries_ordered_with_zero_length_first() {
        let db = Db::open_in_memory().unwrap();
        let conn = db.conn();
        let blob = NewBlob {
            blob_id: BlobId::random(),
            encryption_key: Key128::random(),
            padding_key: Key128::random(),
            size: 32,
            hash_pre_enc: Hash256::digest(b"a"),
            hash_post_enc: Hash256::digest(b"b"),
        };
        insert_blob(conn, &blob).unwrap();

        let empty = Hash256::digest(b"");
        let full = Hash256::digest(b"data");
        insert_hash(conn, &full, 4).unwrap();
        insert_hash(conn, &empty, 0).unwrap();
        // The nonzero entry first, to prove ordering is by the sort key.
        insert_blob_entry(conn, &full, &blob.blob_id, 0, 4, Compression::None).unwrap();
        insert_blob_entry(conn, &empty, &blob.blob_id, 0, 0, Compression::None).unwrap();

        let entries = entries_for_blob(conn, &blob.blob_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hash, empty);
        assert_eq!(entries[0].final_size, 0);
        assert_eq!(entries[1].hash, full);
    }

    #[test]
    fn blob_audit_round_trip() {
        let db = Db::open_in_memory().unwrap();
        let (_, blob_id, _) = seed_one_entry(&db);

        let audit = blob_audit(db.conn(), &blob_id).unwrap();
        assert_eq!(audit.size, 16);
        assert_eq!(audit.hash_post_enc, Hash256::digest(b"post"));

        assert!(matches!(
            blob_audit(db.conn(), &BlobId::random()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn blob_path_requires_placement() {
        let db = Db::open_in_memory().unwrap();
        let (_, blob_id, desc) = seed_one_entry(&db);

        let path = blob_path_on(db.conn(), &blob_id, &desc.storage_id).unwrap();
        assert_eq!(path, "objects/b1");

        assert!(matches!(
            blob_path_on(db.conn(), &blob_id, &StorageId::random()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn deleting_blob_cascades_to_entries_and_placements() {
        let db = Db::open_in_memory().unwrap();
        let (hash, blob_id, _) = seed_one_entry(&db);
        let conn = db.conn();

        conn.execute("DELETE FROM blobs WHERE blob_id = ?1", params![
            blob_id.as_slice()
        ])
        .unwrap();

        assert!(entries_for_blob(conn, &blob_id).unwrap().is_empty());
        assert!(matches!(
            retrieval_plan(conn, &hash),
            Err(Error::NotFound(_))
        ));
        // The hash row is retained unconditionally.
        assert_eq!(hash_size(conn, &hash).unwrap(), Some(5));
    }

    #[test]
    fn schema_rejects_wrong_length_ids() {
        let db = Db::open_in_memory().unwrap();
        let err = db
            .conn()
            .execute(
                "INSERT INTO hashes (hash, size) VALUES (?1, ?2)",
                params![&[0u8; 8][..], 1],
            )
            .unwrap_err();
        assert!(err.to_string().contains("CHECK"));
    }
}
