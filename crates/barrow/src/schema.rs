//! Metadata database schema.
//!
//! The relational schema is the sole persisted state the engine owns. Its
//! constraints are authoritative: readers must not assume anything beyond
//! what the checks guarantee (a `final_size` of 0 is legal, empty files
//! exist, a blob may have no entries at all).

use rusqlite::Connection;

/// Create all tables and indexes.
pub fn create_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS hashes (
            hash BLOB    NOT NULL PRIMARY KEY, -- sha256 of contents
            size INTEGER NOT NULL,

            CHECK(LENGTH(hash) == 32),
            CHECK(size >= 0) -- empty files exist and are deduplicated too
        );
        CREATE INDEX IF NOT EXISTS hashes_by_size ON hashes(size);

        CREATE TABLE IF NOT EXISTS files (
            path        TEXT    NOT NULL, -- path on disk
            hash        BLOB    NOT NULL,
            start       INTEGER NOT NULL, -- when this version appeared
            end         INTEGER,          -- when it was superseded; NULL = live
            fs_modified INTEGER NOT NULL, -- opaque filesystem timestamp, unit unknown

            UNIQUE(path, start),
            CHECK(LENGTH(path) > 0),
            CHECK(LENGTH(hash) == 32),
            CHECK(start > 0),
            CHECK(end IS NULL OR end > start),
            CHECK(fs_modified > 0),

            FOREIGN KEY(hash) REFERENCES hashes(hash) ON UPDATE RESTRICT ON DELETE RESTRICT
        );
        CREATE INDEX IF NOT EXISTS files_by_hash ON files(hash);
        CREATE INDEX IF NOT EXISTS files_by_path ON files(path);
        CREATE UNIQUE INDEX IF NOT EXISTS files_by_path_and_end ON files(path, end) WHERE end IS NOT NULL;
        -- at most one live version per path, and WHERE path=? AND end IS NULL is an index lookup
        CREATE UNIQUE INDEX IF NOT EXISTS files_by_path_curr ON files(path) WHERE end IS NULL;

        CREATE TABLE IF NOT EXISTS blobs (
            blob_id        BLOB    NOT NULL PRIMARY KEY, -- random
            encryption_key BLOB    NOT NULL, -- keystream key for every entry
            padding_key    BLOB    NOT NULL, -- keystream key for the zero tail
            size           INTEGER NOT NULL, -- padding + sum of entry sizes; same pre and post encryption
            hash_pre_enc   BLOB    NOT NULL,
            hash_post_enc  BLOB    NOT NULL,

            UNIQUE(encryption_key),
            CHECK(LENGTH(blob_id) == 32),
            CHECK(LENGTH(encryption_key) == 16),
            CHECK(LENGTH(padding_key) == 16),
            CHECK(size > 0),
            CHECK(LENGTH(hash_pre_enc) == 32),
            CHECK(LENGTH(hash_post_enc) == 32)
        );

        CREATE TABLE IF NOT EXISTS blob_entries (
            hash            BLOB    NOT NULL PRIMARY KEY, -- what this entry stores
            blob_id         BLOB    NOT NULL,
            final_size      INTEGER NOT NULL, -- length in the blob, after compression
            offset          INTEGER NOT NULL, -- where in the blob this starts
            compression_alg TEXT,             -- NULL = stored uncompressed

            CHECK(final_size >= 0),
            CHECK(offset >= 0),

            FOREIGN KEY(hash)    REFERENCES hashes(hash)   ON UPDATE RESTRICT ON DELETE RESTRICT,
            FOREIGN KEY(blob_id) REFERENCES blobs(blob_id) ON UPDATE CASCADE  ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS blob_entries_by_blob_id ON blob_entries(blob_id);

        CREATE TABLE IF NOT EXISTS storage (
            storage_id     BLOB NOT NULL PRIMARY KEY,
            readable_label TEXT NOT NULL, -- operator-chosen name for this destination
            type           TEXT NOT NULL, -- backend kind, e.g. disk, http
            identifier     TEXT NOT NULL, -- kind-specific: device uuid, server url, bucket
            root_path      TEXT NOT NULL,

            UNIQUE(readable_label),
            UNIQUE(type, identifier),
            CHECK(LENGTH(storage_id) == 32),
            CHECK(LENGTH(readable_label) > 0),
            CHECK(LENGTH(type) > 0),
            CHECK(LENGTH(identifier) > 0)
        );

        CREATE TABLE IF NOT EXISTS blob_storage (
            blob_id      BLOB    NOT NULL, -- one blob may live on many storages
            storage_id   BLOB    NOT NULL,
            full_path    TEXT    NOT NULL, -- backend-local object name
            checksum     TEXT,             -- whatever checksum format the provider reports
            timestamp    INTEGER NOT NULL,

            UNIQUE(storage_id, full_path),
            CHECK(checksum IS NULL OR LENGTH(checksum) > 0),
            CHECK(timestamp > 0),

            FOREIGN KEY(blob_id) REFERENCES blobs(blob_id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(storage_id) REFERENCES storage(storage_id) ON UPDATE CASCADE ON DELETE RESTRICT
        );
        CREATE INDEX IF NOT EXISTS blob_storage_by_blob_id ON blob_storage(blob_id);
        "#,
    )
}
