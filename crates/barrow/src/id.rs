//! Fixed-size identifier types for database and wire values.
//!
//! The schema stores three kinds of fixed-length blobs: 32-byte SHA-256
//! content digests, 32-byte random identifiers, and 16-byte cipher keys.
//! Each gets a newtype so they cannot be confused with one another.

use std::array::TryFromSliceError;
use std::fmt;
use std::ops::Deref;

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::error::Error;

macro_rules! byte_id {
    ($(#[$doc:meta])* $name:ident, $len:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Parse from hex, validating the length. Malformed input is an
            /// `Invalid` error, not a panic: these arrive from the CLI.
            pub fn from_hex(s: &str) -> Result<Self, Error> {
                if s.len() != $len * 2 {
                    return Err(Error::Invalid(format!(
                        "expected {} hex characters, got {}",
                        $len * 2,
                        s.len()
                    )));
                }
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(|e| Error::Invalid(format!("invalid hex: {e}")))?;
                Ok(Self(bytes))
            }

            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            pub fn as_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = [u8; $len];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(value: [u8; $len]) -> Self {
                Self(value)
            }
        }

        impl TryFrom<Vec<u8>> for $name {
            type Error = TryFromSliceError;

            fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
                Ok(Self(bytes.as_slice().try_into()?))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.as_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.as_hex())
            }
        }
    };
}

byte_id!(
    /// SHA-256 digest of file contents, the primary key of deduplication.
    Hash256,
    32
);

byte_id!(
    /// Random identifier for a packed blob.
    BlobId,
    32
);

byte_id!(
    /// Random identifier for a storage destination.
    StorageId,
    32
);

byte_id!(
    /// AES-128 key for the blob stream cipher.
    Key128,
    16
);

impl Hash256 {
    /// Digest a byte slice in one shot.
    pub fn digest(data: &[u8]) -> Self {
        let out: [u8; 32] = Sha256::digest(data).into();
        Self(out)
    }
}

impl BlobId {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl StorageId {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl Key128 {
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}
