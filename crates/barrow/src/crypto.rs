//! Blob stream cipher.
//!
//! Blobs are encrypted with AES-128-CTR where the keystream position is the
//! absolute byte offset within the blob. That makes decryption stateless:
//! any slice of a blob can be decrypted independently, provided the caller
//! supplies the offset truthfully. The tail padding continues the layout
//! under its own key starting at the end of the last entry.

use std::io::{self, Read};

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use ctr::Ctr128BE;

use crate::id::Key128;

type Aes128Ctr = Ctr128BE<Aes128>;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Reader adapter applying the keystream to everything read through it.
/// Output length always equals input length.
pub struct CipherReader<R> {
    inner: R,
    cipher: Aes128Ctr,
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

fn keystream_at(key: &Key128, offset: u64) -> Aes128Ctr {
    let mut cipher = Aes128Ctr::new(
        GenericArray::from_slice(key.as_slice()),
        GenericArray::from_slice(&ZERO_IV),
    );
    cipher.seek(offset);
    cipher
}

/// Decrypt a blob slice beginning at `offset` bytes into the blob.
pub fn decrypt_blob_entry<R: Read>(src: R, offset: u64, key: &Key128) -> CipherReader<R> {
    CipherReader {
        inner: src,
        cipher: keystream_at(key, offset),
    }
}

/// Encrypt plaintext destined for `offset` bytes into the blob. CTR is an
/// XOR with the keystream, so this is the same transform as decryption.
pub fn encrypt_blob_entry<R: Read>(src: R, offset: u64, key: &Key128) -> CipherReader<R> {
    decrypt_blob_entry(src, offset, key)
}
