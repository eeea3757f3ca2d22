//! Compression algorithm registry.
//!
//! Entries record the algorithm they were packed with in
//! `blob_entries.compression_alg`; this maps those names to streaming
//! codecs. Stored-uncompressed is an explicit variant rather than a null
//! string so business logic cannot forget the case.

use std::io::{self, Read};

use flate2::read::{GzDecoder, GzEncoder};

use crate::error::{Error, Result};

/// Streaming readers are boxed so pipeline stages can own their source
/// regardless of which codec produced it. The lifetime lets a stage borrow
/// an outer stream, as the verification walk does with its teed download.
pub type ByteStream<'a> = Box<dyn Read + Send + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd,
    Gzip,
}

impl Compression {
    /// Resolve a `compression_alg` column value. An unknown name means the
    /// database was written by something newer than us: a schema error.
    pub fn by_name(alg: Option<&str>) -> Result<Self> {
        match alg {
            None | Some("") => Ok(Compression::None),
            Some("zstd") => Ok(Compression::Zstd),
            Some("gzip") => Ok(Compression::Gzip),
            Some(other) => Err(Error::Schema(format!(
                "unknown compression algorithm {other:?}"
            ))),
        }
    }

    /// The value stored in `blob_entries.compression_alg`.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Zstd => Some("zstd"),
            Compression::Gzip => Some("gzip"),
        }
    }

    /// Wrap `src` in a streaming decoder. The caller is responsible for
    /// bounding `src` (entries are framed by `final_size`, not by the
    /// codec).
    pub fn decompress<'a>(&self, src: ByteStream<'a>) -> io::Result<ByteStream<'a>> {
        Ok(match self {
            Compression::None => src,
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(src)?),
            Compression::Gzip => Box::new(GzDecoder::new(src)),
        })
    }

    /// Wrap `src` in a streaming encoder, the inverse of [`decompress`].
    ///
    /// [`decompress`]: Compression::decompress
    pub fn compress<'a>(&self, src: ByteStream<'a>) -> io::Result<ByteStream<'a>> {
        Ok(match self {
            Compression::None => src,
            Compression::Zstd => Box::new(zstd::stream::read::Encoder::new(src, 0)?),
            Compression::Gzip => Box::new(GzEncoder::new(src, flate2::Compression::default())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(alg: Compression, data: &[u8]) -> Vec<u8> {
        use std::io::Cursor;

        let mut compressed = Vec::new();
        alg.compress(Box::new(Cursor::new(data.to_vec())))
            .unwrap()
            .read_to_end(&mut compressed)
            .unwrap();

        let mut out = Vec::new();
        alg.decompress(Box::new(Cursor::new(compressed)))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn by_name_mapping() {
        assert_eq!(Compression::by_name(None).unwrap(), Compression::None);
        assert_eq!(Compression::by_name(Some("")).unwrap(), Compression::None);
        assert_eq!(Compression::by_name(Some("zstd")).unwrap(), Compression::Zstd);
        assert_eq!(Compression::by_name(Some("gzip")).unwrap(), Compression::Gzip);
        assert!(matches!(
            Compression::by_name(Some("lz77")),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn names_round_trip() {
        for alg in [Compression::None, Compression::Zstd, Compression::Gzip] {
            assert_eq!(Compression::by_name(alg.name()).unwrap(), alg);
        }
    }

    #[test]
    fn zstd_round_trip() {
        let data = b"zstd zstd zstd zstd zstd zstd zstd".repeat(64);
        assert_eq!(round_trip(Compression::Zstd, &data), data);
    }

    #[test]
    fn gzip_round_trip() {
        let data = b"gzip gzip gzip gzip".repeat(128);
        assert_eq!(round_trip(Compression::Gzip, &data), data);
    }

    #[test]
    fn none_is_passthrough() {
        let data = b"plain bytes".to_vec();
        assert_eq!(round_trip(Compression::None, &data), data);
    }
}
