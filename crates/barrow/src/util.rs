//! Small shared helpers for the streaming pipelines.

use std::io::{self, Read, Write};

/// Pipeline stages move large files; a 1 MiB copy buffer is more reasonable
/// than the 8 KiB `io::copy` default.
pub const COPY_BUF_SIZE: usize = 1024 * 1024;

/// Copy `src` into `dst` through a fixed 1 MiB buffer, returning the number
/// of bytes moved.
pub fn copy<R: Read, W: Write>(mut src: R, mut dst: W) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            return Ok(total);
        }
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// HTTP `Range` header value for `length` bytes starting at `offset`.
/// The wire format is inclusive on both ends.
pub fn format_http_range(offset: u64, length: u64) -> String {
    format!("bytes={}-{}", offset, offset + length - 1)
}

/// Thousands separators for byte counts in progress logs.
pub fn format_commas(num: u64) -> String {
    let digits = num.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_moves_everything() {
        let data = vec![0xa5u8; COPY_BUF_SIZE * 2 + 17];
        let mut out = Vec::new();
        let n = copy(data.as_slice(), &mut out).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn http_range_is_inclusive() {
        assert_eq!(format_http_range(0, 10), "bytes=0-9");
        assert_eq!(format_http_range(100, 1), "bytes=100-100");
    }

    #[test]
    fn commas() {
        assert_eq!(format_commas(0), "0");
        assert_eq!(format_commas(999), "999");
        assert_eq!(format_commas(1000), "1,000");
        assert_eq!(format_commas(1234567), "1,234,567");
        assert_eq!(format_commas(12345678), "12,345,678");
    }
}
