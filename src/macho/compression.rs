//! `__z*`-prefixed section decompression.
//!
//! A section whose name begins with `__z` may hold a ZLIB-compressed
//! payload with a 12-byte header: the literal bytes `"ZLIB"` followed by a
//! big-endian `u64` uncompressed size. Anything else in such a section is
//! treated as already-uncompressed data.

use crate::error::{Error, Result};

const ZLIB_MAGIC: &[u8; 4] = b"ZLIB";

/// `true` if `name` marks a possibly-ZLIB-compressed section.
pub fn is_compressed_section_name(name: &str) -> bool {
    name.starts_with("__z")
}

/// Decompress a `__z*` section's raw bytes.
///
/// If `data` begins with the 12-byte `"ZLIB" || be_u64(size)` header,
/// inflates the remainder into a buffer of exactly `size` bytes. Otherwise
/// returns `data` verbatim, treating the section as already uncompressed.
#[cfg(feature = "compression")]
pub fn decompress_section(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    if data.len() < 12 || &data[0..4] != ZLIB_MAGIC {
        return Ok(data.to_vec());
    }
    let size = u64::from_be_bytes(data[4..12].try_into().unwrap());
    let size: usize = size
        .try_into()
        .map_err(|_| Error::BadCompression("uncompressed size overflows usize"))?;
    let mut decoder = flate2::read::ZlibDecoder::new(&data[12..]);
    let mut out = Vec::with_capacity(size);
    decoder
        .read_to_end(&mut out)
        .map_err(|_| Error::BadCompression("bad zlib stream"))?;
    if out.len() != size {
        return Err(Error::BadCompression("size-mismatch"));
    }
    Ok(out)
}

/// Non-compression-feature fallback: `__z*` sections that are actually
/// compressed cannot be expanded, but the header can still be validated
/// so callers get a clear error instead of garbage bytes.
#[cfg(not(feature = "compression"))]
pub fn decompress_section(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 12 || &data[0..4] != ZLIB_MAGIC {
        return Ok(data.to_vec());
    }
    Err(Error::BadCompression(
        "section is ZLIB-compressed but the `compression` feature is disabled",
    ))
}

#[cfg(all(test, feature = "compression"))]
mod tests {
    use super::*;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        use std::io::Write;
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn round_trips_compressed_section() {
        let payload = b"hello mach-o reflection metadata".repeat(4);
        let compressed = zlib_compress(&payload);
        let mut section = Vec::new();
        section.extend_from_slice(ZLIB_MAGIC);
        section.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        section.extend_from_slice(&compressed);

        let decoded = decompress_section(&section).unwrap();
        assert_eq!(decoded, payload);
        // Decompressing twice yields equal bytes.
        let decoded_again = decompress_section(&section).unwrap();
        assert_eq!(decoded, decoded_again);
    }

    #[test]
    fn passes_through_uncompressed_data() {
        let data = b"plain bytes, no zlib header here...";
        assert_eq!(decompress_section(data).unwrap(), data);
    }

    #[test]
    fn detects_size_mismatch() {
        let payload = b"short";
        let compressed = zlib_compress(payload);
        let mut section = Vec::new();
        section.extend_from_slice(ZLIB_MAGIC);
        section.extend_from_slice(&999u64.to_be_bytes());
        section.extend_from_slice(&compressed);
        assert_eq!(
            decompress_section(&section),
            Err(Error::BadCompression("size-mismatch"))
        );
    }
}
