//! Bounded decompression of batch files.

use std::io::Read;

use crate::error::{Result, SidetreeError};

/// Decompresses CAS content under a hard output cap. The cap is checked
/// while streaming so an adversarial payload cannot balloon past the
/// protocol's declared maximum.
pub trait DecompressionProvider: Send + Sync {
    fn decompress(&self, algorithm: &str, data: &[u8], max_size: usize) -> Result<Vec<u8>>;
}

#[derive(Default)]
pub struct ZstdDecompressor;

impl ZstdDecompressor {
    pub fn new() -> Self {
        Self
    }
}

impl DecompressionProvider for ZstdDecompressor {
    fn decompress(&self, algorithm: &str, data: &[u8], max_size: usize) -> Result<Vec<u8>> {
        if !algorithm.eq_ignore_ascii_case("zstd") {
            return Err(SidetreeError::UnsupportedCompression(algorithm.to_string()));
        }

        let decoder = zstd::stream::read::Decoder::new(data)
            .map_err(|e| SidetreeError::Malformed(format!("zstd decode: {e}")))?;

        let mut out = Vec::new();
        // Read one byte past the cap so overflow is detectable without
        // draining the whole stream.
        decoder
            .take(max_size as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| SidetreeError::Malformed(format!("zstd decode: {e}")))?;

        if out.len() > max_size {
            return Err(SidetreeError::FileTooLarge {
                kind: "decompressed",
                size: out.len(),
                max: max_size,
            });
        }
        Ok(out)
    }
}
