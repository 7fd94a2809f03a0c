//! Multihash computation and the base encoding shared by all producers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, SidetreeError};

/// Multihash algorithm code for SHA2-256.
pub const SHA2_256_CODE: u64 = 18;

/// Computes a self-describing hash: one-byte code, one-byte digest length,
/// then the raw digest.
pub fn compute(code: u64, data: &[u8]) -> Result<Vec<u8>> {
    match code {
        SHA2_256_CODE => {
            let digest = Sha256::digest(data);
            let mut out = Vec::with_capacity(2 + digest.len());
            out.push(code as u8);
            out.push(digest.len() as u8);
            out.extend_from_slice(&digest);
            Ok(out)
        }
        other => Err(SidetreeError::UnsupportedHash(other)),
    }
}

/// Computes a multihash and returns it in the canonical base encoding.
pub fn compute_encoded(code: u64, data: &[u8]) -> Result<String> {
    Ok(encode(&compute(code, data)?))
}

pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| SidetreeError::InvalidEncoding(e.to_string()))
}

/// Stable key-ordered JSON bytes. Structurally equal values serialize to
/// byte-identical output regardless of field declaration order, because the
/// intermediate `serde_json::Value` map is BTreeMap-backed.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value =
        serde_json::to_value(value).map_err(|e| SidetreeError::Malformed(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| SidetreeError::Malformed(e.to_string()))
}

/// Derives the unique suffix of a DID from base-encoded suffix data:
/// the encoded multihash of the decoded bytes.
pub fn unique_suffix_from_encoded(encoded_suffix_data: &str, code: u64) -> Result<String> {
    let decoded = decode(encoded_suffix_data)?;
    compute_encoded(code, &decoded)
}

/// Checks that `encoded` decodes to a well-formed multihash under `code`.
pub fn validate_encoded(code: u64, encoded: &str) -> Result<()> {
    let bytes = decode(encoded)?;
    if bytes.len() < 2 || bytes[0] as u64 != code {
        return Err(SidetreeError::Malformed(format!(
            "multihash algorithm code mismatch, expected {code}"
        )));
    }
    if bytes[1] as usize != bytes.len() - 2 {
        return Err(SidetreeError::Malformed(
            "multihash length prefix doesn't match digest".into(),
        ));
    }
    Ok(())
}

/// True when the encoded multihash commits to `preimage` under `code`.
pub fn matches(code: u64, encoded_multihash: &str, preimage: &[u8]) -> bool {
    match compute_encoded(code, preimage) {
        Ok(computed) => computed == encoded_multihash,
        Err(_) => false,
    }
}
