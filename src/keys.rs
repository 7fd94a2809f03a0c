//! Public key model and multibase codec.
//!
//! Keys travel as multibase strings: `z` + base58 of a two-byte multicodec
//! prefix and the 33-byte compressed SEC1 point.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SidetreeError};

/// Multicodec prefix for secp256k1 compressed public keys.
pub const MULTICODEC_SECP256K1: [u8; 2] = [0xe7, 0x01];
/// Multicodec prefix for P-256 compressed public keys.
pub const MULTICODEC_P256: [u8; 2] = [0x80, 0x24];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Secp256k1,
    P256,
}

impl KeyAlgorithm {
    /// JWS `alg` value corresponding to this curve.
    pub fn jws_alg(&self) -> &'static str {
        match self {
            KeyAlgorithm::Secp256k1 => "ES256K",
            KeyAlgorithm::P256 => "ES256",
        }
    }
}

/// A public key entry of a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

/// A bare key reference as carried in suffix data and recover payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryKey {
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

/// Decodes a multibase public key (e.g. `zQ3sh...` for secp256k1 or
/// `zDna...` for P-256) into raw compressed SEC1 bytes.
pub fn decode_multibase(multibase_key: &str) -> Result<([u8; 33], KeyAlgorithm)> {
    let rest = multibase_key
        .strip_prefix('z')
        .ok_or_else(|| SidetreeError::InvalidEncoding("multibase key must start with 'z'".into()))?;
    let decoded = bs58::decode(rest)
        .into_vec()
        .map_err(|e| SidetreeError::InvalidEncoding(e.to_string()))?;

    if decoded.len() != 35 {
        return Err(SidetreeError::InvalidEncoding(format!(
            "multibase key payload has {} bytes, expected 35",
            decoded.len()
        )));
    }

    let algorithm = if decoded.starts_with(&MULTICODEC_SECP256K1) {
        KeyAlgorithm::Secp256k1
    } else if decoded.starts_with(&MULTICODEC_P256) {
        KeyAlgorithm::P256
    } else {
        return Err(SidetreeError::InvalidEncoding(
            "unrecognized multicodec key prefix".into(),
        ));
    };

    let mut pk = [0u8; 33];
    pk.copy_from_slice(&decoded[2..]);
    Ok((pk, algorithm))
}

/// Encodes raw compressed SEC1 bytes as a multibase string.
pub fn encode_multibase(algorithm: KeyAlgorithm, public_key: &[u8; 33]) -> String {
    let prefix = match algorithm {
        KeyAlgorithm::Secp256k1 => MULTICODEC_SECP256K1,
        KeyAlgorithm::P256 => MULTICODEC_P256,
    };
    let mut payload = Vec::with_capacity(35);
    payload.extend_from_slice(&prefix);
    payload.extend_from_slice(public_key);
    format!("z{}", bs58::encode(payload).into_string())
}

impl RecoveryKey {
    pub fn decode(&self) -> Result<([u8; 33], KeyAlgorithm)> {
        decode_multibase(&self.public_key_multibase)
    }
}

impl PublicKey {
    pub fn decode(&self) -> Result<([u8; 33], KeyAlgorithm)> {
        decode_multibase(&self.public_key_multibase)
    }
}
