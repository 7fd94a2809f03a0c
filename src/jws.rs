//! Flattened JWS model and the signature verification capability.

use dashmap::DashMap;
use k256::ecdsa::signature::hazmat::PrehashVerifier as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SidetreeError};
use crate::keys::KeyAlgorithm;
use crate::multihash;

/// A JWS in flattened serialization: base-encoded protected header and
/// payload plus the raw signature, also base-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jws {
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Jws {
    pub fn header(&self) -> Result<Header> {
        let bytes = multihash::decode(&self.protected)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SidetreeError::Malformed(format!("JWS protected header: {e}")))
    }

    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        multihash::decode(&self.payload)
    }

    /// ASCII signing input: `<protected>.<payload>`.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.protected.len() + 1 + self.payload.len());
        input.extend_from_slice(self.protected.as_bytes());
        input.push(b'.');
        input.extend_from_slice(self.payload.as_bytes());
        input
    }

    pub fn decode_signature(&self) -> Result<Vec<u8>> {
        multihash::decode(&self.signature)
    }
}

/// Narrow capability for signature checks. `message` is the raw signing
/// input; implementations hash it themselves.
pub trait SignatureVerifier: Send + Sync {
    fn verify(
        &self,
        algorithm: KeyAlgorithm,
        public_key: &[u8; 33],
        message: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// ECDSA verifier over secp256k1 and P-256 with per-instance caches of
/// parsed verifying keys, keyed by the 33-byte raw SEC1 pubkey. Parsing an
/// EC point dominates small-batch verification cost, so hits skip it.
#[derive(Default)]
pub struct EcdsaVerifier {
    secp_cache: DashMap<[u8; 33], k256::ecdsa::VerifyingKey>,
    p256_cache: DashMap<[u8; 33], p256::ecdsa::VerifyingKey>,
}

const MAX_CACHED_KEYS: usize = 100_000;

impl EcdsaVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn verify_secp256k1(&self, public_key: &[u8; 33], hash: &[u8], signature: &[u8]) -> bool {
        let signature = match k256::ecdsa::Signature::from_slice(signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        if let Some(vk) = self.secp_cache.get(public_key) {
            return vk.verify_prehash(hash, &signature).is_ok();
        }

        match k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
            Ok(vk) => {
                let ok = vk.verify_prehash(hash, &signature).is_ok();
                if self.secp_cache.len() > MAX_CACHED_KEYS {
                    self.secp_cache.clear();
                }
                self.secp_cache.insert(*public_key, vk);
                ok
            }
            Err(_) => false,
        }
    }

    fn verify_p256(&self, public_key: &[u8; 33], hash: &[u8], signature: &[u8]) -> bool {
        use p256::ecdsa::signature::hazmat::PrehashVerifier as _;

        let signature = match p256::ecdsa::Signature::from_slice(signature) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        if let Some(vk) = self.p256_cache.get(public_key) {
            return vk.verify_prehash(hash, &signature).is_ok();
        }

        match p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key) {
            Ok(vk) => {
                let ok = vk.verify_prehash(hash, &signature).is_ok();
                if self.p256_cache.len() > MAX_CACHED_KEYS {
                    self.p256_cache.clear();
                }
                self.p256_cache.insert(*public_key, vk);
                ok
            }
            Err(_) => false,
        }
    }
}

impl SignatureVerifier for EcdsaVerifier {
    fn verify(
        &self,
        algorithm: KeyAlgorithm,
        public_key: &[u8; 33],
        message: &[u8],
        signature: &[u8],
    ) -> bool {
        let hash = Sha256::digest(message);
        match algorithm {
            KeyAlgorithm::Secp256k1 => self.verify_secp256k1(public_key, &hash, signature),
            KeyAlgorithm::P256 => self.verify_p256(public_key, &hash, signature),
        }
    }
}

/// Verifies a JWS against a resolved key. The header `alg` must agree with
/// the key's curve.
pub fn verify_jws(
    jws: &Jws,
    algorithm: KeyAlgorithm,
    public_key: &[u8; 33],
    verifier: &dyn SignatureVerifier,
) -> Result<()> {
    let header = jws.header()?;
    if header.alg != algorithm.jws_alg() {
        return Err(SidetreeError::SignatureInvalid(format!(
            "header alg `{}` doesn't match key algorithm `{}`",
            header.alg,
            algorithm.jws_alg()
        )));
    }
    let signature = jws.decode_signature()?;
    if !verifier.verify(algorithm, public_key, &jws.signing_input(), &signature) {
        return Err(SidetreeError::SignatureInvalid(
            "ecdsa verification failed".into(),
        ));
    }
    Ok(())
}
