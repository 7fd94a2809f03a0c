//! Read-only content-addressable storage interface.

use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;

use crate::multihash;

#[derive(Debug, Error)]
pub enum CasError {
    #[error("content not found [{0}]")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("read timed out after {0:?}")]
    Timeout(Duration),
}

/// Fetches content by its opaque content-hash address. Implementations own
/// their deadline configuration and report expiry as `CasError::Timeout`.
pub trait CasClient: Send + Sync {
    fn read(&self, address: &str) -> Result<Vec<u8>, CasError>;
}

/// In-memory content-addressed store. Addresses are encoded multihashes of
/// the stored bytes, so fixtures built with `put` are honest about the
/// content-addressing contract. Intended for tests and local runs.
#[derive(Default)]
pub struct MemCas {
    content: DashMap<String, Vec<u8>>,
}

impl MemCas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` and returns their content address.
    pub fn put(&self, bytes: Vec<u8>) -> String {
        let address = multihash::compute_encoded(multihash::SHA2_256_CODE, &bytes)
            .expect("sha2-256 is always supported");
        self.content.insert(address.clone(), bytes);
        address
    }
}

impl CasClient for MemCas {
    fn read(&self, address: &str) -> Result<Vec<u8>, CasError> {
        self.content
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CasError::NotFound(address.to_string()))
    }
}
