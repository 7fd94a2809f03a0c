//! Protocol parameters resolved per namespace.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SidetreeError};
use crate::multihash;

/// Protocol parameters in force for one namespace. File size maxima apply
/// to the decompressed content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    pub hash_algorithm_code: u64,
    pub max_operation_byte_size: usize,
    pub max_anchor_file_size: usize,
    pub max_map_file_size: usize,
    pub max_chunk_file_size: usize,
    pub max_operations_per_batch: usize,
    pub compression_algorithm: String,
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol {
            hash_algorithm_code: multihash::SHA2_256_CODE,
            max_operation_byte_size: 2000,
            max_anchor_file_size: 1_000_000,
            max_map_file_size: 1_000_000,
            max_chunk_file_size: 10_000_000,
            max_operations_per_batch: 10_000,
            compression_algorithm: "zstd".to_string(),
        }
    }
}

/// Yields the protocol currently in force. Versioned protocol histories sit
/// behind this seam; the engine only ever asks for the current parameters.
pub trait ProtocolClient: Send + Sync {
    fn current(&self) -> Protocol;
}

/// Resolves a protocol client by namespace.
pub trait ClientProvider: Send + Sync {
    fn for_namespace(&self, namespace: &str) -> Result<Arc<dyn ProtocolClient>>;
}

struct StaticClient(Protocol);

impl ProtocolClient for StaticClient {
    fn current(&self) -> Protocol {
        self.0.clone()
    }
}

/// In-memory namespace registry. Namespaces without an entry fail with
/// `UnknownNamespace`.
#[derive(Default)]
pub struct ProtocolRegistry {
    clients: HashMap<String, Arc<dyn ProtocolClient>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, namespace: impl Into<String>, protocol: Protocol) -> Self {
        self.clients
            .insert(namespace.into(), Arc::new(StaticClient(protocol)));
        self
    }

    pub fn insert_client(&mut self, namespace: impl Into<String>, client: Arc<dyn ProtocolClient>) {
        self.clients.insert(namespace.into(), client);
    }
}

impl ClientProvider for ProtocolRegistry {
    fn for_namespace(&self, namespace: &str) -> Result<Arc<dyn ProtocolClient>> {
        self.clients
            .get(namespace)
            .cloned()
            .ok_or_else(|| SidetreeError::UnknownNamespace(namespace.to_string()))
    }
}
