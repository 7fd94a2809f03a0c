//! The operation index: per-suffix ordered logs of anchored operations.

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::Result;
use crate::operation::model::AnchoredOperation;

/// Keyed by unique suffix. Appends are exclusive per suffix; reads return a
/// snapshot of the ordered log.
pub trait OperationStore: Send + Sync {
    fn put(&self, operation: AnchoredOperation) -> Result<()>;
    fn get(&self, unique_suffix: &str) -> Result<Vec<AnchoredOperation>>;
}

/// In-memory operation index backed by a sharded concurrent map. The
/// per-suffix vec stays sorted by `(transaction_time, transaction_number,
/// operation_index)`; mutation holds only the suffix's shard lock.
#[derive(Default)]
pub struct MemOperationStore {
    operations: DashMap<String, Vec<AnchoredOperation>>,
}

impl MemOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suffix_count(&self) -> usize {
        self.operations.len()
    }
}

impl OperationStore for MemOperationStore {
    fn put(&self, operation: AnchoredOperation) -> Result<()> {
        let mut log = self
            .operations
            .entry(operation.operation.unique_suffix.clone())
            .or_default();

        let key = (operation.sort_key(), operation.operation.id.as_str());
        let position = log.partition_point(|existing| {
            (existing.sort_key(), existing.operation.id.as_str()) < key
        });

        if let Some(existing) = log.get(position) {
            if existing.sort_key() == operation.sort_key() {
                if existing.operation.id == operation.operation.id {
                    // Re-observed anchor; the log already holds this entry.
                    debug!(
                        suffix = %operation.operation.unique_suffix,
                        coordinates = ?operation.sort_key(),
                        "skipping duplicate anchored operation"
                    );
                    return Ok(());
                }
                // Two distinct operations must never share coordinates.
                // Keep both, ordered lexicographically by ID.
                warn!(
                    coordinates = ?operation.sort_key(),
                    first = %existing.operation.id,
                    second = %operation.operation.id,
                    "conflicting operations share anchor coordinates"
                );
            }
        }

        log.insert(position, operation);
        Ok(())
    }

    fn get(&self, unique_suffix: &str) -> Result<Vec<AnchoredOperation>> {
        Ok(self
            .operations
            .get(unique_suffix)
            .map(|log| log.clone())
            .unwrap_or_default())
    }
}
