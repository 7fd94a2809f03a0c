//! Operation records and the wire models they are parsed from.

use serde::{Deserialize, Serialize};

use crate::jws::Jws;
use crate::keys::RecoveryKey;
use crate::patch::Patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Recover,
    Deactivate,
}

/// Immutable data fixed at create time. Its canonical-JSON multihash is the
/// DID's unique suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuffixData {
    pub patch_data_hash: String,
    pub recovery_key: RecoveryKey,
    pub next_recovery_commitment_hash: String,
}

/// Patch data (delta): the patches of one operation plus the commitment for
/// the next update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchData {
    pub patches: Vec<Patch>,
    pub next_update_commitment_hash: String,
}

/// Signed payload of an update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSignedData {
    pub update_reveal_value: String,
    pub patch_data_hash: String,
}

/// Signed payload of a recover operation: the reveal for the previous
/// commitment and the replacement key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverSignedData {
    pub recovery_reveal_value: String,
    pub recovery_key: RecoveryKey,
    pub next_recovery_commitment_hash: String,
    pub patch_data_hash: String,
}

/// Signed payload of a deactivate operation. `did_suffix` must match the
/// suffix the operation is filed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateSignedData {
    pub did_suffix: String,
    pub recovery_reveal_value: String,
}

/// Type-specific portion of an operation. Patch data is optional for
/// anchored operations until the provider attaches the positional delta
/// from the chunk file; replay rejects operations still missing it.
#[derive(Debug, Clone)]
pub enum OperationKind {
    Create {
        encoded_suffix_data: String,
        suffix_data: SuffixData,
        encoded_patch_data: Option<String>,
        patch_data: Option<PatchData>,
    },
    Update {
        signed_data: Jws,
        encoded_patch_data: Option<String>,
        patch_data: Option<PatchData>,
    },
    Recover {
        signed_data: Jws,
        encoded_patch_data: Option<String>,
        patch_data: Option<PatchData>,
    },
    Deactivate {
        signed_data: Jws,
    },
}

/// One materialized operation: the envelope shared by every kind plus the
/// kind-specific payload.
#[derive(Debug, Clone)]
pub struct Operation {
    pub namespace: String,
    pub unique_suffix: String,
    pub id: String,
    /// Raw client request bytes, preserved for replay; empty for
    /// operations assembled from batch files.
    pub operation_buffer: Vec<u8>,
    pub hash_algorithm_code: u64,
    pub kind: OperationKind,
}

impl Operation {
    pub fn op_type(&self) -> OperationType {
        match self.kind {
            OperationKind::Create { .. } => OperationType::Create,
            OperationKind::Update { .. } => OperationType::Update,
            OperationKind::Recover { .. } => OperationType::Recover,
            OperationKind::Deactivate { .. } => OperationType::Deactivate,
        }
    }

    pub fn encoded_patch_data(&self) -> Option<&str> {
        match &self.kind {
            OperationKind::Create {
                encoded_patch_data, ..
            }
            | OperationKind::Update {
                encoded_patch_data, ..
            }
            | OperationKind::Recover {
                encoded_patch_data, ..
            } => encoded_patch_data.as_deref(),
            OperationKind::Deactivate { .. } => None,
        }
    }

    pub fn patch_data(&self) -> Option<&PatchData> {
        match &self.kind {
            OperationKind::Create { patch_data, .. }
            | OperationKind::Update { patch_data, .. }
            | OperationKind::Recover { patch_data, .. } => patch_data.as_ref(),
            OperationKind::Deactivate { .. } => None,
        }
    }

    /// Attaches a parsed delta to a non-deactivate operation.
    pub fn set_patch_data(&mut self, encoded: String, parsed: PatchData) {
        match &mut self.kind {
            OperationKind::Create {
                encoded_patch_data,
                patch_data,
                ..
            }
            | OperationKind::Update {
                encoded_patch_data,
                patch_data,
                ..
            }
            | OperationKind::Recover {
                encoded_patch_data,
                patch_data,
                ..
            } => {
                *encoded_patch_data = Some(encoded);
                *patch_data = Some(parsed);
            }
            OperationKind::Deactivate { .. } => {}
        }
    }
}

/// An operation together with its anchor coordinates. The triple
/// `(transaction_time, transaction_number, operation_index)` is the total
/// ordering key for replay.
#[derive(Debug, Clone)]
pub struct AnchoredOperation {
    pub operation: Operation,
    pub transaction_time: u64,
    pub transaction_number: u64,
    pub operation_index: usize,
}

impl AnchoredOperation {
    pub fn sort_key(&self) -> (u64, u64, usize) {
        (
            self.transaction_time,
            self.transaction_number,
            self.operation_index,
        )
    }
}
