//! Per-DID replay: folds an ordered operation log into document state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{Result, SidetreeError};
use crate::jws::{verify_jws, Jws, SignatureVerifier};
use crate::keys::RecoveryKey;
use crate::multihash;
use crate::operation::model::{
    AnchoredOperation, DeactivateSignedData, Operation, OperationKind, PatchData,
    RecoverSignedData, UpdateSignedData,
};
use crate::operation::parse::parse_signed_payload;
use crate::patch::apply_patches;
use crate::store::OperationStore;

/// Materialized state of one unique suffix after replay.
#[derive(Debug, Clone, Default)]
pub struct DocumentState {
    pub document: Document,
    pub recovery_key: Option<RecoveryKey>,
    pub recovery_commitment: Option<String>,
    pub update_commitment: Option<String>,
    pub deactivated: bool,
    /// True iff at least one anchored operation contributed to this state.
    pub published: bool,
}

/// Replays per-suffix operation logs. Application of a single operation is
/// a pure function of `(prior state, operation)`; invalid operations are
/// dropped without advancing state.
pub struct OperationProcessor {
    name: String,
    store: Arc<dyn OperationStore>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl OperationProcessor {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn OperationStore>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            verifier,
        }
    }

    /// Resolves the current state for a suffix from its full anchored log.
    pub fn resolve(&self, unique_suffix: &str) -> Result<DocumentState> {
        let operations = self.store.get(unique_suffix)?;
        if operations.is_empty() {
            return Err(SidetreeError::NotFound);
        }
        self.replay(&operations)
    }

    /// Resolves state as of an anchor index: only operations at or before
    /// `(transaction_time, transaction_number)` are observed.
    pub fn resolve_as_of(
        &self,
        unique_suffix: &str,
        transaction_time: u64,
        transaction_number: u64,
    ) -> Result<DocumentState> {
        let operations = self.store.get(unique_suffix)?;
        let bounded: Vec<_> = operations
            .into_iter()
            .filter(|op| {
                (op.transaction_time, op.transaction_number)
                    <= (transaction_time, transaction_number)
            })
            .collect();
        if bounded.is_empty() {
            return Err(SidetreeError::NotFound);
        }
        self.replay(&bounded)
    }

    fn replay(&self, operations: &[AnchoredOperation]) -> Result<DocumentState> {
        let mut state: Option<DocumentState> = None;
        for anchored in operations {
            state = self.apply(state, &anchored.operation);
        }
        match state {
            Some(mut state) => {
                state.published = true;
                Ok(state)
            }
            // Anchored operations exist but none was a valid create.
            None => Err(SidetreeError::NotFound),
        }
    }

    /// Applies one operation to the prior state. Returns the prior state
    /// unchanged when the operation is invalid for it.
    fn apply(&self, state: Option<DocumentState>, operation: &Operation) -> Option<DocumentState> {
        match (&operation.kind, state) {
            (OperationKind::Create { .. }, None) => {
                match self.state_from_create(operation) {
                    Ok(state) => Some(state),
                    Err(e) => {
                        debug!(processor = %self.name, id = %operation.id, error = %e,
                            "dropping invalid create operation");
                        None
                    }
                }
            }
            // Later creates cannot override; first writer wins.
            (OperationKind::Create { .. }, Some(state)) => {
                debug!(processor = %self.name, id = %operation.id,
                    "ignoring create for existing suffix");
                Some(state)
            }
            (_, None) => {
                debug!(processor = %self.name, id = %operation.id,
                    "dropping operation before first valid create");
                None
            }
            (_, Some(state)) if state.deactivated => Some(state),
            (OperationKind::Update {
                signed_data,
                encoded_patch_data,
                patch_data,
            }, Some(state)) => {
                match self.apply_update(&state, operation, signed_data,
                    encoded_patch_data.as_deref(), patch_data.as_ref())
                {
                    Ok(next) => Some(next),
                    Err(e) => {
                        warn!(processor = %self.name, id = %operation.id, error = %e,
                            "dropping invalid update operation");
                        Some(state)
                    }
                }
            }
            (OperationKind::Recover {
                signed_data,
                encoded_patch_data,
                patch_data,
            }, Some(state)) => {
                match self.apply_recover(&state, operation, signed_data,
                    encoded_patch_data.as_deref(), patch_data.as_ref())
                {
                    Ok(next) => Some(next),
                    Err(e) => {
                        warn!(processor = %self.name, id = %operation.id, error = %e,
                            "dropping invalid recover operation");
                        Some(state)
                    }
                }
            }
            (OperationKind::Deactivate { signed_data }, Some(state)) => {
                match self.apply_deactivate(&state, operation, signed_data) {
                    Ok(next) => Some(next),
                    Err(e) => {
                        warn!(processor = %self.name, id = %operation.id, error = %e,
                            "dropping invalid deactivate operation");
                        Some(state)
                    }
                }
            }
        }
    }

    /// Builds the state a create operation produces on its own. Also used
    /// for unpublished (initial-values) resolution; `published` stays false
    /// until an anchored replay sets it.
    pub fn state_from_create(&self, operation: &Operation) -> Result<DocumentState> {
        let (suffix_data, encoded_patch_data, patch_data) = match &operation.kind {
            OperationKind::Create {
                suffix_data,
                encoded_patch_data,
                patch_data,
                ..
            } => (suffix_data, encoded_patch_data, patch_data),
            _ => return Err(SidetreeError::Malformed("not a create operation".into())),
        };

        let encoded = encoded_patch_data
            .as_deref()
            .ok_or(SidetreeError::MissingField("patchData"))?;
        let patch_data = patch_data
            .as_ref()
            .ok_or(SidetreeError::MissingField("patchData"))?;

        check_patch_data_hash(operation, encoded, &suffix_data.patch_data_hash)?;

        let document = apply_patches(&patch_data.patches, Document::default());
        Ok(DocumentState {
            document,
            recovery_key: Some(suffix_data.recovery_key.clone()),
            recovery_commitment: Some(suffix_data.next_recovery_commitment_hash.clone()),
            update_commitment: Some(patch_data.next_update_commitment_hash.clone()),
            deactivated: false,
            published: false,
        })
    }

    fn apply_update(
        &self,
        state: &DocumentState,
        operation: &Operation,
        signed_data: &Jws,
        encoded_patch_data: Option<&str>,
        patch_data: Option<&PatchData>,
    ) -> Result<DocumentState> {
        let signed: UpdateSignedData = parse_signed_payload(signed_data)?;

        check_reveal(operation, &signed.update_reveal_value, state.update_commitment.as_deref())?;

        let encoded = encoded_patch_data.ok_or(SidetreeError::MissingField("patchData"))?;
        let patch_data = patch_data.ok_or(SidetreeError::MissingField("patchData"))?;
        check_patch_data_hash(operation, encoded, &signed.patch_data_hash)?;

        // The signing key is referenced by id into the current document.
        let kid = signed_data
            .header()?
            .kid
            .ok_or(SidetreeError::MissingField("kid"))?;
        let key = state
            .document
            .find_public_key(&kid)
            .ok_or_else(|| SidetreeError::SignatureInvalid(format!("unknown key id `{kid}`")))?;
        let (public_key, algorithm) = key.decode()?;
        verify_jws(signed_data, algorithm, &public_key, self.verifier.as_ref())?;

        let mut next = state.clone();
        next.document = apply_patches(&patch_data.patches, state.document.clone());
        next.update_commitment = Some(patch_data.next_update_commitment_hash.clone());
        Ok(next)
    }

    fn apply_recover(
        &self,
        state: &DocumentState,
        operation: &Operation,
        signed_data: &Jws,
        encoded_patch_data: Option<&str>,
        patch_data: Option<&PatchData>,
    ) -> Result<DocumentState> {
        let signed: RecoverSignedData = parse_signed_payload(signed_data)?;

        check_reveal(
            operation,
            &signed.recovery_reveal_value,
            state.recovery_commitment.as_deref(),
        )?;

        // Signed by the previous recovery key.
        let previous_key = state
            .recovery_key
            .as_ref()
            .ok_or(SidetreeError::MissingField("recoveryKey"))?;
        let (public_key, algorithm) = previous_key.decode()?;
        verify_jws(signed_data, algorithm, &public_key, self.verifier.as_ref())?;

        let encoded = encoded_patch_data.ok_or(SidetreeError::MissingField("patchData"))?;
        let patch_data = patch_data.ok_or(SidetreeError::MissingField("patchData"))?;
        check_patch_data_hash(operation, encoded, &signed.patch_data_hash)?;

        // Recovery resets the document and the update commitment chain.
        Ok(DocumentState {
            document: apply_patches(&patch_data.patches, Document::default()),
            recovery_key: Some(signed.recovery_key.clone()),
            recovery_commitment: Some(signed.next_recovery_commitment_hash.clone()),
            update_commitment: Some(patch_data.next_update_commitment_hash.clone()),
            deactivated: false,
            published: state.published,
        })
    }

    fn apply_deactivate(
        &self,
        state: &DocumentState,
        operation: &Operation,
        signed_data: &Jws,
    ) -> Result<DocumentState> {
        let signed: DeactivateSignedData = parse_signed_payload(signed_data)?;

        if signed.did_suffix != operation.unique_suffix {
            return Err(SidetreeError::Malformed(
                "signed did suffix doesn't match operation suffix".into(),
            ));
        }

        check_reveal(
            operation,
            &signed.recovery_reveal_value,
            state.recovery_commitment.as_deref(),
        )?;

        let recovery_key = state
            .recovery_key
            .as_ref()
            .ok_or(SidetreeError::MissingField("recoveryKey"))?;
        let (public_key, algorithm) = recovery_key.decode()?;
        verify_jws(signed_data, algorithm, &public_key, self.verifier.as_ref())?;

        Ok(DocumentState {
            document: Document::default(),
            recovery_key: None,
            recovery_commitment: None,
            update_commitment: None,
            deactivated: true,
            published: state.published,
        })
    }
}

/// Checks that the decoded patch data hashes to the committed value.
fn check_patch_data_hash(operation: &Operation, encoded: &str, expected: &str) -> Result<()> {
    let bytes = multihash::decode(encoded)?;
    if !multihash::matches(operation.hash_algorithm_code, expected, &bytes) {
        return Err(SidetreeError::CommitmentMismatch);
    }
    Ok(())
}

/// Checks a reveal value against the stored commitment.
fn check_reveal(operation: &Operation, reveal: &str, commitment: Option<&str>) -> Result<()> {
    let commitment = commitment.ok_or(SidetreeError::CommitmentMismatch)?;
    if !multihash::matches(operation.hash_algorithm_code, commitment, reveal.as_bytes()) {
        return Err(SidetreeError::CommitmentMismatch);
    }
    Ok(())
}
