//! Document resolution entry point: anchored and unpublished paths.

use std::sync::Arc;

use tracing::debug;

use crate::did;
use crate::document::{MethodMetadata, ResolutionResult};
use crate::error::{Result, SidetreeError};
use crate::multihash;
use crate::operation::model::OperationType;
use crate::operation::parse::parse_operation;
use crate::processor::{DocumentState, OperationProcessor};
use crate::protocol::ClientProvider;

/// Resolves DIDs under one configured namespace.
pub struct DocumentHandler {
    namespace: String,
    protocols: Arc<dyn ClientProvider>,
    processor: OperationProcessor,
}

impl DocumentHandler {
    pub fn new(
        namespace: impl Into<String>,
        protocols: Arc<dyn ClientProvider>,
        processor: OperationProcessor,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            protocols,
            processor,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Resolves a DID, optionally carrying `;initial-values=` with an
    /// encoded create request for unpublished resolution.
    pub fn resolve_document(&self, did: &str) -> Result<ResolutionResult> {
        let (did, initial_values) = did::split_initial_values(did)?;
        let unique_suffix = did::unique_portion(&self.namespace, did)?;

        match initial_values {
            Some(encoded_request) => self.resolve_with_initial_values(did, encoded_request),
            None => {
                let state = self.processor.resolve(unique_suffix)?;
                resolution_result(did, &state)
            }
        }
    }

    /// Computes the document a create request would produce, without any
    /// anchored state. The DID must match the one derived from the request.
    fn resolve_with_initial_values(
        &self,
        did: &str,
        encoded_request: &str,
    ) -> Result<ResolutionResult> {
        debug!(%did, "resolving from initial values");
        let request = multihash::decode(encoded_request)?;

        let protocol = self.protocols.for_namespace(&self.namespace)?.current();
        let operation = parse_operation(&request, &self.namespace, &protocol)?;
        if operation.op_type() != OperationType::Create {
            return Err(SidetreeError::Malformed(
                "initial values must carry a create request".into(),
            ));
        }
        if operation.id != did {
            return Err(SidetreeError::DidMismatch);
        }

        let state = self.processor.state_from_create(&operation)?;
        resolution_result(did, &state)
    }
}

/// Folds a replayed state into the external resolution envelope.
pub fn resolution_result(id: &str, state: &DocumentState) -> Result<ResolutionResult> {
    let document = state.document.to_external(id)?;
    Ok(ResolutionResult {
        document,
        method_metadata: MethodMetadata {
            published: state.published,
            recovery_commitment: state.recovery_commitment.clone(),
            update_commitment: state.update_commitment.clone(),
            deactivated: state.deactivated,
        },
    })
}
