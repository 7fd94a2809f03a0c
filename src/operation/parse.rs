//! Client request parsing and validation.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::did;
use crate::error::{Result, SidetreeError};
use crate::jws::Jws;
use crate::multihash;
use crate::operation::model::{
    DeactivateSignedData, Operation, OperationKind, OperationType, PatchData, RecoverSignedData,
    SuffixData, UpdateSignedData,
};
use crate::protocol::Protocol;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    suffix_data: String,
    patch_data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    did_unique_suffix: String,
    patch_data: String,
    signed_data: Jws,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecoverRequest {
    did_unique_suffix: String,
    patch_data: String,
    signed_data: Jws,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeactivateRequest {
    did_unique_suffix: String,
    signed_data: Jws,
}

/// Parses and validates one client request into an `Operation`.
///
/// The raw request is preserved in the operation buffer so anchored replay
/// can reproduce the exact bytes the client submitted.
pub fn parse_operation(request: &[u8], namespace: &str, protocol: &Protocol) -> Result<Operation> {
    if request.len() > protocol.max_operation_byte_size {
        return Err(SidetreeError::OperationTooLarge {
            size: request.len(),
            max: protocol.max_operation_byte_size,
        });
    }

    let value: Value = serde_json::from_slice(request)
        .map_err(|e| SidetreeError::Malformed(e.to_string()))?;
    let op_type = value
        .get("operation")
        .ok_or(SidetreeError::MissingField("operation"))?;
    let op_type: OperationType = serde_json::from_value(op_type.clone())
        .map_err(|e| SidetreeError::Malformed(format!("operation type: {e}")))?;

    let code = protocol.hash_algorithm_code;
    match op_type {
        OperationType::Create => {
            let req: CreateRequest = from_value(value)?;
            let suffix_data = parse_suffix_data(&req.suffix_data, code)?;
            let patch_data = parse_patch_data(&req.patch_data, code)?;
            let unique_suffix = multihash::unique_suffix_from_encoded(&req.suffix_data, code)?;
            Ok(build_operation(
                namespace,
                unique_suffix,
                request,
                code,
                OperationKind::Create {
                    encoded_suffix_data: req.suffix_data,
                    suffix_data,
                    encoded_patch_data: Some(req.patch_data),
                    patch_data: Some(patch_data),
                },
            ))
        }
        OperationType::Update => {
            let req: UpdateRequest = from_value(value)?;
            require_suffix(&req.did_unique_suffix)?;
            parse_signed_payload::<UpdateSignedData>(&req.signed_data)?;
            let patch_data = parse_patch_data(&req.patch_data, code)?;
            Ok(build_operation(
                namespace,
                req.did_unique_suffix,
                request,
                code,
                OperationKind::Update {
                    signed_data: req.signed_data,
                    encoded_patch_data: Some(req.patch_data),
                    patch_data: Some(patch_data),
                },
            ))
        }
        OperationType::Recover => {
            let req: RecoverRequest = from_value(value)?;
            require_suffix(&req.did_unique_suffix)?;
            let signed = parse_signed_payload::<RecoverSignedData>(&req.signed_data)?;
            signed.recovery_key.decode()?;
            multihash::validate_encoded(code, &signed.next_recovery_commitment_hash)?;
            let patch_data = parse_patch_data(&req.patch_data, code)?;
            Ok(build_operation(
                namespace,
                req.did_unique_suffix,
                request,
                code,
                OperationKind::Recover {
                    signed_data: req.signed_data,
                    encoded_patch_data: Some(req.patch_data),
                    patch_data: Some(patch_data),
                },
            ))
        }
        OperationType::Deactivate => {
            let req: DeactivateRequest = from_value(value)?;
            require_suffix(&req.did_unique_suffix)?;
            let signed = parse_signed_payload::<DeactivateSignedData>(&req.signed_data)?;
            if signed.did_suffix != req.did_unique_suffix {
                return Err(SidetreeError::Malformed(
                    "signed did suffix doesn't match request suffix".into(),
                ));
            }
            Ok(build_operation(
                namespace,
                req.did_unique_suffix,
                request,
                code,
                OperationKind::Deactivate {
                    signed_data: req.signed_data,
                },
            ))
        }
    }
}

fn build_operation(
    namespace: &str,
    unique_suffix: String,
    request: &[u8],
    code: u64,
    kind: OperationKind,
) -> Operation {
    let id = did::compose_id(namespace, &unique_suffix);
    Operation {
        namespace: namespace.to_string(),
        unique_suffix,
        id,
        operation_buffer: request.to_vec(),
        hash_algorithm_code: code,
        kind,
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SidetreeError::Malformed(e.to_string()))
}

fn require_suffix(suffix: &str) -> Result<()> {
    if suffix.is_empty() {
        return Err(SidetreeError::MissingField("didUniqueSuffix"));
    }
    Ok(())
}

/// Decodes base-encoded suffix data and validates its commitments.
pub fn parse_suffix_data(encoded: &str, code: u64) -> Result<SuffixData> {
    let bytes = multihash::decode(encoded)?;
    let suffix_data: SuffixData = serde_json::from_slice(&bytes)
        .map_err(|e| SidetreeError::Malformed(format!("suffix data: {e}")))?;
    multihash::validate_encoded(code, &suffix_data.patch_data_hash)?;
    multihash::validate_encoded(code, &suffix_data.next_recovery_commitment_hash)?;
    suffix_data.recovery_key.decode()?;
    Ok(suffix_data)
}

/// Decodes base-encoded patch data and validates patches and the next
/// update commitment.
pub fn parse_patch_data(encoded: &str, code: u64) -> Result<PatchData> {
    let bytes = multihash::decode(encoded)?;
    let patch_data: PatchData = serde_json::from_slice(&bytes)
        .map_err(|e| SidetreeError::InvalidPatch(format!("patch data: {e}")))?;
    if patch_data.patches.is_empty() {
        return Err(SidetreeError::MissingField("patches"));
    }
    for patch in &patch_data.patches {
        patch.validate()?;
    }
    multihash::validate_encoded(code, &patch_data.next_update_commitment_hash)?;
    Ok(patch_data)
}

/// Decodes a JWS payload into its typed signed-data model.
pub fn parse_signed_payload<T: DeserializeOwned>(jws: &Jws) -> Result<T> {
    jws.header()?;
    let payload = jws.decode_payload()?;
    serde_json::from_slice(&payload)
        .map_err(|e| SidetreeError::Malformed(format!("signed data payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{encode_multibase, KeyAlgorithm, RecoveryKey};
    use crate::patch::Patch;

    fn encoded_suffix_data() -> String {
        let suffix_data = SuffixData {
            patch_data_hash: multihash::compute_encoded(18, b"{}").unwrap(),
            recovery_key: RecoveryKey {
                public_key_multibase: encode_multibase(KeyAlgorithm::Secp256k1, &[2u8; 33]),
            },
            next_recovery_commitment_hash: multihash::compute_encoded(18, b"recoveryReveal")
                .unwrap(),
        };
        multihash::encode(&multihash::canonical_json(&suffix_data).unwrap())
    }

    fn encoded_patch_data() -> String {
        let patch_data = PatchData {
            patches: vec![Patch::Replace {
                document: Default::default(),
            }],
            next_update_commitment_hash: multihash::compute_encoded(18, b"updateReveal").unwrap(),
        };
        multihash::encode(&multihash::canonical_json(&patch_data).unwrap())
    }

    #[test]
    fn create_request_parses_and_derives_suffix() {
        let request = serde_json::json!({
            "operation": "create",
            "suffixData": encoded_suffix_data(),
            "patchData": encoded_patch_data(),
        });
        let bytes = serde_json::to_vec(&request).unwrap();
        let op = parse_operation(&bytes, "doc:ns", &Protocol::default()).unwrap();

        assert_eq!(op.op_type(), OperationType::Create);
        let expected_suffix =
            multihash::unique_suffix_from_encoded(request["suffixData"].as_str().unwrap(), 18)
                .unwrap();
        assert_eq!(op.unique_suffix, expected_suffix);
        assert_eq!(op.id, format!("doc:ns:{expected_suffix}"));
        assert_eq!(op.operation_buffer, bytes);
    }

    #[test]
    fn missing_operation_field() {
        let err = parse_operation(b"{}", "doc:ns", &Protocol::default()).unwrap_err();
        assert!(matches!(err, SidetreeError::MissingField("operation")));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let protocol = Protocol {
            max_operation_byte_size: 2,
            ..Protocol::default()
        };
        let err = parse_operation(b"{\"operation\":\"create\"}", "doc:ns", &protocol).unwrap_err();
        assert!(matches!(err, SidetreeError::OperationTooLarge { .. }));
    }

    #[test]
    fn patch_data_requires_patches() {
        let empty = PatchData {
            patches: vec![],
            next_update_commitment_hash: multihash::compute_encoded(18, b"r").unwrap(),
        };
        let encoded = multihash::encode(&multihash::canonical_json(&empty).unwrap());
        assert!(matches!(
            parse_patch_data(&encoded, 18),
            Err(SidetreeError::MissingField("patches"))
        ));
    }

    #[test]
    fn suffix_data_rejects_bad_commitment() {
        let suffix_data = serde_json::json!({
            "patchDataHash": "notamultihash!",
            "recoveryKey": { "publicKeyMultibase": encode_multibase(KeyAlgorithm::Secp256k1, &[2u8; 33]) },
            "nextRecoveryCommitmentHash": multihash::compute_encoded(18, b"r").unwrap(),
        });
        let encoded = multihash::encode(&serde_json::to_vec(&suffix_data).unwrap());
        assert!(parse_suffix_data(&encoded, 18).is_err());
    }
}
