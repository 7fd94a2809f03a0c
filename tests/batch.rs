mod common;

use common::*;

use serde_json::json;

use sidetree_engine::cancel::CancellationToken;
use sidetree_engine::error::SidetreeError;
use sidetree_engine::multihash;
use sidetree_engine::operation::model::{DeactivateSignedData, OperationType, RecoverSignedData, UpdateSignedData};
use sidetree_engine::patch::Patch;
use sidetree_engine::protocol::Protocol;
use sidetree_engine::provider::AnchorTransaction;

fn txn(anchor_string: String) -> AnchorTransaction {
    AnchorTransaction {
        anchor_string,
        namespace: NAMESPACE.to_string(),
        transaction_time: 1,
        transaction_number: 1,
    }
}

fn deactivate_reference(recovery: &TestKey, suffix: &str, reveal: &str) -> serde_json::Value {
    let signed = recovery.sign(
        None,
        &DeactivateSignedData {
            did_suffix: suffix.to_string(),
            recovery_reveal_value: reveal.to_string(),
        },
    );
    json!({ "didSuffix": suffix, "signedData": signed })
}

#[test]
fn deactivate_only_batch_has_no_map_file() {
    let engine = engine();
    let recovery = TestKey::secp256k1(1);

    let anchor_file = json!({
        "operations": {
            "deactivate": [
                deactivate_reference(&recovery, "suffix-1", "r1"),
                deactivate_reference(&recovery, "suffix-2", "r2"),
                deactivate_reference(&recovery, "suffix-3", "r3"),
            ],
        },
    });
    let address = put_file(&engine.cas, &anchor_file);

    let operations = engine
        .provider
        .transaction_operations(&txn(format!("3.{address}")), &CancellationToken::new())
        .unwrap();

    assert_eq!(operations.len(), 3);
    for (index, op) in operations.iter().enumerate() {
        assert_eq!(op.operation.op_type(), OperationType::Deactivate);
        assert_eq!(op.operation_index, index);
        assert_eq!(op.operation.namespace, NAMESPACE);
    }
    assert_eq!(operations[1].operation.unique_suffix, "suffix-2");
    assert_eq!(operations[1].operation.id, "doc:namespace:suffix-2");

    // declared count disagreeing with the file fails the whole batch
    let err = engine
        .provider
        .transaction_operations(&txn(format!("2.{address}")), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::CountMismatch { declared: 2, assembled: 3 }));
}

#[test]
fn full_batch_assembles_in_canonical_order_with_deltas() {
    let engine = engine();
    let recovery = TestKey::secp256k1(1);
    let signing = TestKey::secp256k1(2);
    let new_recovery = TestKey::secp256k1(3);

    let create = create_fixture(
        &recovery,
        doc_with_key(&signing, "key-1"),
        "updateReveal",
        "recoveryReveal",
    );

    // recover delta + signed data (targets an unrelated suffix)
    let (_, recover_delta) = make_patch_data(
        vec![Patch::Replace { document: Default::default() }],
        "updateReveal2",
    );
    let recover_signed = recovery.sign(
        None,
        &RecoverSignedData {
            recovery_reveal_value: "recoveryReveal".to_string(),
            recovery_key: new_recovery.recovery_key(),
            next_recovery_commitment_hash: commitment("recoveryReveal2"),
            patch_data_hash: patch_data_hash(&recover_delta),
        },
    );

    // update delta + signed data
    let (_, update_delta) = make_patch_data(
        vec![Patch::AddServiceEndpoints { service_endpoints: vec![service("svc-1")] }],
        "updateReveal3",
    );
    let update_signed = signing.sign(
        Some("key-1"),
        &UpdateSignedData {
            update_reveal_value: "updateReveal".to_string(),
            patch_data_hash: patch_data_hash(&update_delta),
        },
    );

    let chunk_file = json!({
        "deltas": [&create.encoded_patch_data, &recover_delta, &update_delta],
    });
    let chunk_address = put_file(&engine.cas, &chunk_file);

    let map_file = json!({
        "chunks": [{ "chunkFileUri": chunk_address }],
        "operations": {
            "update": [{ "didSuffix": &create.unique_suffix, "signedData": update_signed }],
        },
    });
    let map_address = put_file(&engine.cas, &map_file);

    let anchor_file = json!({
        "mapFileHash": map_address,
        "operations": {
            "create": [{ "suffixData": &create.encoded_suffix_data }],
            "recover": [{ "didSuffix": "recover-target", "signedData": recover_signed }],
        },
    });
    let anchor_address = put_file(&engine.cas, &anchor_file);

    let operations = engine
        .provider
        .transaction_operations(&txn(format!("3.{anchor_address}")), &CancellationToken::new())
        .unwrap();

    assert_eq!(operations.len(), 3);
    let types: Vec<_> = operations
        .iter()
        .map(|op| op.operation.op_type())
        .collect();
    assert_eq!(
        types,
        vec![
            OperationType::Create,
            OperationType::Recover,
            OperationType::Update,
        ]
    );

    // creates derive their suffix from suffix data
    assert_eq!(operations[0].operation.unique_suffix, create.unique_suffix);
    // every non-deactivate operation carries its positional delta, parsed
    for (op, expected_reveal) in operations.iter().zip(["updateReveal", "updateReveal2", "updateReveal3"]) {
        let patch_data = op.operation.patch_data().expect("delta attached");
        assert_eq!(patch_data.next_update_commitment_hash, commitment(expected_reveal));
    }
    assert_eq!(
        operations.iter().map(|op| op.operation_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn chunk_delta_count_must_match_operations() {
    let engine = engine();
    let recovery = TestKey::secp256k1(1);
    let create = create_fixture(&recovery, Default::default(), "u1", "r1");

    let chunk_address = put_file(&engine.cas, &json!({ "deltas": [] }));
    let map_address = put_file(
        &engine.cas,
        &json!({ "chunks": [{ "chunkFileUri": chunk_address }] }),
    );
    let anchor_address = put_file(
        &engine.cas,
        &json!({
            "mapFileHash": map_address,
            "operations": { "create": [{ "suffixData": &create.encoded_suffix_data }] },
        }),
    );

    let err = engine
        .provider
        .transaction_operations(&txn(format!("1.{anchor_address}")), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::CountMismatch { .. }));
}

#[test]
fn anchor_file_size_cap_applies_before_decompression() {
    let engine = engine_with_protocol(Protocol {
        max_anchor_file_size: 4,
        ..Protocol::default()
    });
    let recovery = TestKey::secp256k1(1);
    let anchor_file = json!({
        "operations": { "deactivate": [deactivate_reference(&recovery, "s", "r")] },
    });
    let address = put_file(&engine.cas, &anchor_file);

    let err = engine
        .provider
        .transaction_operations(&txn(format!("1.{address}")), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::FileTooLarge { kind: "compressed", .. }));
}

#[test]
fn corrupt_compressed_content_fails_batch() {
    let engine = engine();
    let address = engine.cas.put(b"not zstd at all".to_vec());
    let err = engine
        .provider
        .transaction_operations(&txn(format!("1.{address}")), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::Malformed(_)));
}

#[test]
fn missing_cas_content_is_unavailable() {
    let engine = engine();
    let err = engine
        .provider
        .transaction_operations(&txn("1.QmMissing".to_string()), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::CasUnavailable(_)));
}

#[test]
fn unregistered_namespace_fails() {
    let engine = engine();
    let transaction = AnchorTransaction {
        anchor_string: "1.QmAddr".to_string(),
        namespace: "doc:other".to_string(),
        transaction_time: 1,
        transaction_number: 1,
    };
    let err = engine
        .provider
        .transaction_operations(&transaction, &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::UnknownNamespace(_)));
}

#[test]
fn cancelled_token_aborts_before_fetch() {
    let engine = engine();
    let recovery = TestKey::secp256k1(1);
    let anchor_file = json!({
        "operations": { "deactivate": [deactivate_reference(&recovery, "s", "r")] },
    });
    let address = put_file(&engine.cas, &anchor_file);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine
        .provider
        .transaction_operations(&txn(format!("1.{address}")), &cancel)
        .unwrap_err();
    assert!(matches!(err, SidetreeError::Cancelled));
}

#[test]
fn anchor_string_must_be_well_formed() {
    let engine = engine();
    for bad in ["QmNoDotCount", "03.QmAddr", "a.QmAddr"] {
        let err = engine
            .provider
            .transaction_operations(&txn(bad.to_string()), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, SidetreeError::InvalidAnchorString(_)), "for [{bad}]");
    }
}

#[test]
fn declared_count_beyond_batch_maximum_fails() {
    let engine = engine_with_protocol(Protocol {
        max_operations_per_batch: 2,
        ..Protocol::default()
    });
    let err = engine
        .provider
        .transaction_operations(&txn("3.QmAddr".to_string()), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::InvalidAnchorString(_)));
}

#[test]
fn oversized_decompressed_chunk_fails_batch() {
    let engine = engine_with_protocol(Protocol {
        max_chunk_file_size: 64,
        ..Protocol::default()
    });
    let recovery = TestKey::secp256k1(1);
    let create = create_fixture(&recovery, Default::default(), "u1", "r1");

    // chunk content far beyond 64 bytes decompressed
    let big_delta = multihash::encode(&vec![b'x'; 4096]);
    let chunk_address = put_file(&engine.cas, &json!({ "deltas": [big_delta] }));
    let map_address = put_file(
        &engine.cas,
        &json!({ "chunks": [{ "chunkFileUri": chunk_address }] }),
    );
    let anchor_address = put_file(
        &engine.cas,
        &json!({
            "mapFileHash": map_address,
            "operations": { "create": [{ "suffixData": &create.encoded_suffix_data }] },
        }),
    );

    let err = engine
        .provider
        .transaction_operations(&txn(format!("1.{anchor_address}")), &CancellationToken::new())
        .unwrap_err();
    assert!(matches!(err, SidetreeError::FileTooLarge { .. }));
}
