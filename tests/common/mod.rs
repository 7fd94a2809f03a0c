#![allow(dead_code)]

use std::sync::Arc;

use k256::ecdsa::signature::hazmat::PrehashSigner as _;
use k256::elliptic_curve::sec1::ToEncodedPoint as _;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use sidetree_engine::cas::MemCas;
use sidetree_engine::compression::ZstdDecompressor;
use sidetree_engine::document::{Document, ServiceEndpoint};
use sidetree_engine::handler::DocumentHandler;
use sidetree_engine::jws::{EcdsaVerifier, Jws};
use sidetree_engine::keys::{encode_multibase, KeyAlgorithm, PublicKey, RecoveryKey};
use sidetree_engine::multihash;
use sidetree_engine::operation::model::{AnchoredOperation, Operation, PatchData, SuffixData};
use sidetree_engine::patch::Patch;
use sidetree_engine::processor::OperationProcessor;
use sidetree_engine::protocol::{Protocol, ProtocolRegistry};
use sidetree_engine::provider::OperationProvider;
use sidetree_engine::store::MemOperationStore;

pub const NAMESPACE: &str = "doc:namespace";
pub const SHA2_256: u64 = 18;

/// A deterministic secp256k1 keypair for signing test operations.
pub struct TestKey {
    signing_key: k256::ecdsa::SigningKey,
    pub public: [u8; 33],
    pub multibase: String,
}

impl TestKey {
    pub fn secp256k1(seed: u8) -> Self {
        let signing_key =
            k256::ecdsa::SigningKey::from_slice(&[seed; 32]).expect("non-zero scalar");
        let point = signing_key.verifying_key().to_encoded_point(true);
        let mut public = [0u8; 33];
        public.copy_from_slice(point.as_bytes());
        let multibase = encode_multibase(KeyAlgorithm::Secp256k1, &public);
        Self {
            signing_key,
            public,
            multibase,
        }
    }

    pub fn recovery_key(&self) -> RecoveryKey {
        RecoveryKey {
            public_key_multibase: self.multibase.clone(),
        }
    }

    pub fn public_key(&self, id: &str) -> PublicKey {
        PublicKey {
            id: id.to_string(),
            key_type: "EcdsaSecp256k1VerificationKey2019".to_string(),
            public_key_multibase: self.multibase.clone(),
        }
    }

    /// Signs canonical JSON of `payload` as a flattened JWS.
    pub fn sign<T: Serialize>(&self, kid: Option<&str>, payload: &T) -> Jws {
        let mut header = serde_json::Map::new();
        header.insert("alg".to_string(), Value::String("ES256K".to_string()));
        if let Some(kid) = kid {
            header.insert("kid".to_string(), Value::String(kid.to_string()));
        }
        let protected =
            multihash::encode(&serde_json::to_vec(&Value::Object(header)).unwrap());
        let payload = multihash::encode(&multihash::canonical_json(payload).unwrap());

        let mut input = Vec::new();
        input.extend_from_slice(protected.as_bytes());
        input.push(b'.');
        input.extend_from_slice(payload.as_bytes());
        let hash = Sha256::digest(&input);
        let signature: k256::ecdsa::Signature = self.signing_key.sign_prehash(&hash).unwrap();

        Jws {
            protected,
            payload,
            signature: multihash::encode(&signature.to_bytes()),
        }
    }
}

pub fn commitment(reveal: &str) -> String {
    multihash::compute_encoded(SHA2_256, reveal.as_bytes()).unwrap()
}

pub fn doc_with_key(key: &TestKey, id: &str) -> Document {
    Document {
        public_keys: vec![key.public_key(id)],
        service: vec![],
    }
}

pub fn service(id: &str) -> ServiceEndpoint {
    ServiceEndpoint {
        id: id.to_string(),
        endpoint_type: "MessagingService".to_string(),
        service_endpoint: "https://example.com/inbox".to_string(),
    }
}

/// Builds patch data and its base-encoded canonical form.
pub fn make_patch_data(patches: Vec<Patch>, next_update_reveal: &str) -> (PatchData, String) {
    let patch_data = PatchData {
        patches,
        next_update_commitment_hash: commitment(next_update_reveal),
    };
    let encoded = multihash::encode(&multihash::canonical_json(&patch_data).unwrap());
    (patch_data, encoded)
}

/// Hash of already-encoded patch data, as carried in suffix data and
/// signed payloads.
pub fn patch_data_hash(encoded_patch_data: &str) -> String {
    let bytes = multihash::decode(encoded_patch_data).unwrap();
    multihash::compute_encoded(SHA2_256, &bytes).unwrap()
}

pub struct CreateFixture {
    pub request: Vec<u8>,
    pub encoded_suffix_data: String,
    pub encoded_patch_data: String,
    pub unique_suffix: String,
    pub id: String,
}

/// Builds a complete, valid create request.
pub fn create_fixture(
    recovery: &TestKey,
    document: Document,
    update_reveal: &str,
    recovery_reveal: &str,
) -> CreateFixture {
    let (_, encoded_patch_data) = make_patch_data(
        vec![Patch::Replace { document }],
        update_reveal,
    );
    let suffix_data = SuffixData {
        patch_data_hash: patch_data_hash(&encoded_patch_data),
        recovery_key: recovery.recovery_key(),
        next_recovery_commitment_hash: commitment(recovery_reveal),
    };
    let encoded_suffix_data =
        multihash::encode(&multihash::canonical_json(&suffix_data).unwrap());
    let unique_suffix =
        multihash::unique_suffix_from_encoded(&encoded_suffix_data, SHA2_256).unwrap();
    let id = format!("{NAMESPACE}:{unique_suffix}");

    let request = serde_json::to_vec(&json!({
        "operation": "create",
        "suffixData": encoded_suffix_data,
        "patchData": encoded_patch_data,
    }))
    .unwrap();

    CreateFixture {
        request,
        encoded_suffix_data,
        encoded_patch_data,
        unique_suffix,
        id,
    }
}

/// Everything wired together around an in-memory CAS and store.
pub struct Engine {
    pub cas: Arc<MemCas>,
    pub provider: Arc<OperationProvider>,
    pub store: Arc<MemOperationStore>,
    pub handler: DocumentHandler,
}

pub fn engine() -> Engine {
    engine_with_protocol(Protocol::default())
}

pub fn engine_with_protocol(protocol: Protocol) -> Engine {
    let cas = Arc::new(MemCas::new());
    let registry = Arc::new(ProtocolRegistry::new().with(NAMESPACE, protocol));
    let provider = Arc::new(OperationProvider::new(
        cas.clone(),
        registry.clone(),
        Arc::new(ZstdDecompressor::new()),
    ));
    let store = Arc::new(MemOperationStore::new());
    let processor = OperationProcessor::new(
        NAMESPACE,
        store.clone(),
        Arc::new(EcdsaVerifier::new()),
    );
    let handler = DocumentHandler::new(NAMESPACE, registry, processor);
    Engine {
        cas,
        provider,
        store,
        handler,
    }
}

pub fn new_processor(store: Arc<MemOperationStore>) -> OperationProcessor {
    OperationProcessor::new(NAMESPACE, store, Arc::new(EcdsaVerifier::new()))
}

/// Compresses and stores a batch file, returning its content address.
pub fn put_file(cas: &MemCas, content: &Value) -> String {
    let raw = serde_json::to_vec(content).unwrap();
    cas.put(zstd::stream::encode_all(&raw[..], 3).unwrap())
}

pub fn anchored(
    operation: Operation,
    transaction_time: u64,
    transaction_number: u64,
    operation_index: usize,
) -> AnchoredOperation {
    AnchoredOperation {
        operation,
        transaction_time,
        transaction_number,
        operation_index,
    }
}
