//! Batch assembly: turns one anchor transaction into its ordered
//! operation list by fetching and aligning the three batch files.

use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancellationToken;
use crate::cas::{CasClient, CasError};
use crate::compression::DecompressionProvider;
use crate::did;
use crate::error::{Result, SidetreeError};
use crate::files::{self, AnchorFile, ChunkFile, MapFile};
use crate::multihash;
use crate::operation::model::{AnchoredOperation, Operation, OperationKind};
use crate::operation::parse::{parse_patch_data, parse_suffix_data};
use crate::protocol::{ClientProvider, Protocol};

/// An anchor transaction observed on the ordering service.
#[derive(Debug, Clone)]
pub struct AnchorTransaction {
    pub anchor_string: String,
    pub namespace: String,
    pub transaction_time: u64,
    pub transaction_number: u64,
}

/// Parsed anchor string: declared operation count and the anchor file
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorData {
    pub num_operations: usize,
    pub anchor_address: String,
}

/// Parses `<decimal-count>.<content-address>`. Leading zeros and a zero
/// count are rejected.
pub fn parse_anchor_data(anchor_string: &str) -> Result<AnchorData> {
    let (count, address) = anchor_string.split_once('.').ok_or_else(|| {
        SidetreeError::InvalidAnchorString(format!(
            "expected <count>.<address>, got [{anchor_string}]"
        ))
    })?;

    if count.is_empty() || count.starts_with('0') || !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SidetreeError::InvalidAnchorString(format!(
            "invalid operation count [{count}]"
        )));
    }
    let num_operations: usize = count
        .parse()
        .map_err(|_| SidetreeError::InvalidAnchorString(format!("invalid operation count [{count}]")))?;

    if address.is_empty() {
        return Err(SidetreeError::InvalidAnchorString(
            "anchor address is empty".into(),
        ));
    }

    Ok(AnchorData {
        num_operations,
        anchor_address: address.to_string(),
    })
}

/// Assembles batch operations from batch files fetched out of CAS.
/// Pure given its inputs: any failure rejects the entire batch and commits
/// nothing, so the caller may retry the whole anchor on transient errors.
pub struct OperationProvider {
    cas: Arc<dyn CasClient>,
    protocols: Arc<dyn ClientProvider>,
    decompressor: Arc<dyn DecompressionProvider>,
}

impl OperationProvider {
    pub fn new(
        cas: Arc<dyn CasClient>,
        protocols: Arc<dyn ClientProvider>,
        decompressor: Arc<dyn DecompressionProvider>,
    ) -> Self {
        Self {
            cas,
            protocols,
            decompressor,
        }
    }

    /// Reads the batch files for `txn` and assembles the full ordered
    /// operation list it declares.
    pub fn transaction_operations(
        &self,
        txn: &AnchorTransaction,
        cancel: &CancellationToken,
    ) -> Result<Vec<AnchoredOperation>> {
        let anchor_data = parse_anchor_data(&txn.anchor_string)?;
        let protocol = self.protocols.for_namespace(&txn.namespace)?.current();

        if anchor_data.num_operations > protocol.max_operations_per_batch {
            return Err(SidetreeError::InvalidAnchorString(format!(
                "declared operation count {} exceeds batch maximum {}",
                anchor_data.num_operations, protocol.max_operations_per_batch
            )));
        }

        let anchor_file = self.fetch_anchor_file(&anchor_data.anchor_address, &protocol, cancel)?;

        if anchor_file.map_file_hash.is_empty() {
            // deactivate-only batch
            let operations = self.assemble(&anchor_file, None, None, txn, &protocol)?;
            return check_count(operations, anchor_data.num_operations);
        }

        let map_file = self.fetch_map_file(&anchor_file.map_file_hash, &protocol, cancel)?;
        let chunk_address = &map_file.chunks[0].chunk_file_uri;
        let chunk_file = self.fetch_chunk_file(chunk_address, &protocol, cancel)?;

        let operations =
            self.assemble(&anchor_file, Some(&map_file), Some(&chunk_file), txn, &protocol)?;
        check_count(operations, anchor_data.num_operations)
    }

    fn assemble(
        &self,
        anchor_file: &AnchorFile,
        map_file: Option<&MapFile>,
        chunk_file: Option<&ChunkFile>,
        txn: &AnchorTransaction,
        protocol: &Protocol,
    ) -> Result<Vec<AnchoredOperation>> {
        let code = protocol.hash_algorithm_code;
        let mut operations = Vec::new();

        for create in &anchor_file.operations.create {
            let suffix_data = parse_suffix_data(&create.suffix_data, code)?;
            let unique_suffix = multihash::unique_suffix_from_encoded(&create.suffix_data, code)?;
            operations.push(self.bare_operation(
                txn,
                unique_suffix,
                code,
                OperationKind::Create {
                    encoded_suffix_data: create.suffix_data.clone(),
                    suffix_data,
                    encoded_patch_data: None,
                    patch_data: None,
                },
            ));
        }

        for recover in &anchor_file.operations.recover {
            operations.push(self.bare_operation(
                txn,
                recover.did_suffix.clone(),
                code,
                OperationKind::Recover {
                    signed_data: recover.signed_data.clone(),
                    encoded_patch_data: None,
                    patch_data: None,
                },
            ));
        }

        if let Some(map_file) = map_file {
            for update in &map_file.operations.update {
                operations.push(self.bare_operation(
                    txn,
                    update.did_suffix.clone(),
                    code,
                    OperationKind::Update {
                        signed_data: update.signed_data.clone(),
                        encoded_patch_data: None,
                        patch_data: None,
                    },
                ));
            }
        }

        let with_delta = operations.len();

        for deactivate in &anchor_file.operations.deactivate {
            operations.push(self.bare_operation(
                txn,
                deactivate.did_suffix.clone(),
                code,
                OperationKind::Deactivate {
                    signed_data: deactivate.signed_data.clone(),
                },
            ));
        }

        debug!(
            create = anchor_file.operations.create.len(),
            recover = anchor_file.operations.recover.len(),
            update = map_file.map(|m| m.operations.update.len()).unwrap_or(0),
            deactivate = anchor_file.operations.deactivate.len(),
            "parsed batch operations"
        );

        if let Some(chunk_file) = chunk_file {
            // Deltas align positionally with the non-deactivate prefix of
            // the canonical ordering.
            if chunk_file.deltas.len() != with_delta {
                return Err(SidetreeError::CountMismatch {
                    declared: with_delta,
                    assembled: chunk_file.deltas.len(),
                });
            }
            for (operation, delta) in operations.iter_mut().zip(&chunk_file.deltas) {
                let parsed = parse_patch_data(delta, code)?;
                operation.operation.set_patch_data(delta.clone(), parsed);
            }
        } else if with_delta != 0 {
            return Err(SidetreeError::Malformed(
                "batch without map file may only contain deactivate operations".into(),
            ));
        }

        for (index, operation) in operations.iter_mut().enumerate() {
            operation.operation_index = index;
        }
        Ok(operations)
    }

    fn bare_operation(
        &self,
        txn: &AnchorTransaction,
        unique_suffix: String,
        code: u64,
        kind: OperationKind,
    ) -> AnchoredOperation {
        let id = did::compose_id(&txn.namespace, &unique_suffix);
        AnchoredOperation {
            operation: Operation {
                namespace: txn.namespace.clone(),
                unique_suffix,
                id,
                operation_buffer: Vec::new(),
                hash_algorithm_code: code,
                kind,
            },
            transaction_time: txn.transaction_time,
            transaction_number: txn.transaction_number,
            operation_index: 0,
        }
    }

    fn fetch_anchor_file(
        &self,
        address: &str,
        protocol: &Protocol,
        cancel: &CancellationToken,
    ) -> Result<AnchorFile> {
        let content = self.read_from_cas(address, protocol, protocol.max_anchor_file_size, cancel)?;
        files::parse_anchor_file(&content, protocol.hash_algorithm_code)
    }

    fn fetch_map_file(
        &self,
        address: &str,
        protocol: &Protocol,
        cancel: &CancellationToken,
    ) -> Result<MapFile> {
        let content = self.read_from_cas(address, protocol, protocol.max_map_file_size, cancel)?;
        files::parse_map_file(&content)
    }

    fn fetch_chunk_file(
        &self,
        address: &str,
        protocol: &Protocol,
        cancel: &CancellationToken,
    ) -> Result<ChunkFile> {
        let content = self.read_from_cas(address, protocol, protocol.max_chunk_file_size, cancel)?;
        files::parse_chunk_file(&content)
    }

    /// Fetches one content address and decompresses it. The size cap is
    /// enforced on the fetched bytes before decompression and again on the
    /// decompressed output.
    fn read_from_cas(
        &self,
        address: &str,
        protocol: &Protocol,
        max_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(SidetreeError::Cancelled);
        }

        let bytes = self.cas.read(address).map_err(|e| match e {
            CasError::Timeout(d) => SidetreeError::Timeout(format!("CAS read [{address}]: {d:?}")),
            other => SidetreeError::CasUnavailable(format!("[{address}]: {other}")),
        })?;

        if bytes.len() > max_size {
            return Err(SidetreeError::FileTooLarge {
                kind: "compressed",
                size: bytes.len(),
                max: max_size,
            });
        }

        if cancel.is_cancelled() {
            return Err(SidetreeError::Cancelled);
        }
        self.decompressor
            .decompress(&protocol.compression_algorithm, &bytes, max_size)
    }
}

fn check_count(
    operations: Vec<AnchoredOperation>,
    declared: usize,
) -> Result<Vec<AnchoredOperation>> {
    if operations.len() != declared {
        return Err(SidetreeError::CountMismatch {
            declared,
            assembled: operations.len(),
        });
    }
    Ok(operations)
}
