//! The three-tier batch file format: anchor, map and chunk files.
//!
//! Each file is parsed from a decompressed byte buffer. Parse failure is
//! fatal for the whole batch.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SidetreeError};
use crate::jws::Jws;
use crate::multihash;

/// A create operation reference: suffix data only, the delta arrives via
/// the chunk file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReference {
    pub suffix_data: String,
}

/// A recover/update/deactivate reference: the target suffix plus the
/// operation's signed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedReference {
    pub did_suffix: String,
    pub signed_data: Jws,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<CreateReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recover: Vec<SignedReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deactivate: Vec<SignedReference>,
}

/// Top tier of a batch. An empty `map_file_hash` means the batch carries
/// only deactivate operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorFile {
    #[serde(default)]
    pub map_file_hash: String,
    #[serde(default)]
    pub operations: AnchorOperations,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReference {
    pub chunk_file_uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<SignedReference>,
}

/// Middle tier: update references and the chunk list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapFile {
    pub chunks: Vec<ChunkReference>,
    #[serde(default)]
    pub operations: MapOperations,
}

/// Bottom tier: deltas positionally aligned with the batch's canonical
/// create → recover → update ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFile {
    pub deltas: Vec<String>,
}

pub fn parse_anchor_file(content: &[u8], hash_code: u64) -> Result<AnchorFile> {
    let file: AnchorFile = serde_json::from_slice(content)
        .map_err(|e| SidetreeError::Malformed(format!("anchor file: {e}")))?;
    if !file.map_file_hash.is_empty() {
        multihash::validate_encoded(hash_code, &file.map_file_hash)
            .map_err(|_| SidetreeError::Malformed("anchor file: invalid map file hash".into()))?;
    }
    Ok(file)
}

pub fn parse_map_file(content: &[u8]) -> Result<MapFile> {
    let file: MapFile = serde_json::from_slice(content)
        .map_err(|e| SidetreeError::Malformed(format!("map file: {e}")))?;
    if file.chunks.is_empty() {
        return Err(SidetreeError::Malformed(
            "map file: at least one chunk reference is required".into(),
        ));
    }
    Ok(file)
}

pub fn parse_chunk_file(content: &[u8]) -> Result<ChunkFile> {
    serde_json::from_slice(content)
        .map_err(|e| SidetreeError::Malformed(format!("chunk file: {e}")))
}
