//! Internal DID document state and its external resolution envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SidetreeError};
use crate::keys::PublicKey;

/// A service endpoint entry of a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub endpoint_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// The document state carried through replay. Only the two recognized
/// top-level sections exist; anything else fails parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(rename = "publicKey", default, skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<PublicKey>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service: Vec<ServiceEndpoint>,
}

impl Document {
    pub fn find_public_key(&self, id: &str) -> Option<&PublicKey> {
        self.public_keys.iter().find(|key| key.id == id)
    }

    /// Validates structural rules: non-empty, unique key and service ids,
    /// decodable key material.
    pub fn validate(&self) -> Result<()> {
        for (i, key) in self.public_keys.iter().enumerate() {
            if key.id.is_empty() {
                return Err(SidetreeError::InvalidPatch("public key id is empty".into()));
            }
            if self.public_keys[..i].iter().any(|prev| prev.id == key.id) {
                return Err(SidetreeError::InvalidPatch(format!(
                    "duplicate public key id `{}`",
                    key.id
                )));
            }
            key.decode()?;
        }
        for (i, service) in self.service.iter().enumerate() {
            if service.id.is_empty() {
                return Err(SidetreeError::InvalidPatch("service id is empty".into()));
            }
            if self.service[..i].iter().any(|prev| prev.id == service.id) {
                return Err(SidetreeError::InvalidPatch(format!(
                    "duplicate service id `{}`",
                    service.id
                )));
            }
        }
        Ok(())
    }

    /// External form: the internal sections plus the DID as `id`.
    pub fn to_external(&self, id: &str) -> Result<Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| SidetreeError::Malformed(e.to_string()))?;
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        Ok(value)
    }
}

/// Method-level metadata attached to every resolution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    pub published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_commitment: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deactivated: bool,
}

/// The envelope returned by resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub document: Value,
    pub method_metadata: MethodMetadata,
}
