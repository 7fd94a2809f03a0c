//! Document patches: the tagged mutations carried inside patch data.

use serde::{Deserialize, Serialize};

use crate::document::{Document, ServiceEndpoint};
use crate::error::{Result, SidetreeError};
use crate::keys::{decode_multibase, PublicKey};

/// A single document mutation. The `action` discriminator selects the
/// variant; unknown actions fail deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Patch {
    #[serde(rename = "replace")]
    Replace { document: Document },
    #[serde(rename = "add-public-keys")]
    AddPublicKeys {
        #[serde(rename = "publicKeys")]
        public_keys: Vec<PublicKey>,
    },
    #[serde(rename = "remove-public-keys")]
    RemovePublicKeys {
        #[serde(rename = "publicKeys")]
        public_keys: Vec<String>,
    },
    #[serde(rename = "add-service-endpoints")]
    AddServiceEndpoints {
        #[serde(rename = "serviceEndpoints")]
        service_endpoints: Vec<ServiceEndpoint>,
    },
    #[serde(rename = "remove-service-endpoints")]
    RemoveServiceEndpoints {
        #[serde(rename = "serviceEndpoints")]
        service_endpoints: Vec<String>,
    },
}

impl Patch {
    /// Tag-specific schema checks, applied at parse time so replay never
    /// sees a structurally invalid patch.
    pub fn validate(&self) -> Result<()> {
        match self {
            Patch::Replace { document } => document.validate(),
            Patch::AddPublicKeys { public_keys } => {
                if public_keys.is_empty() {
                    return Err(SidetreeError::InvalidPatch(
                        "add-public-keys requires at least one key".into(),
                    ));
                }
                for (i, key) in public_keys.iter().enumerate() {
                    if key.id.is_empty() {
                        return Err(SidetreeError::InvalidPatch("public key id is empty".into()));
                    }
                    if public_keys[..i].iter().any(|prev| prev.id == key.id) {
                        return Err(SidetreeError::InvalidPatch(format!(
                            "duplicate public key id `{}`",
                            key.id
                        )));
                    }
                    decode_multibase(&key.public_key_multibase)?;
                }
                Ok(())
            }
            Patch::RemovePublicKeys { public_keys } => {
                if public_keys.is_empty() {
                    return Err(SidetreeError::InvalidPatch(
                        "remove-public-keys requires at least one id".into(),
                    ));
                }
                Ok(())
            }
            Patch::AddServiceEndpoints { service_endpoints } => {
                if service_endpoints.is_empty() {
                    return Err(SidetreeError::InvalidPatch(
                        "add-service-endpoints requires at least one endpoint".into(),
                    ));
                }
                for (i, service) in service_endpoints.iter().enumerate() {
                    if service.id.is_empty() {
                        return Err(SidetreeError::InvalidPatch("service id is empty".into()));
                    }
                    if service_endpoints[..i].iter().any(|prev| prev.id == service.id) {
                        return Err(SidetreeError::InvalidPatch(format!(
                            "duplicate service id `{}`",
                            service.id
                        )));
                    }
                }
                Ok(())
            }
            Patch::RemoveServiceEndpoints { service_endpoints } => {
                if service_endpoints.is_empty() {
                    return Err(SidetreeError::InvalidPatch(
                        "remove-service-endpoints requires at least one id".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Applies this patch to `document`. Adds replace an existing entry
    /// with the same id rather than duplicating it.
    pub fn apply(&self, document: &mut Document) {
        match self {
            Patch::Replace { document: new_doc } => {
                *document = new_doc.clone();
            }
            Patch::AddPublicKeys { public_keys } => {
                for key in public_keys {
                    match document.public_keys.iter_mut().find(|k| k.id == key.id) {
                        Some(existing) => *existing = key.clone(),
                        None => document.public_keys.push(key.clone()),
                    }
                }
            }
            Patch::RemovePublicKeys { public_keys } => {
                document
                    .public_keys
                    .retain(|key| !public_keys.contains(&key.id));
            }
            Patch::AddServiceEndpoints { service_endpoints } => {
                for service in service_endpoints {
                    match document.service.iter_mut().find(|s| s.id == service.id) {
                        Some(existing) => *existing = service.clone(),
                        None => document.service.push(service.clone()),
                    }
                }
            }
            Patch::RemoveServiceEndpoints { service_endpoints } => {
                document
                    .service
                    .retain(|service| !service_endpoints.contains(&service.id));
            }
        }
    }
}

/// Folds a patch list over a document.
pub fn apply_patches(patches: &[Patch], mut document: Document) -> Document {
    for patch in patches {
        patch.apply(&mut document);
    }
    document
}
