//! DID identifier composition and parsing.
//!
//! A DID is `<namespace>:<unique-suffix>`. The namespace may itself contain
//! colons, so splitting always uses the last delimiter.

use crate::error::{Result, SidetreeError};
use crate::multihash;

/// Separates the namespace from the unique suffix.
pub const NAMESPACE_DELIMITER: char = ':';

/// Marks an unpublished create request appended to a DID.
pub const INITIAL_VALUES_PARAM: &str = ";initial-values=";

/// Composes a DID from base-encoded suffix data.
pub fn calculate_id(namespace: &str, encoded_suffix_data: &str, code: u64) -> Result<String> {
    let suffix = multihash::unique_suffix_from_encoded(encoded_suffix_data, code)?;
    Ok(compose_id(namespace, &suffix))
}

pub fn compose_id(namespace: &str, unique_suffix: &str) -> String {
    let mut id = String::with_capacity(namespace.len() + 1 + unique_suffix.len());
    id.push_str(namespace);
    id.push(NAMESPACE_DELIMITER);
    id.push_str(unique_suffix);
    id
}

/// Returns the namespace portion of an ID, splitting on the last delimiter.
pub fn namespace_from_id(id: &str) -> Result<&str> {
    match id.rfind(NAMESPACE_DELIMITER) {
        Some(pos) => Ok(&id[..pos]),
        None => Err(SidetreeError::Malformed(format!("invalid ID [{id}]"))),
    }
}

/// Extracts the unique portion of an ID under a configured namespace.
pub fn unique_portion<'a>(namespace: &str, id: &'a str) -> Result<&'a str> {
    let prefix_len = namespace.len() + 1;
    if id.len() < prefix_len
        || !id.starts_with(namespace)
        || id.as_bytes()[namespace.len()] != NAMESPACE_DELIMITER as u8
    {
        return Err(SidetreeError::NamespaceMismatch(namespace.to_string()));
    }
    let unique = &id[prefix_len..];
    if unique.is_empty() {
        return Err(SidetreeError::Malformed("unique portion is empty".into()));
    }
    Ok(unique)
}

/// Splits a DID from its optional `;initial-values=` payload. An empty value
/// after the delimiter is an error.
pub fn split_initial_values(did: &str) -> Result<(&str, Option<&str>)> {
    match did.find(INITIAL_VALUES_PARAM) {
        None => Ok((did, None)),
        Some(pos) => {
            let initial = &did[pos + INITIAL_VALUES_PARAM.len()..];
            if initial.is_empty() {
                return Err(SidetreeError::InitialValuesEmpty);
            }
            Ok((&did[..pos], Some(initial)))
        }
    }
}
