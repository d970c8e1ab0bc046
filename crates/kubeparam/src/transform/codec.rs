//! Serialization, digest and base64 helpers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::TransformError;

const YAML_HEADER: &str = "---\n";

pub fn parse_yaml(text: &str) -> Result<Value, TransformError> {
    serde_yaml::from_str(text).map_err(|e| TransformError::Parse(e.to_string()))
}

/// Serializes `value` as a YAML document, with a leading `---` marker unless
/// `no_header` is set.
pub fn to_yaml(value: &Value, no_header: bool) -> Result<String, TransformError> {
    let body = serde_yaml::to_string(value).map_err(|e| TransformError::Serialize(e.to_string()))?;
    if no_header {
        Ok(body)
    } else {
        Ok(format!("{}{}", YAML_HEADER, body))
    }
}

pub fn parse_json(text: &str) -> Result<Value, TransformError> {
    serde_json::from_str(text).map_err(|e| TransformError::Parse(e.to_string()))
}

pub fn to_json(value: &Value) -> Result<String, TransformError> {
    serde_json::to_string(value).map_err(|e| TransformError::Serialize(e.to_string()))
}

/// Lowercase hex SHA-256 digest of `text`.
pub fn sha256(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

pub fn encode64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode64(text: &str) -> Result<String, TransformError> {
    let bytes = STANDARD
        .decode(text.as_bytes())
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| TransformError::Decode(e.to_string()))
}
