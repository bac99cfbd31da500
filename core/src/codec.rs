//! Pluggable JSON encode/decode capability.
//!
//! The executor is generic over `JsonCodec`; `SerdeJsonCodec` is the default.
//! An alternative implementation is injected at construction with
//! `JsonNetworkClient::with_codec`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::error::BoxError;

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value cannot be represented as JSON.
    #[error("value cannot be represented as JSON: {0}")]
    Unrepresentable(#[source] BoxError),

    /// The JSON text does not match the shape of the target type.
    #[error("JSON does not match the expected type: {0}")]
    Mismatch(#[source] BoxError),
}

/// Encodes values to JSON text and decodes JSON text into typed values.
pub trait JsonCodec {
    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError>;

    fn from_json<T: DeserializeOwned>(&self, json: &str) -> Result<T, CodecError>;
}

/// `serde_json` backed codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Unrepresentable(Box::new(e)))
    }

    fn from_json<T: DeserializeOwned>(&self, json: &str) -> Result<T, CodecError> {
        serde_json::from_str(json).map_err(|e| CodecError::Mismatch(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Named {
        name: String,
    }

    #[test]
    fn decodes_matching_shape() {
        let named: Named = SerdeJsonCodec.from_json(r#"{"name":"a"}"#).unwrap();
        assert_eq!(named.name, "a");
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let err = SerdeJsonCodec.from_json::<Named>(r#"{"title":"a"}"#).unwrap_err();
        assert!(matches!(err, CodecError::Mismatch(_)));
        let err = SerdeJsonCodec.from_json::<Named>("not json").unwrap_err();
        assert!(matches!(err, CodecError::Mismatch(_)));
    }

    #[test]
    fn encodes_to_compact_json() {
        let json = SerdeJsonCodec
            .to_json(&Named {
                name: "b".to_string(),
            })
            .unwrap();
        assert_eq!(json, r#"{"name":"b"}"#);
    }

    #[test]
    fn non_string_map_keys_are_unrepresentable() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        let err = SerdeJsonCodec.to_json(&map).unwrap_err();
        assert!(matches!(err, CodecError::Unrepresentable(_)));
    }
}
