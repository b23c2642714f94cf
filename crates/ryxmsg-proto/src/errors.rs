//! Error types for encoding and decoding protocol data.

use thiserror::Error;

/// Result alias for protocol data operations.
pub type Result<T> = std::result::Result<T, ProtoError>;

/// Errors raised while encoding or decoding protocol data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// CBOR serialization failed.
    #[error("failed to encode {what}: {reason}")]
    Encode {
        /// Kind of value being encoded.
        what: &'static str,
        /// Underlying serializer message.
        reason: String,
    },

    /// CBOR deserialization failed.
    #[error("failed to decode {what}: {reason}")]
    Decode {
        /// Kind of value being decoded.
        what: &'static str,
        /// Underlying deserializer message.
        reason: String,
    },

    /// A key field was empty where a public key is required.
    #[error("{field} must not be empty")]
    EmptyKey {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Serialize `value` to CBOR.
pub(crate) fn to_cbor<T: serde::Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtoError::Encode { what, reason: e.to_string() })?;
    Ok(buf)
}

/// Deserialize a CBOR value.
pub(crate) fn from_cbor<T: serde::de::DeserializeOwned>(
    what: &'static str,
    bytes: &[u8],
) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtoError::Decode { what, reason: e.to_string() })
}
