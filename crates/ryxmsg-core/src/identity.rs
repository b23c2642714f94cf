//! Peer identities and their shareable string form.
//!
//! An identity is the binary contact card produced by the protocol service.
//! It travels between humans as base58 text (Bitcoin alphabet). Decoding is
//! strict: the string must be exactly what [`encode`] would have produced, so
//! whitespace, foreign characters and oversized inputs are rejected instead
//! of being silently normalized.

use std::{fmt, str::FromStr};

use crate::error::SessionError;

/// Largest accepted identity, in bytes.
pub const MAX_IDENTITY_LEN: usize = 4096;

/// Longest base58 string [`encode`] can produce for [`MAX_IDENTITY_LEN`]
/// bytes (log(256)/log(58) < 1.3658).
const MAX_ENCODED_LEN: usize = MAX_IDENTITY_LEN * 13_658 / 10_000 + 1;

/// Encode a binary identity.
pub fn encode(identity: &[u8]) -> String {
    bs58::encode(identity).into_string()
}

/// Decode an identity string produced by [`encode`].
pub fn decode(encoded: &str) -> Result<Vec<u8>, SessionError> {
    if encoded.is_empty() {
        return Err(SessionError::invalid_identity("empty identity"));
    }
    if encoded.len() > MAX_ENCODED_LEN {
        return Err(SessionError::invalid_identity(format!(
            "identity string is {} characters, limit is {MAX_ENCODED_LEN}",
            encoded.len()
        )));
    }

    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| SessionError::invalid_identity(e.to_string()))?;

    check_len(&bytes)?;
    if encode(&bytes) != encoded {
        return Err(SessionError::invalid_identity("non-canonical encoding"));
    }
    Ok(bytes)
}

fn check_len(bytes: &[u8]) -> Result<(), SessionError> {
    if bytes.is_empty() {
        return Err(SessionError::invalid_identity("empty identity"));
    }
    if bytes.len() > MAX_IDENTITY_LEN {
        return Err(SessionError::invalid_identity(format!(
            "identity is {} bytes, limit is {MAX_IDENTITY_LEN}",
            bytes.len()
        )));
    }
    Ok(())
}

/// A peer identity held in both binary and string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    bytes: Vec<u8>,
    encoded: String,
}

impl PeerIdentity {
    /// Build an identity from its binary form.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self, SessionError> {
        let bytes = bytes.into();
        check_len(&bytes)?;
        let encoded = encode(&bytes);
        Ok(Self { bytes, encoded })
    }

    /// Parse an identity from its string form.
    pub fn parse(encoded: &str) -> Result<Self, SessionError> {
        let bytes = decode(encoded)?;
        Ok(Self { bytes, encoded: encoded.to_owned() })
    }

    /// Binary form.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Consume into the binary form.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for PeerIdentity {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(encode(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(decode("StV1DL6CwTryKyV").unwrap(), b"hello world");
    }

    #[test]
    fn leading_zero_bytes_survive() {
        let bytes = [0, 0, 1, 2];
        let encoded = encode(&bytes);
        assert!(encoded.starts_with("11"));
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(decode(""), Err(SessionError::InvalidIdentity { .. })));
        assert!(matches!(PeerIdentity::from_bytes(Vec::new()), Err(SessionError::InvalidIdentity { .. })));
    }

    #[test]
    fn rejects_foreign_alphabet() {
        // 0, O, I and l are not in the base58 alphabet.
        for bad in ["0abc", "abcO", "Il", "abc def", " StV1DL6CwTryKyV", "StV1DL6CwTryKyV\n"] {
            assert!(
                matches!(decode(bad), Err(SessionError::InvalidIdentity { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_oversized() {
        let long = "2".repeat(MAX_ENCODED_LEN + 1);
        assert!(matches!(decode(&long), Err(SessionError::InvalidIdentity { .. })));

        let big = vec![0xffu8; MAX_IDENTITY_LEN + 1];
        assert!(matches!(PeerIdentity::from_bytes(big), Err(SessionError::InvalidIdentity { .. })));
    }

    #[test]
    fn largest_identity_roundtrips() {
        let bytes = vec![0xffu8; MAX_IDENTITY_LEN];
        let id = PeerIdentity::from_bytes(bytes.clone()).unwrap();
        assert_eq!(PeerIdentity::parse(id.as_str()).unwrap().into_bytes(), bytes);
    }

    #[test]
    fn display_is_encoded_form() {
        let id = PeerIdentity::from_bytes(b"hello world".to_vec()).unwrap();
        assert_eq!(id.to_string(), "StV1DL6CwTryKyV");
        assert_eq!("StV1DL6CwTryKyV".parse::<PeerIdentity>().unwrap(), id);
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 1..256)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn decode_never_panics(s in "\\PC{0,80}") {
            match decode(&s) {
                Ok(bytes) => prop_assert_eq!(encode(&bytes), s),
                Err(e) => prop_assert!(matches!(e, SessionError::InvalidIdentity { .. }), "{e:?}"),
            }
        }
    }
}
