//! Public key type identifying authors on the event network.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A 32-byte author public key.
///
/// Always rendered as 64 lowercase hex characters, which is also its
/// serialized form. Keys order by their raw bytes so maps keyed by
/// `PublicKey` iterate deterministically.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// Length of the key in bytes.
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its 64-character hex form.
    ///
    /// Surrounding whitespace is ignored; upper-case hex is accepted.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let s = s.trim();
        if s.len() != Self::LEN * 2 {
            return Err(TypesError::InvalidKeyLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| TypesError::InvalidKeyHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

    #[test]
    fn parses_and_displays_hex() {
        let key = PublicKey::from_hex(HEX).unwrap();
        assert_eq!(key.to_string(), HEX);
        assert_eq!(key.as_bytes()[0], 0x3b);
    }

    #[test]
    fn accepts_uppercase_and_whitespace() {
        let key = PublicKey::from_hex(&format!("  {}\n", HEX.to_uppercase())).unwrap();
        assert_eq!(key.to_hex(), HEX);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            PublicKey::from_hex("abcd"),
            Err(TypesError::InvalidKeyLength(4))
        );
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "zz".repeat(32);
        assert!(matches!(
            PublicKey::from_hex(&bad),
            Err(TypesError::InvalidKeyHex(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let key = PublicKey::from_hex(HEX).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{HEX}\""));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn debug_is_abbreviated() {
        let key = PublicKey::from_hex(HEX).unwrap();
        assert_eq!(format!("{key:?}"), "PublicKey(3bf0c63f)");
    }
}
