//! Content hashing
//!
//! Digests are SHA-256 over the input encoded with the requested character
//! encoding, rendered as lowercase hex.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

/// Character encodings accepted by [`hash_string`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

impl Encoding {
    /// Encode a string to bytes
    pub fn encode(&self, input: &str) -> Result<Vec<u8>, HashError> {
        match self {
            Self::Utf8 => Ok(input.as_bytes().to_vec()),
            Self::Utf16Le => Ok(input.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Self::Utf16Be => Ok(input.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Self::Latin1 => encode_narrow(input, 0xFF, *self),
            Self::Ascii => encode_narrow(input, 0x7F, *self),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16Le => "utf-16-le",
            Self::Utf16Be => "utf-16-be",
            Self::Latin1 => "latin-1",
            Self::Ascii => "ascii",
        }
    }
}

fn encode_narrow(input: &str, max: u32, encoding: Encoding) -> Result<Vec<u8>, HashError> {
    input
        .chars()
        .map(|c| {
            let code = c as u32;
            if code <= max {
                Ok(code as u8)
            } else {
                Err(HashError::Unrepresentable {
                    character: c,
                    encoding: encoding.as_str(),
                })
            }
        })
        .collect()
}

impl FromStr for Encoding {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16-le" | "utf-16le" | "utf16le" => Ok(Self::Utf16Le),
            "utf-16-be" | "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(HashError::UnknownEncoding(s.to_string())),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hash a string after encoding it
pub fn hash_string(input: &str, encoding: Encoding) -> Result<String, HashError> {
    let bytes = encoding.encode(input)?;
    Ok(hash_bytes(&bytes))
}

/// Hash raw bytes
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hashing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Character {character:?} cannot be encoded as {encoding}")]
    Unrepresentable {
        character: char,
        encoding: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_utf8_digest() {
        assert_eq!(
            hash_string("abc", Encoding::Utf8).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_is_deterministic() {
        for encoding in [Encoding::Utf8, Encoding::Utf16Le, Encoding::Utf16Be, Encoding::Latin1] {
            let a = hash_string("select * from orders", encoding).unwrap();
            let b = hash_string("select * from orders", encoding).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.len(), 64);
        }
    }

    #[test]
    fn ascii_text_agrees_across_single_byte_encodings() {
        let utf8 = hash_string("orders", Encoding::Utf8).unwrap();
        assert_eq!(utf8, hash_string("orders", Encoding::Latin1).unwrap());
        assert_eq!(utf8, hash_string("orders", Encoding::Ascii).unwrap());
        assert_ne!(utf8, hash_string("orders", Encoding::Utf16Le).unwrap());
    }

    #[test]
    fn unrepresentable_characters_fail() {
        assert!(matches!(
            hash_string("café", Encoding::Ascii),
            Err(HashError::Unrepresentable { character: 'é', .. })
        ));
        assert!(hash_string("café", Encoding::Latin1).is_ok());
        assert!(hash_string("日本", Encoding::Latin1).is_err());
    }

    #[test]
    fn parse_encoding_labels() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("utf_16_le".parse::<Encoding>().unwrap(), Encoding::Utf16Le);
        assert_eq!("iso-8859-1".parse::<Encoding>().unwrap(), Encoding::Latin1);
        assert!("ebcdic".parse::<Encoding>().is_err());
    }
}
