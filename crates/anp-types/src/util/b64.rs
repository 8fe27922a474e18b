//! Base64url encoding and decoding utilities.
//!
//! ANP carries all binary material (signatures, nonces, hashes, JWS segments)
//! as unpadded base64url. Decoding is deliberately tolerant: peers that emit
//! padded output are still accepted.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use std::fmt::Display;

/// Emits no padding, accepts both padded and unpadded input.
const B64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes raw bytes as unpadded base64url.
pub fn encode<T: AsRef<[u8]>>(input: T) -> String {
    B64URL.encode(input.as_ref())
}

/// Decodes base64url input, padded or not.
pub fn decode<T: AsRef<[u8]>>(input: T) -> Result<Vec<u8>, base64::DecodeError> {
    B64URL.decode(input.as_ref())
}

/// A wrapper for base64url-encoded byte data.
///
/// Holds the decoded bytes and serializes as an unpadded base64url string.
///
/// # Example
///
/// ```
/// use anp_types::util::Base64UrlBytes;
///
/// let wrapped = Base64UrlBytes::from(b"hello world".to_vec());
/// assert_eq!(wrapped.to_string(), "aGVsbG8gd29ybGQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64UrlBytes(pub Vec<u8>);

impl Base64UrlBytes {
    /// Parses a base64url string (padded or unpadded) into raw bytes.
    pub fn parse(encoded: &str) -> Result<Self, base64::DecodeError> {
        decode(encoded).map(Base64UrlBytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Base64UrlBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Base64UrlBytes(bytes)
    }
}

impl From<&[u8]> for Base64UrlBytes {
    fn from(bytes: &[u8]) -> Self {
        Base64UrlBytes(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Base64UrlBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Base64UrlBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", encode(&self.0))
    }
}

impl serde::Serialize for Base64UrlBytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(&self.0))
    }
}

impl<'de> serde::Deserialize<'de> for Base64UrlBytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Base64UrlBytes::parse(&encoded).map_err(serde::de::Error::custom)
    }
}
