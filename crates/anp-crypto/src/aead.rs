//! AES-256-GCM message protection.
//!
//! Each seal draws a fresh random 12-byte IV; the 16-byte tag is kept
//! detached so the wire format can carry `{iv, ciphertext, tag}` as separate
//! fields. Tag failure surfaces as [`CryptoError::AuthenticationFailed`],
//! which E2EE sessions treat as a tamper signal.

use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// A 256-bit AEAD session key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a key from derived keying material of exactly [`KEY_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::KeyEncodingInvalid("session key must be 32 bytes".into()))?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(…)")
    }
}

/// An AEAD-protected message: IV, ciphertext, and detached tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMessage {
    #[serde(with = "iv_b64")]
    pub iv: [u8; IV_LEN],
    pub ciphertext: anp_types::util::Base64UrlBytes,
    #[serde(with = "tag_b64")]
    pub tag: [u8; TAG_LEN],
}

/// Encrypts `plaintext` under `key`, binding `aad` into the tag.
pub fn seal(key: &SessionKey, plaintext: &[u8], aad: &[u8]) -> Result<SealedMessage, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), aad, &mut buffer)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    Ok(SealedMessage {
        iv,
        ciphertext: buffer.into(),
        tag: tag.into(),
    })
}

/// Decrypts a sealed message, verifying the tag over `aad` and ciphertext.
pub fn open(key: &SessionKey, sealed: &SealedMessage, aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let mut buffer = sealed.ciphertext.as_bytes().to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&sealed.iv),
            aad,
            &mut buffer,
            aes_gcm::Tag::from_slice(&sealed.tag),
        )
        .map_err(|_| CryptoError::AuthenticationFailed)?;
    Ok(buffer)
}

mod iv_b64 {
    use super::IV_LEN;
    use anp_types::util::b64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(iv: &[u8; IV_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&b64::encode(iv))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; IV_LEN], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = b64::decode(&raw).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("IV must be 12 bytes"))
    }
}

mod tag_b64 {
    use super::TAG_LEN;
    use anp_types::util::b64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(tag: &[u8; TAG_LEN], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&b64::encode(tag))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; TAG_LEN], D::Error> {
        let raw = String::deserialize(deserializer)?;
        let bytes = b64::decode(&raw).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("tag must be 16 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::new([7u8; 32])
    }

    #[test]
    fn seal_open_round_trip() {
        let sealed = seal(&key(), b"hello", b"session-1").unwrap();
        assert_eq!(sealed.iv.len(), IV_LEN);
        assert_eq!(sealed.tag.len(), TAG_LEN);
        let opened = open(&key(), &sealed, b"session-1").unwrap();
        assert_eq!(opened, b"hello");
    }

    #[test]
    fn fresh_iv_per_seal() {
        let first = seal(&key(), b"hello", b"aad").unwrap();
        let second = seal(&key(), b"hello", b"aad").unwrap();
        assert_ne!(first.iv, second.iv);
    }

    #[test]
    fn ciphertext_tamper_is_authentication_failure() {
        let mut sealed = seal(&key(), b"hello", b"aad").unwrap();
        sealed.ciphertext.0[0] ^= 0x01;
        assert_eq!(
            open(&key(), &sealed, b"aad"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn aad_swap_is_authentication_failure() {
        let sealed = seal(&key(), b"hello", b"aad-1").unwrap();
        assert_eq!(
            open(&key(), &sealed, b"aad-2"),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn serde_shape_is_base64url() {
        let sealed = seal(&key(), b"hello", b"aad").unwrap();
        let value = serde_json::to_value(&sealed).unwrap();
        assert!(value["iv"].is_string());
        assert!(value["ciphertext"].is_string());
        assert!(value["tag"].is_string());
        let back: SealedMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, sealed);
    }
}
