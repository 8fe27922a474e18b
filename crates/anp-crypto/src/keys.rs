//! Tagged key pairs and signatures.
//!
//! Every key carries its [`KeyKind`] so a secp256k1 signature can never be
//! checked against a P-256 key by accident: mixing kinds surfaces as
//! [`CryptoError::AlgorithmMismatch`] instead of a silent `false`.
//!
//! ECDSA signing uses a SHA-256 prehash on both supported curves and emits
//! fixed-width `R‖S` bytes (64 for both secp256k1 and P-256), the layout
//! W3C Data-Integrity proofs and JOSE both expect. Ed25519 signs the raw
//! message per RFC 8032. X25519 keys are agreement-only.

use ed25519_dalek::Verifier as _;
use k256::ecdsa::signature::{DigestSigner, DigestVerifier};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};

use crate::error::CryptoError;

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// secp256k1 ECDSA (`EcdsaSecp256k1VerificationKey2019`, `ES256K`).
    Secp256k1,
    /// NIST P-256 ECDSA (`JsonWebKey2020` with `crv: P-256`).
    P256,
    /// Ed25519 EdDSA (`Ed25519VerificationKey2020`).
    Ed25519,
    /// X25519, key agreement only.
    X25519,
}

impl KeyKind {
    /// Whether keys of this kind can produce signatures.
    pub fn signs(&self) -> bool {
        !matches!(self, KeyKind::X25519)
    }
}

impl Display for KeyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyKind::Secp256k1 => "secp256k1",
            KeyKind::P256 => "P-256",
            KeyKind::Ed25519 => "Ed25519",
            KeyKind::X25519 => "X25519",
        };
        write!(f, "{name}")
    }
}

/// A public key tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Secp256k1(k256::ecdsa::VerifyingKey),
    P256(p256::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
    X25519(x25519_dalek::PublicKey),
}

impl PublicKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            PublicKey::Secp256k1(_) => KeyKind::Secp256k1,
            PublicKey::P256(_) => KeyKind::P256,
            PublicKey::Ed25519(_) => KeyKind::Ed25519,
            PublicKey::X25519(_) => KeyKind::X25519,
        }
    }

    /// Fails with [`CryptoError::AlgorithmMismatch`] unless the key has the
    /// expected kind.
    pub fn expect_kind(&self, expected: KeyKind) -> Result<(), CryptoError> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(CryptoError::AlgorithmMismatch {
                expected,
                actual: self.kind(),
            })
        }
    }

    /// The wire encoding of the key: SEC1 compressed for the ECDSA curves,
    /// raw 32 bytes for Ed25519 and X25519.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Secp256k1(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::P256(key) => key.to_encoded_point(true).as_bytes().to_vec(),
            PublicKey::Ed25519(key) => key.to_bytes().to_vec(),
            PublicKey::X25519(key) => key.to_bytes().to_vec(),
        }
    }

    /// Decodes a public key of a known kind from its wire bytes.
    pub fn from_bytes(kind: KeyKind, bytes: &[u8]) -> Result<Self, CryptoError> {
        match kind {
            KeyKind::Secp256k1 => k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::Secp256k1)
                .map_err(|_| CryptoError::KeyEncodingInvalid("bad secp256k1 point".into())),
            KeyKind::P256 => p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
                .map(PublicKey::P256)
                .map_err(|_| CryptoError::KeyEncodingInvalid("bad P-256 point".into())),
            KeyKind::Ed25519 => {
                let raw: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CryptoError::KeyEncodingInvalid("Ed25519 key must be 32 bytes".into()))?;
                ed25519_dalek::VerifyingKey::from_bytes(&raw)
                    .map(PublicKey::Ed25519)
                    .map_err(|_| CryptoError::KeyEncodingInvalid("bad Ed25519 point".into()))
            }
            KeyKind::X25519 => {
                let raw: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| CryptoError::KeyEncodingInvalid("X25519 key must be 32 bytes".into()))?;
                Ok(PublicKey::X25519(x25519_dalek::PublicKey::from(raw)))
            }
        }
    }

    /// Verifies a fixed-width signature over `message`.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not verify;
    /// errors are reserved for malformed input and algorithm misuse, so
    /// callers can tell tampering from garbage.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        match self {
            PublicKey::Secp256k1(key) => {
                let signature = k256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::SignatureMalformed("expected 64-byte R||S".into()))?;
                let digest = Sha256::new_with_prefix(message);
                Ok(key.verify_digest(digest, &signature).is_ok())
            }
            PublicKey::P256(key) => {
                let signature = p256::ecdsa::Signature::from_slice(signature)
                    .map_err(|_| CryptoError::SignatureMalformed("expected 64-byte R||S".into()))?;
                let digest = Sha256::new_with_prefix(message);
                Ok(key.verify_digest(digest, &signature).is_ok())
            }
            PublicKey::Ed25519(key) => {
                let raw: [u8; 64] = signature.try_into().map_err(|_| {
                    CryptoError::SignatureMalformed("Ed25519 signature must be 64 bytes".into())
                })?;
                let signature = ed25519_dalek::Signature::from_bytes(&raw);
                Ok(key.verify(message, &signature).is_ok())
            }
            PublicKey::X25519(_) => Err(CryptoError::AlgorithmUnsupported(
                "X25519 keys cannot verify signatures".into(),
            )),
        }
    }
}

/// A private/public key pair tagged with its algorithm.
pub enum KeyPair {
    Secp256k1(k256::ecdsa::SigningKey),
    P256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
    X25519(x25519_dalek::StaticSecret),
}

impl KeyPair {
    /// Generates a fresh random key pair of the given kind.
    pub fn generate(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Secp256k1 => KeyPair::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyKind::P256 => KeyPair::P256(p256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyKind::Ed25519 => KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
            KeyKind::X25519 => KeyPair::X25519(x25519_dalek::StaticSecret::random_from_rng(OsRng)),
        }
    }

    /// Rebuilds a key pair from a 32-byte secret scalar / seed.
    pub fn from_secret_bytes(kind: KeyKind, secret: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; 32] = secret
            .try_into()
            .map_err(|_| CryptoError::KeyEncodingInvalid("secret must be 32 bytes".into()))?;
        match kind {
            KeyKind::Secp256k1 => k256::ecdsa::SigningKey::from_bytes((&raw).into())
                .map(KeyPair::Secp256k1)
                .map_err(|_| CryptoError::KeyEncodingInvalid("bad secp256k1 scalar".into())),
            KeyKind::P256 => p256::ecdsa::SigningKey::from_bytes((&raw).into())
                .map(KeyPair::P256)
                .map_err(|_| CryptoError::KeyEncodingInvalid("bad P-256 scalar".into())),
            KeyKind::Ed25519 => Ok(KeyPair::Ed25519(ed25519_dalek::SigningKey::from_bytes(&raw))),
            KeyKind::X25519 => Ok(KeyPair::X25519(x25519_dalek::StaticSecret::from(raw))),
        }
    }

    /// The secret scalar / seed bytes. Handle with care; callers persisting
    /// this must zeroize their copies.
    pub fn secret_bytes(&self) -> [u8; 32] {
        match self {
            KeyPair::Secp256k1(key) => key.to_bytes().into(),
            KeyPair::P256(key) => key.to_bytes().into(),
            KeyPair::Ed25519(key) => key.to_bytes(),
            KeyPair::X25519(secret) => secret.to_bytes(),
        }
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            KeyPair::Secp256k1(_) => KeyKind::Secp256k1,
            KeyPair::P256(_) => KeyKind::P256,
            KeyPair::Ed25519(_) => KeyKind::Ed25519,
            KeyPair::X25519(_) => KeyKind::X25519,
        }
    }

    pub fn public(&self) -> PublicKey {
        match self {
            KeyPair::Secp256k1(key) => PublicKey::Secp256k1(*key.verifying_key()),
            KeyPair::P256(key) => PublicKey::P256(*key.verifying_key()),
            KeyPair::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
            KeyPair::X25519(secret) => PublicKey::X25519(x25519_dalek::PublicKey::from(secret)),
        }
    }

    /// Signs `message`, producing fixed-width signature bytes.
    ///
    /// ECDSA output is low-S normalized `R‖S` (64 bytes); Ed25519 output is
    /// the 64-byte RFC 8032 signature. X25519 keys cannot sign.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            KeyPair::Secp256k1(key) => {
                let digest = Sha256::new_with_prefix(message);
                let signature: k256::ecdsa::Signature = key.sign_digest(digest);
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(signature.to_bytes().to_vec())
            }
            KeyPair::P256(key) => {
                let digest = Sha256::new_with_prefix(message);
                let signature: p256::ecdsa::Signature = key.sign_digest(digest);
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(signature.to_bytes().to_vec())
            }
            KeyPair::Ed25519(key) => {
                use ed25519_dalek::Signer as _;
                Ok(key.sign(message).to_bytes().to_vec())
            }
            KeyPair::X25519(_) => Err(CryptoError::AlgorithmUnsupported(
                "X25519 keys cannot sign".into(),
            )),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Never print secret material.
        f.debug_struct("KeyPair").field("kind", &self.kind()).finish()
    }
}
