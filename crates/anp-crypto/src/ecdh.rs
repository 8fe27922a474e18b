//! X25519 ephemeral Diffie-Hellman.

use crate::error::CryptoError;
use crate::keys::{KeyKind, KeyPair, PublicKey};

/// Computes the 32-byte X25519 shared secret between a local key pair and a
/// remote public key.
///
/// Both keys must be X25519 ([`CryptoError::AlgorithmMismatch`] otherwise).
/// An all-zero output means the peer supplied a low-order point and is
/// rejected as [`CryptoError::InvalidSharedSecret`].
pub fn ecdhe(local: &KeyPair, remote: &PublicKey) -> Result<[u8; 32], CryptoError> {
    let secret = match local {
        KeyPair::X25519(secret) => secret,
        other => {
            return Err(CryptoError::AlgorithmMismatch {
                expected: KeyKind::X25519,
                actual: other.kind(),
            });
        }
    };
    let remote = match remote {
        PublicKey::X25519(key) => key,
        other => {
            return Err(CryptoError::AlgorithmMismatch {
                expected: KeyKind::X25519,
                actual: other.kind(),
            });
        }
    };
    let shared = secret.diffie_hellman(remote);
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidSharedSecret);
    }
    Ok(*shared.as_bytes())
}
