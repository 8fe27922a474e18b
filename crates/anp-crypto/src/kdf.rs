//! HKDF-SHA256 key derivation.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Derives `len` bytes of keying material from `secret` via HKDF-SHA256.
///
/// ANP always derives with an explicit salt (the concatenated handshake
/// nonces), so an empty salt is rejected rather than silently falling back
/// to the RFC 5869 zero-salt default.
pub fn hkdf_sha256(
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
    len: usize,
) -> Result<Vec<u8>, CryptoError> {
    if salt.is_empty() {
        return Err(CryptoError::EmptySalt);
    }
    let hkdf = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut output = vec![0u8; len];
    hkdf.expand(info, &mut output)
        .map_err(|_| CryptoError::InvalidOutputLength)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc5869_test_case_1() {
        let ikm = [0x0b; 22];
        let salt: Vec<u8> = (0x00..=0x0c).collect();
        let info: Vec<u8> = (0xf0..=0xf9).collect();
        let okm = hkdf_sha256(&ikm, &salt, &info, 42).unwrap();
        assert_eq!(
            hex::encode(okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn empty_salt_is_rejected() {
        assert_eq!(
            hkdf_sha256(b"secret", b"", b"info", 32),
            Err(CryptoError::EmptySalt)
        );
    }

    #[test]
    fn oversized_output_is_rejected() {
        // HKDF-SHA256 caps output at 255 * 32 bytes.
        assert_eq!(
            hkdf_sha256(b"secret", b"salt", b"info", 255 * 32 + 1),
            Err(CryptoError::InvalidOutputLength)
        );
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = hkdf_sha256(b"secret", b"salt", b"ANP encryption key", 32).unwrap();
        let b = hkdf_sha256(b"secret", b"salt", b"ANP encryption key", 32).unwrap();
        assert_eq!(a, b);
        let c = hkdf_sha256(b"secret", b"salt", b"other info", 32).unwrap();
        assert_ne!(a, c);
    }
}
