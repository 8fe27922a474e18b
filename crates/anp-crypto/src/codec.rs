//! Public-key encodings used by DID verification methods.
//!
//! Two encodings appear in `did:wba` documents:
//!
//! - `publicKeyJwk` (`JsonWebKey2020`): `EC` keys carry base64url affine
//!   coordinates, `OKP` keys carry the raw 32-byte key in `x`.
//! - `publicKeyMultibase` (`EcdsaSecp256k1VerificationKey2019`,
//!   `Ed25519VerificationKey2020`): base58btc (`z` prefix) over the
//!   multicodec-tagged key bytes. Untagged raw keys from older peers are
//!   accepted on decode.

use anp_types::did::Jwk;
use anp_types::util::b64;
use multibase::Base;

use crate::error::CryptoError;
use crate::keys::{KeyKind, PublicKey};

/// Multicodec varint prefixes for the supported public-key kinds.
const MULTICODEC_SECP256K1: [u8; 2] = [0xe7, 0x01];
const MULTICODEC_P256: [u8; 2] = [0x80, 0x24];
const MULTICODEC_ED25519: [u8; 2] = [0xed, 0x01];
const MULTICODEC_X25519: [u8; 2] = [0xec, 0x01];

fn multicodec_prefix(kind: KeyKind) -> [u8; 2] {
    match kind {
        KeyKind::Secp256k1 => MULTICODEC_SECP256K1,
        KeyKind::P256 => MULTICODEC_P256,
        KeyKind::Ed25519 => MULTICODEC_ED25519,
        KeyKind::X25519 => MULTICODEC_X25519,
    }
}

/// Decodes a `publicKeyJwk` value.
pub fn public_key_from_jwk(jwk: &Jwk) -> Result<PublicKey, CryptoError> {
    match (jwk.kty.as_str(), jwk.crv.as_str()) {
        ("EC", "secp256k1") => ec_from_coordinates(KeyKind::Secp256k1, jwk),
        ("EC", "P-256") => ec_from_coordinates(KeyKind::P256, jwk),
        ("OKP", "Ed25519") => okp_from_x(KeyKind::Ed25519, jwk),
        ("OKP", "X25519") => okp_from_x(KeyKind::X25519, jwk),
        (kty, crv) => Err(CryptoError::AlgorithmUnsupported(format!(
            "JWK kty={kty} crv={crv}"
        ))),
    }
}

fn ec_from_coordinates(kind: KeyKind, jwk: &Jwk) -> Result<PublicKey, CryptoError> {
    let x = b64::decode(&jwk.x)
        .map_err(|_| CryptoError::KeyEncodingInvalid("JWK x is not base64url".into()))?;
    let y = jwk
        .y
        .as_deref()
        .ok_or_else(|| CryptoError::KeyEncodingInvalid("EC JWK requires y".into()))
        .and_then(|y| {
            b64::decode(y).map_err(|_| CryptoError::KeyEncodingInvalid("JWK y is not base64url".into()))
        })?;
    if x.len() != 32 || y.len() != 32 {
        return Err(CryptoError::KeyEncodingInvalid(
            "EC coordinates must be 32 bytes".into(),
        ));
    }
    // SEC1 uncompressed point.
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    PublicKey::from_bytes(kind, &sec1)
}

fn okp_from_x(kind: KeyKind, jwk: &Jwk) -> Result<PublicKey, CryptoError> {
    let x = b64::decode(&jwk.x)
        .map_err(|_| CryptoError::KeyEncodingInvalid("JWK x is not base64url".into()))?;
    PublicKey::from_bytes(kind, &x)
}

/// Encodes a public key as a JWK.
pub fn public_key_to_jwk(key: &PublicKey) -> Jwk {
    match key {
        PublicKey::Secp256k1(inner) => {
            let point = inner.to_encoded_point(false);
            let (x, y) = (point.x(), point.y());
            ec_jwk(
                "secp256k1",
                x.expect("uncompressed point has x"),
                y.expect("uncompressed point has y"),
            )
        }
        PublicKey::P256(inner) => {
            let point = inner.to_encoded_point(false);
            let (x, y) = (point.x(), point.y());
            ec_jwk(
                "P-256",
                x.expect("uncompressed point has x"),
                y.expect("uncompressed point has y"),
            )
        }
        PublicKey::Ed25519(inner) => okp_jwk("Ed25519", inner.as_bytes()),
        PublicKey::X25519(inner) => okp_jwk("X25519", inner.as_bytes()),
    }
}

fn ec_jwk(crv: &str, x: &[u8], y: &[u8]) -> Jwk {
    Jwk {
        kty: "EC".into(),
        crv: crv.into(),
        x: b64::encode(x),
        y: Some(b64::encode(y)),
        kid: None,
    }
}

fn okp_jwk(crv: &str, x: &[u8]) -> Jwk {
    Jwk {
        kty: "OKP".into(),
        crv: crv.into(),
        x: b64::encode(x),
        y: None,
        kid: None,
    }
}

/// Decodes a `publicKeyMultibase` value for a key of known kind.
pub fn public_key_from_multibase(kind: KeyKind, encoded: &str) -> Result<PublicKey, CryptoError> {
    let (base, bytes) = multibase::decode(encoded)
        .map_err(|_| CryptoError::KeyEncodingInvalid("bad multibase".into()))?;
    if base != Base::Base58Btc {
        return Err(CryptoError::KeyEncodingInvalid(format!(
            "expected base58btc multibase, got {base:?}"
        )));
    }
    let prefix = multicodec_prefix(kind);
    let key_bytes = match bytes.strip_prefix(&prefix[..]) {
        Some(tagged) => tagged,
        None => &bytes[..],
    };
    PublicKey::from_bytes(kind, key_bytes)
}

/// Encodes a public key as multicodec-tagged base58btc multibase.
pub fn public_key_to_multibase(key: &PublicKey) -> String {
    let prefix = multicodec_prefix(key.kind());
    let mut tagged = Vec::with_capacity(2 + 33);
    tagged.extend_from_slice(&prefix);
    tagged.extend_from_slice(&key.to_bytes());
    multibase::encode(Base::Base58Btc, tagged)
}
