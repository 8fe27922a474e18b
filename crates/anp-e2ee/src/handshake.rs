//! Handshake records and key derivation.

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use anp_crypto::aead::{self, SealedMessage, SessionKey};
use anp_crypto::{KeyKind, KeyPair, PublicKey, ecdh, kdf};
use anp_types::did::Did;
use anp_types::util::b64;

use crate::error::E2eeError;

/// HKDF info string for session-key derivation.
const KEY_INFO: &[u8] = b"ANP encryption key";
/// Plaintext sealed inside `finished` records for key confirmation.
const FINISHED_PAYLOAD: &[u8] = b"finished";

/// A signed handshake hello.
///
/// The signature covers the JCS hash of every field except `signature`
/// itself, under the sender's DID authentication key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub session_id: String,
    pub did: Did,
    /// Which verification method in the sender's DID document signed this.
    pub verification_method: String,
    /// Base64url 32-byte X25519 ephemeral public key.
    pub ephemeral_public_key: String,
    /// Base64url 16-byte handshake nonce.
    pub nonce: String,
    /// Base64url signature over the hello body.
    pub signature: String,
}

/// The responder's reply: its hello plus key confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelloAck {
    pub hello: Hello,
    pub finished: Finished,
}

/// A key-confirmation record sealed under the freshly derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finished {
    pub sealed: SealedMessage,
}

/// One side's ephemeral handshake state, alive until the key is derived.
pub(crate) struct PendingHandshake {
    pub(crate) ephemeral: KeyPair,
    pub(crate) nonce: [u8; 16],
}

impl PendingHandshake {
    pub(crate) fn fresh() -> Self {
        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        Self {
            ephemeral: KeyPair::generate(KeyKind::X25519),
            nonce,
        }
    }

    /// Builds and signs this side's hello.
    pub(crate) fn hello(
        &self,
        session_id: &str,
        did: &Did,
        auth_key: &KeyPair,
        verification_method: &str,
    ) -> Result<Hello, E2eeError> {
        let body = hello_body(
            session_id,
            did,
            verification_method,
            &b64::encode(self.ephemeral.public().to_bytes()),
            &b64::encode(self.nonce),
        );
        let signature = auth_key.sign(&body)?;
        Ok(Hello {
            session_id: session_id.to_string(),
            did: did.clone(),
            verification_method: verification_method.to_string(),
            ephemeral_public_key: b64::encode(self.ephemeral.public().to_bytes()),
            nonce: b64::encode(self.nonce),
            signature: b64::encode(signature),
        })
    }

    /// Derives the session key from our ephemeral secret and the peer's
    /// hello. `initiator_nonce`/`responder_nonce` fix the salt order
    /// regardless of which side calls this.
    pub(crate) fn derive(
        &self,
        peer_ephemeral: &PublicKey,
        initiator_nonce: &[u8],
        responder_nonce: &[u8],
    ) -> Result<SessionKey, E2eeError> {
        let shared = ecdh::ecdhe(&self.ephemeral, peer_ephemeral)?;
        let mut salt = Vec::with_capacity(initiator_nonce.len() + responder_nonce.len());
        salt.extend_from_slice(initiator_nonce);
        salt.extend_from_slice(responder_nonce);
        let okm = kdf::hkdf_sha256(&shared, &salt, KEY_INFO, aead::KEY_LEN)?;
        Ok(SessionKey::from_slice(&okm)?)
    }
}

/// Verifies a peer hello's signature and decodes its ephemeral key and
/// nonce.
pub(crate) fn verify_hello(
    hello: &Hello,
    peer_auth_key: &PublicKey,
) -> Result<(PublicKey, Vec<u8>), E2eeError> {
    let body = hello_body(
        &hello.session_id,
        &hello.did,
        &hello.verification_method,
        &hello.ephemeral_public_key,
        &hello.nonce,
    );
    let signature = b64::decode(&hello.signature)
        .map_err(|_| E2eeError::HandshakeFailed("signature is not base64url".into()))?;
    if !peer_auth_key.verify(&body, &signature)? {
        return Err(E2eeError::HandshakeFailed("hello signature invalid".into()));
    }
    let ephemeral_bytes = b64::decode(&hello.ephemeral_public_key)
        .map_err(|_| E2eeError::HandshakeFailed("ephemeral key is not base64url".into()))?;
    let ephemeral = PublicKey::from_bytes(KeyKind::X25519, &ephemeral_bytes)?;
    let nonce = b64::decode(&hello.nonce)
        .map_err(|_| E2eeError::HandshakeFailed("nonce is not base64url".into()))?;
    if nonce.len() != 16 {
        return Err(E2eeError::HandshakeFailed("nonce must be 16 bytes".into()));
    }
    Ok((ephemeral, nonce))
}

/// The signed byte form of a hello: SHA-256 over the JCS of its body.
fn hello_body(
    session_id: &str,
    did: &Did,
    verification_method: &str,
    ephemeral_public_key: &str,
    nonce: &str,
) -> [u8; 32] {
    let body = json!({
        "sessionId": session_id,
        "did": did,
        "verificationMethod": verification_method,
        "ephemeralPublicKey": ephemeral_public_key,
        "nonce": nonce,
    });
    let canonical = anp_types::jcs::canonicalize(&body).expect("hello body is canonical JSON");
    Sha256::digest(canonical).into()
}

/// Seals a `finished` record confirming possession of `key`.
pub(crate) fn make_finished(key: &SessionKey, aad: &[u8]) -> Result<Finished, E2eeError> {
    let sealed = aead::seal(key, FINISHED_PAYLOAD, aad)?;
    Ok(Finished { sealed })
}

/// Opens and checks a peer's `finished` record.
pub(crate) fn check_finished(key: &SessionKey, finished: &Finished, aad: &[u8]) -> Result<(), E2eeError> {
    let payload = aead::open(key, &finished.sealed, aad)
        .map_err(|_| E2eeError::HandshakeFailed("key confirmation failed".into()))?;
    if payload != FINISHED_PAYLOAD {
        return Err(E2eeError::HandshakeFailed("bad finished payload".into()));
    }
    Ok(())
}
