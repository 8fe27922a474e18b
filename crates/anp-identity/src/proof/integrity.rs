//! W3C Data-Integrity proofs over JCS.
//!
//! Signing document `D` with options `O` produces
//!
//! ```text
//! signature = sign(sk, SHA-256(JCS(O)) ‖ SHA-256(JCS(D \ proof)))
//! D' = D ∪ { proof: O ∪ { proofValue: b64url(signature) } }
//! ```
//!
//! Verification strips `proof`, recomputes both hashes, and checks the
//! signature against the key named by `O.verificationMethod`. When the
//! verifier expects a `domain` or `challenge` binding, the proof must carry
//! exactly those values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use anp_crypto::{KeyKind, KeyPair, PublicKey};
use anp_types::util::b64;
use anp_types::{UtcTimestamp, jcs};

use super::ProofError;

/// Supported Data-Integrity proof suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    #[serde(rename = "EcdsaSecp256k1Signature2019")]
    EcdsaSecp256k1Signature2019,
    #[serde(rename = "Ed25519Signature2020")]
    Ed25519Signature2020,
}

impl ProofType {
    /// The key algorithm this suite signs with.
    pub fn key_kind(&self) -> KeyKind {
        match self {
            ProofType::EcdsaSecp256k1Signature2019 => KeyKind::Secp256k1,
            ProofType::Ed25519Signature2020 => KeyKind::Ed25519,
        }
    }

    /// The suite for a signing key, if one exists.
    pub fn for_key_kind(kind: KeyKind) -> Option<Self> {
        match kind {
            KeyKind::Secp256k1 => Some(ProofType::EcdsaSecp256k1Signature2019),
            KeyKind::Ed25519 => Some(ProofType::Ed25519Signature2020),
            KeyKind::P256 | KeyKind::X25519 => None,
        }
    }
}

/// The signed portion of a proof: everything except `proofValue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOptions {
    #[serde(rename = "type")]
    pub proof_type: ProofType,
    pub created: UtcTimestamp,
    /// DID URL of the verification method to check against.
    pub verification_method: String,
    pub proof_purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

impl ProofOptions {
    /// Options for an `assertionMethod` proof created now.
    pub fn assertion(proof_type: ProofType, verification_method: impl Into<String>) -> Self {
        Self {
            proof_type,
            created: UtcTimestamp::now(),
            verification_method: verification_method.into(),
            proof_purpose: "assertionMethod".into(),
            domain: None,
            challenge: None,
        }
    }

    /// Options for an `authentication` proof created now.
    pub fn authentication(proof_type: ProofType, verification_method: impl Into<String>) -> Self {
        Self {
            proof_purpose: "authentication".into(),
            ..Self::assertion(proof_type, verification_method)
        }
    }
}

/// What the verifier requires of `domain` / `challenge` bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofExpectations<'a> {
    pub domain: Option<&'a str>,
    pub challenge: Option<&'a str>,
}

/// Signs `document` and returns it with the embedded `proof` member.
///
/// The key kind must match the proof suite; an existing `proof` member is
/// replaced.
pub fn sign_document(
    document: &Value,
    options: &ProofOptions,
    key: &KeyPair,
) -> Result<Value, ProofError> {
    if key.kind() != options.proof_type.key_kind() {
        return Err(ProofError::AlgorithmMismatch {
            proof: format!("{:?}", options.proof_type),
            key: key.kind().to_string(),
        });
    }
    let mut signed = as_object(document)?;
    signed.remove("proof");
    let input = signing_input(options, &Value::Object(signed.clone()))?;
    let signature = key.sign(&input)?;

    let mut proof = serde_json::to_value(options).expect("proof options serialize");
    proof["proofValue"] = Value::String(b64::encode(signature));
    signed.insert("proof".into(), proof);
    Ok(Value::Object(signed))
}

/// Verifies an embedded proof against an already-resolved public key.
///
/// Returns the verified [`ProofOptions`] so callers can act on `created`,
/// `proofPurpose`, or the verification-method URL.
pub fn verify_document(
    signed: &Value,
    public_key: &PublicKey,
    expectations: &ProofExpectations<'_>,
) -> Result<ProofOptions, ProofError> {
    let (options, signature) = embedded_proof(signed)?;
    if public_key.kind() != options.proof_type.key_kind() {
        return Err(ProofError::AlgorithmMismatch {
            proof: format!("{:?}", options.proof_type),
            key: public_key.kind().to_string(),
        });
    }
    if let Some(expected) = expectations.domain {
        if options.domain.as_deref() != Some(expected) {
            return Err(ProofError::DomainMismatch);
        }
    }
    if let Some(expected) = expectations.challenge {
        if options.challenge.as_deref() != Some(expected) {
            return Err(ProofError::ChallengeMismatch);
        }
    }

    let mut stripped = as_object(signed)?;
    stripped.remove("proof");
    let input = signing_input(&options, &Value::Object(stripped))?;
    if public_key.verify(&input, &signature)? {
        Ok(options)
    } else {
        Err(ProofError::SignatureInvalid)
    }
}

/// Extracts the proof options and raw signature from a signed document,
/// without verifying anything.
pub fn embedded_proof(signed: &Value) -> Result<(ProofOptions, Vec<u8>), ProofError> {
    let proof = signed
        .get("proof")
        .ok_or_else(|| ProofError::SignatureMalformed("document has no proof".into()))?;
    let mut proof_object = as_object(proof)?;
    let value = proof_object
        .remove("proofValue")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| ProofError::SignatureMalformed("proof has no proofValue".into()))?;
    let signature = b64::decode(&value)
        .map_err(|_| ProofError::SignatureMalformed("proofValue is not base64url".into()))?;
    let options: ProofOptions = serde_json::from_value(Value::Object(proof_object))
        .map_err(|error| ProofError::SignatureMalformed(format!("bad proof options: {error}")))?;
    Ok((options, signature))
}

/// `SHA-256(JCS(options)) ‖ SHA-256(JCS(document))`, the exact byte sequence
/// the proof signature covers. `document` must already have `proof` removed.
fn signing_input(options: &ProofOptions, document: &Value) -> Result<Vec<u8>, ProofError> {
    let options_value = serde_json::to_value(options).expect("proof options serialize");
    let h_opts = Sha256::digest(jcs::canonicalize(&options_value)?);
    let h_doc = Sha256::digest(jcs::canonicalize(document)?);
    let mut input = Vec::with_capacity(64);
    input.extend_from_slice(&h_opts);
    input.extend_from_slice(&h_doc);
    Ok(input)
}

fn as_object(value: &Value) -> Result<serde_json::Map<String, Value>, ProofError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| ProofError::SignatureMalformed("expected a JSON object".into()))
}
