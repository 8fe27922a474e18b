//! JWS compact serialization (RS256 / ES256K).
//!
//! Used for bearer tokens and AP2 mandate authorizations. The signing input
//! is the exact ASCII sequence `b64url(header) "." b64url(payload)`; both
//! algorithms hash it with SHA-256. ES256K signatures use the JOSE raw
//! `R‖S` convention (64 bytes), not DER.

use k256::ecdsa::signature::{DigestSigner, DigestVerifier};
use rsa::sha2::Sha256 as RsaSha256;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use anp_types::UtcTimestamp;
use anp_types::util::b64;

use super::ProofError;

/// JWS algorithms ANP emits and accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwsAlgorithm {
    #[serde(rename = "RS256")]
    Rs256,
    #[serde(rename = "ES256K")]
    Es256k,
}

impl std::fmt::Display for JwsAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JwsAlgorithm::Rs256 => "RS256",
            JwsAlgorithm::Es256k => "ES256K",
        })
    }
}

/// The protected header of an ANP JWS: `{alg, kid?, typ: "JWT"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: JwsAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub typ: String,
}

/// A private key bound to its JWS algorithm.
pub enum JwsSigner {
    Rs256(rsa::RsaPrivateKey),
    Es256k(k256::ecdsa::SigningKey),
}

impl JwsSigner {
    /// Generates a fresh 2048-bit RSA signing key.
    pub fn generate_rs256() -> Result<Self, ProofError> {
        let key = rsa::RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .map_err(|error| ProofError::SignatureMalformed(format!("RSA keygen: {error}")))?;
        Ok(JwsSigner::Rs256(key))
    }

    /// Generates a fresh secp256k1 signing key.
    pub fn generate_es256k() -> Self {
        JwsSigner::Es256k(k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn algorithm(&self) -> JwsAlgorithm {
        match self {
            JwsSigner::Rs256(_) => JwsAlgorithm::Rs256,
            JwsSigner::Es256k(_) => JwsAlgorithm::Es256k,
        }
    }

    /// The matching verification key.
    pub fn verifier(&self) -> JwsVerifier {
        match self {
            JwsSigner::Rs256(key) => JwsVerifier::Rs256(key.to_public_key()),
            JwsSigner::Es256k(key) => JwsVerifier::Es256k(*key.verifying_key()),
        }
    }
}

/// A public key bound to its JWS algorithm.
#[derive(Debug, Clone)]
pub enum JwsVerifier {
    Rs256(rsa::RsaPublicKey),
    Es256k(k256::ecdsa::VerifyingKey),
}

impl JwsVerifier {
    pub fn algorithm(&self) -> JwsAlgorithm {
        match self {
            JwsVerifier::Rs256(_) => JwsAlgorithm::Rs256,
            JwsVerifier::Es256k(_) => JwsAlgorithm::Es256k,
        }
    }
}

/// A verified JWS: header plus decoded claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedJws {
    pub header: JwsHeader,
    pub claims: Value,
}

/// Signs a claim object, producing the compact `header.payload.signature`.
pub fn sign(claims: &Value, kid: Option<&str>, signer: &JwsSigner) -> Result<String, ProofError> {
    let header = JwsHeader {
        alg: signer.algorithm(),
        kid: kid.map(str::to_string),
        typ: "JWT".into(),
    };
    let header_bytes = serde_json::to_vec(&header)
        .map_err(|error| ProofError::PayloadSchemaInvalid(error.to_string()))?;
    let payload_bytes = serde_json::to_vec(claims)
        .map_err(|error| ProofError::PayloadSchemaInvalid(error.to_string()))?;
    let input = format!("{}.{}", b64::encode(header_bytes), b64::encode(payload_bytes));

    let signature = match signer {
        JwsSigner::Rs256(key) => {
            let signing_key = rsa::pkcs1v15::SigningKey::<RsaSha256>::new(key.clone());
            let signature: rsa::pkcs1v15::Signature = signing_key.sign(input.as_bytes());
            signature.to_vec()
        }
        JwsSigner::Es256k(key) => {
            let digest = Sha256::new_with_prefix(input.as_bytes());
            let signature: k256::ecdsa::Signature = key.sign_digest(digest);
            let signature = signature.normalize_s().unwrap_or(signature);
            signature.to_bytes().to_vec()
        }
    };
    Ok(format!("{input}.{}", b64::encode(signature)))
}

/// Checks a compact JWS signature and decodes its parts.
///
/// Only the cryptographic envelope is checked here; claim windows and
/// audience are enforced separately through [`validate_claims`] so callers
/// can report the precise failure kind.
pub fn verify(token: &str, verifier: &JwsVerifier) -> Result<DecodedJws, ProofError> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) = match (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) {
        (Some(h), Some(p), Some(s), None) => (h, p, s),
        _ => {
            return Err(ProofError::SignatureMalformed(
                "compact JWS must have exactly three segments".into(),
            ));
        }
    };
    let header_bytes = b64::decode(header_b64)
        .map_err(|_| ProofError::SignatureMalformed("header is not base64url".into()))?;
    let header_value: Value = serde_json::from_slice(&header_bytes)
        .map_err(|_| ProofError::SignatureMalformed("header is not JSON".into()))?;
    let alg = header_value
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| ProofError::SignatureMalformed("header has no alg".into()))?;
    let header: JwsHeader = match serde_json::from_value(header_value.clone()) {
        Ok(header) => header,
        Err(_) => return Err(ProofError::AlgorithmUnsupported(alg.to_string())),
    };
    if header.alg != verifier.algorithm() {
        return Err(ProofError::AlgorithmMismatch {
            proof: header.alg.to_string(),
            key: verifier.algorithm().to_string(),
        });
    }

    let signature = b64::decode(signature_b64)
        .map_err(|_| ProofError::SignatureMalformed("signature is not base64url".into()))?;
    let input = format!("{header_b64}.{payload_b64}");
    let valid = match verifier {
        JwsVerifier::Rs256(key) => {
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<RsaSha256>::new(key.clone());
            let signature = rsa::pkcs1v15::Signature::try_from(signature.as_slice())
                .map_err(|_| ProofError::SignatureMalformed("bad RS256 signature".into()))?;
            verifying_key.verify(input.as_bytes(), &signature).is_ok()
        }
        JwsVerifier::Es256k(key) => {
            let signature = k256::ecdsa::Signature::from_slice(&signature)
                .map_err(|_| ProofError::SignatureMalformed("expected 64-byte R||S".into()))?;
            let digest = Sha256::new_with_prefix(input.as_bytes());
            key.verify_digest(digest, &signature).is_ok()
        }
    };
    if !valid {
        return Err(ProofError::SignatureInvalid);
    }

    let payload_bytes = b64::decode(payload_b64)
        .map_err(|_| ProofError::SignatureMalformed("payload is not base64url".into()))?;
    let claims: Value = serde_json::from_slice(&payload_bytes)
        .map_err(|error| ProofError::PayloadSchemaInvalid(error.to_string()))?;
    Ok(DecodedJws { header, claims })
}

/// Time-window and audience policy applied to verified claims.
#[derive(Debug, Clone)]
pub struct ClaimPolicy {
    pub now: UtcTimestamp,
    /// Tolerated forward clock skew for `iat`.
    pub skew: chrono::Duration,
    /// When set, `aud` must equal this value.
    pub audience: Option<String>,
    /// When set, `iss` must equal this value.
    pub issuer: Option<String>,
}

impl ClaimPolicy {
    pub fn new(now: UtcTimestamp, skew: chrono::Duration) -> Self {
        Self {
            now,
            skew,
            audience: None,
            issuer: None,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }
}

/// Enforces `iat ≤ now + skew`, `now < exp`, and the optional `aud` / `iss`
/// equalities. Every failure keeps its own kind.
pub fn validate_claims(claims: &Value, policy: &ClaimPolicy) -> Result<(), ProofError> {
    let iat = required_i64(claims, "iat")?;
    let exp = required_i64(claims, "exp")?;
    let now = policy.now.unix();
    if iat > now + policy.skew.num_seconds() {
        return Err(ProofError::TimestampOutsideSkew);
    }
    if now >= exp {
        return Err(ProofError::TokenExpired);
    }
    if let Some(expected) = &policy.audience {
        let actual = claims.get("aud").and_then(Value::as_str).unwrap_or_default();
        if actual != expected {
            return Err(ProofError::AudienceMismatch {
                expected: expected.clone(),
                actual: actual.to_string(),
            });
        }
    }
    if let Some(expected) = &policy.issuer {
        let actual = claims.get("iss").and_then(Value::as_str).unwrap_or_default();
        if actual != expected {
            return Err(ProofError::IssuerMismatch {
                expected: expected.clone(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

fn required_i64(claims: &Value, name: &str) -> Result<i64, ProofError> {
    claims
        .get(name)
        .and_then(Value::as_i64)
        .ok_or_else(|| ProofError::PayloadSchemaInvalid(format!("missing numeric claim {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(iat: i64, exp: i64) -> Value {
        json!({
            "iss": "did:wba:didhost.cc:issuer",
            "sub": "did:wba:didhost.cc:issuer",
            "aud": "did:wba:didhost.cc:peer",
            "iat": iat,
            "exp": exp,
            "jti": "a2f5…"
        })
    }

    fn policy_at(now: i64) -> ClaimPolicy {
        ClaimPolicy::new(
            UtcTimestamp::from_unix(now).unwrap(),
            chrono::Duration::seconds(300),
        )
    }

    #[test]
    fn es256k_sign_verify_round_trip() {
        let signer = JwsSigner::generate_es256k();
        let token = sign(&claims(1_000, 2_000), Some("#key-1"), &signer).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let decoded = verify(&token, &signer.verifier()).unwrap();
        assert_eq!(decoded.header.alg, JwsAlgorithm::Es256k);
        assert_eq!(decoded.header.kid.as_deref(), Some("#key-1"));
        assert_eq!(decoded.claims["iss"], "did:wba:didhost.cc:issuer");
    }

    #[test]
    fn rs256_sign_verify_round_trip() {
        let signer = JwsSigner::generate_rs256().unwrap();
        let token = sign(&claims(1_000, 2_000), None, &signer).unwrap();
        let decoded = verify(&token, &signer.verifier()).unwrap();
        assert_eq!(decoded.header.alg, JwsAlgorithm::Rs256);
    }

    #[test]
    fn tampered_payload_fails() {
        let signer = JwsSigner::generate_es256k();
        let token = sign(&claims(1_000, 2_000), None, &signer).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = b64::encode(serde_json::to_vec(&claims(1_000, 9_000)).unwrap());
        parts[1] = &forged;
        let forged_token = parts.join(".");
        assert_eq!(
            verify(&forged_token, &signer.verifier()),
            Err(ProofError::SignatureInvalid)
        );
    }

    #[test]
    fn algorithm_mismatch_between_header_and_key() {
        let es256k = JwsSigner::generate_es256k();
        let rs256 = JwsSigner::generate_rs256().unwrap();
        let token = sign(&claims(1_000, 2_000), None, &es256k).unwrap();
        assert!(matches!(
            verify(&token, &rs256.verifier()),
            Err(ProofError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn unknown_algorithm_is_unsupported() {
        let header = b64::encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = b64::encode(br#"{}"#);
        let token = format!("{header}.{payload}.AAAA");
        let signer = JwsSigner::generate_es256k();
        assert_eq!(
            verify(&token, &signer.verifier()),
            Err(ProofError::AlgorithmUnsupported("HS256".into()))
        );
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let signer = JwsSigner::generate_es256k();
        assert!(matches!(
            verify("only.two", &signer.verifier()),
            Err(ProofError::SignatureMalformed(_))
        ));
    }

    #[test]
    fn claim_window_boundaries() {
        // iat exactly at now + skew is accepted; one second past is not.
        validate_claims(&claims(1_300, 2_000), &policy_at(1_000)).unwrap();
        assert_eq!(
            validate_claims(&claims(1_301, 2_000), &policy_at(1_000)),
            Err(ProofError::TimestampOutsideSkew)
        );
        // exp is exclusive: rejected at exp, accepted one second before.
        assert_eq!(
            validate_claims(&claims(1_000, 1_500), &policy_at(1_500)),
            Err(ProofError::TokenExpired)
        );
        validate_claims(&claims(1_000, 1_500), &policy_at(1_499)).unwrap();
    }

    #[test]
    fn audience_and_issuer_checks() {
        let ok = policy_at(1_500).with_audience("did:wba:didhost.cc:peer");
        validate_claims(&claims(1_000, 2_000), &ok).unwrap();

        let wrong_aud = policy_at(1_500).with_audience("did:wba:didhost.cc:other");
        assert!(matches!(
            validate_claims(&claims(1_000, 2_000), &wrong_aud),
            Err(ProofError::AudienceMismatch { .. })
        ));

        let wrong_iss = policy_at(1_500).with_issuer("did:wba:didhost.cc:other");
        assert!(matches!(
            validate_claims(&claims(1_000, 2_000), &wrong_iss),
            Err(ProofError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn missing_claims_are_schema_errors() {
        let signerless = json!({"iss": "x"});
        assert!(matches!(
            validate_claims(&signerless, &policy_at(1_000)),
            Err(ProofError::PayloadSchemaInvalid(_))
        ));
    }
}
