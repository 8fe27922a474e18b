//! Bearer access tokens.
//!
//! A token is a JWS under the server's token key with payload
//! `{did, iat, exp}`. Clients cache it per `(host, port)` and fall back to a
//! fresh `DIDWba` header whenever the server rejects it.

use serde_json::{Value, json};

use anp_identity::proof::jws::{self, ClaimPolicy, JwsSigner, JwsVerifier};
use anp_types::did::Did;
use anp_types::UtcTimestamp;

use crate::error::AuthError;

/// Default token lifetime: one hour.
pub const DEFAULT_LIFETIME_SECS: i64 = 3600;

/// Issues a bearer token for a caller whose `DIDWba` header just verified.
pub fn issue_token(did: &Did, signer: &JwsSigner, lifetime_secs: i64) -> Result<String, AuthError> {
    let now = UtcTimestamp::now().unix();
    let claims = json!({
        "did": did,
        "iat": now,
        "exp": now + lifetime_secs,
    });
    Ok(jws::sign(&claims, None, signer)?)
}

/// Verifies a bearer token and returns the caller's DID.
///
/// `exp` is exclusive: a token presented exactly at its expiry is rejected,
/// sending the client back to the `DIDWba` phase.
pub fn verify_token(
    token: &str,
    verifier: &JwsVerifier,
    skew: chrono::Duration,
) -> Result<Did, AuthError> {
    let decoded = jws::verify(token, verifier)?;
    jws::validate_claims(&decoded.claims, &ClaimPolicy::new(UtcTimestamp::now(), skew))?;
    let did = decoded
        .claims
        .get("did")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AuthError::Proof(anp_identity::ProofError::PayloadSchemaInvalid(
                "token has no did claim".into(),
            ))
        })?;
    Did::new(did).map_err(|error| {
        AuthError::Proof(anp_identity::ProofError::PayloadSchemaInvalid(error.to_string()))
    })
}

/// Extracts the token from a `Bearer` authorization header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let trimmed = header.trim_start();
    if trimmed.len() > 7 && trimmed[..7].eq_ignore_ascii_case("bearer ") {
        Some(trimmed[7..].trim())
    } else {
        None
    }
}
