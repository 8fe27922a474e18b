//! The `DIDWba` authorization header.
//!
//! Wire shape (pair order is not significant):
//!
//! ```text
//! Authorization: DIDWba did="did:wba:didhost.cc:agent", nonce="…",
//!     timestamp="2026-08-01T12:00:00Z", verification_method="#key-1",
//!     signature="…"
//! ```
//!
//! The signature covers `SHA-256(JCS({nonce, timestamp, service, did}))`,
//! binding the header to one target service so it cannot be replayed against
//! another host even inside the clock-skew window.

use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use anp_crypto::KeyPair;
use anp_identity::resolver::{DidResolver, FetchDocument, public_key_for};
use anp_types::did::Did;
use anp_types::util::b64;
use anp_types::{UtcTimestamp, jcs};

use crate::error::AuthError;
use crate::nonce::NonceWindow;

/// The scheme token, emitted exactly in this casing.
pub const SCHEME: &str = "DIDWba";

static PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*([A-Za-z_]+)\s*=\s*"([^"]*)"\s*$"#).expect("valid pair regex"));

/// Verification policy for incoming headers.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Maximum tolerated distance between the header timestamp and now.
    pub clock_skew: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            clock_skew: chrono::Duration::seconds(300),
        }
    }
}

/// A parsed (not yet verified) `DIDWba` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidWbaHeader {
    pub did: Did,
    pub nonce: String,
    pub timestamp: UtcTimestamp,
    pub verification_method: String,
    pub signature: String,
}

/// The caller established by a successful header verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub did: Did,
    pub verification_method: String,
}

impl DidWbaHeader {
    /// Parses an `Authorization` header value. The scheme token is matched
    /// case-insensitively; all five fields must be present and quoted.
    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let rest = header
            .trim_start()
            .strip_prefix_ignore_case(SCHEME)
            .ok_or_else(|| AuthError::HeaderMalformed("missing DIDWba scheme".into()))?;

        let mut did = None;
        let mut nonce = None;
        let mut timestamp = None;
        let mut verification_method = None;
        let mut signature = None;
        for pair in rest.split(',') {
            let captures = PAIR_RE
                .captures(pair)
                .ok_or_else(|| AuthError::HeaderMalformed(format!("bad pair: {pair:?}")))?;
            let key = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let value = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
            let slot = match key {
                "did" => &mut did,
                "nonce" => &mut nonce,
                "timestamp" => &mut timestamp,
                "verification_method" => &mut verification_method,
                "signature" => &mut signature,
                other => {
                    return Err(AuthError::HeaderMalformed(format!("unknown field {other:?}")));
                }
            };
            if slot.replace(value.to_string()).is_some() {
                return Err(AuthError::HeaderMalformed(format!("duplicate field {key:?}")));
            }
        }

        let did = did.ok_or_else(|| AuthError::HeaderMalformed("missing did".into()))?;
        let timestamp = timestamp
            .ok_or_else(|| AuthError::HeaderMalformed("missing timestamp".into()))?;
        Ok(Self {
            did: Did::new(did).map_err(|e| AuthError::HeaderMalformed(e.to_string()))?,
            nonce: nonce.ok_or_else(|| AuthError::HeaderMalformed("missing nonce".into()))?,
            timestamp: UtcTimestamp::parse(&timestamp)
                .map_err(|e| AuthError::HeaderMalformed(format!("bad timestamp: {e}")))?,
            verification_method: verification_method
                .ok_or_else(|| AuthError::HeaderMalformed("missing verification_method".into()))?,
            signature: signature
                .ok_or_else(|| AuthError::HeaderMalformed("missing signature".into()))?,
        })
    }

    /// Renders the header value in canonical field order.
    pub fn to_header_value(&self) -> String {
        format!(
            r#"{SCHEME} did="{}", nonce="{}", timestamp="{}", verification_method="{}", signature="{}""#,
            self.did, self.nonce, self.timestamp, self.verification_method, self.signature
        )
    }
}

/// Builds a `DIDWba` header for `service`, signing with `key`.
pub fn build_header(
    did: &Did,
    key: &KeyPair,
    verification_method: &str,
    service: &str,
) -> Result<String, AuthError> {
    let mut nonce_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    build_header_at(
        did,
        key,
        verification_method,
        service,
        b64::encode(nonce_bytes),
        UtcTimestamp::now(),
    )
}

/// [`build_header`] with caller-chosen nonce and timestamp.
pub fn build_header_at(
    did: &Did,
    key: &KeyPair,
    verification_method: &str,
    service: &str,
    nonce: String,
    timestamp: UtcTimestamp,
) -> Result<String, AuthError> {
    let hash = payload_hash(&nonce, &timestamp, service, did)?;
    let signature = key.sign(&hash)?;
    let header = DidWbaHeader {
        did: did.clone(),
        nonce,
        timestamp,
        verification_method: verification_method.to_string(),
        signature: b64::encode(signature),
    };
    Ok(header.to_header_value())
}

/// Verifies an incoming header for `service`.
///
/// Order matters: cheap structural and time checks run before the nonce
/// window is consulted, and the nonce is only recorded after the signature
/// verifies so garbage cannot fill the window.
#[tracing::instrument(skip_all, fields(service = service))]
pub async fn verify_header<F: FetchDocument>(
    header: &str,
    service: &str,
    resolver: &DidResolver<F>,
    window: &NonceWindow,
    config: &AuthConfig,
    cancel: &CancellationToken,
) -> Result<VerifiedIdentity, AuthError> {
    let parsed = DidWbaHeader::parse(header)?;
    let now = UtcTimestamp::now();
    if parsed.timestamp.abs_diff(&now) > config.clock_skew {
        return Err(AuthError::TimestampOutsideSkew);
    }
    if window.contains(&parsed.nonce) {
        return Err(AuthError::NonceReplay);
    }

    let document = resolver.resolve(&parsed.did, cancel).await?;
    let public_key = public_key_for(&document, &parsed.verification_method)?;
    let hash = payload_hash(&parsed.nonce, &parsed.timestamp, service, &parsed.did)?;
    let signature = b64::decode(&parsed.signature)
        .map_err(|_| AuthError::HeaderMalformed("signature is not base64url".into()))?;
    if !public_key.verify(&hash, &signature)? {
        return Err(AuthError::SignatureInvalid);
    }

    if !window.insert(&parsed.nonce, parsed.timestamp, now) {
        return Err(AuthError::NonceReplay);
    }
    tracing::debug!(did = %parsed.did, "DIDWba header verified");
    Ok(VerifiedIdentity {
        did: parsed.did,
        verification_method: parsed.verification_method,
    })
}

fn payload_hash(
    nonce: &str,
    timestamp: &UtcTimestamp,
    service: &str,
    did: &Did,
) -> Result<[u8; 32], AuthError> {
    let payload = json!({
        "nonce": nonce,
        "timestamp": timestamp,
        "service": service,
        "did": did,
    });
    let canonical = jcs::canonicalize(&payload)
        .map_err(|e| AuthError::Proof(anp_identity::ProofError::Canonicalize(e)))?;
    Ok(Sha256::digest(canonical).into())
}

trait StripPrefixIgnoreCase {
    fn strip_prefix_ignore_case<'a>(&'a self, prefix: &str) -> Option<&'a str>;
}

impl StripPrefixIgnoreCase for str {
    fn strip_prefix_ignore_case<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        if self.len() >= prefix.len() && self[..prefix.len()].eq_ignore_ascii_case(prefix) {
            Some(&self[prefix.len()..])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anp_crypto::{KeyKind, codec};
    use anp_identity::ResolverConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use url::Url;

    struct OneDoc {
        url: String,
        doc: Mutex<serde_json::Value>,
    }

    #[async_trait]
    impl FetchDocument for OneDoc {
        async fn fetch(&self, url: &Url) -> Result<serde_json::Value, anp_identity::IdentityError> {
            if url.as_str() == self.url {
                Ok(self.doc.lock().unwrap().clone())
            } else {
                Err(anp_identity::IdentityError::HttpStatus(404))
            }
        }
    }

    struct Fixture {
        did: Did,
        key: KeyPair,
        resolver: DidResolver<OneDoc>,
        window: NonceWindow,
        config: AuthConfig,
    }

    fn fixture() -> Fixture {
        let key = KeyPair::generate(KeyKind::Secp256k1);
        let subject = "did:wba:didhost.cc:agent";
        let doc = json!({
            "@context": ["https://www.w3.org/ns/did/v1"],
            "id": subject,
            "verificationMethod": [{
                "id": format!("{subject}#key-1"),
                "type": "EcdsaSecp256k1VerificationKey2019",
                "controller": subject,
                "publicKeyMultibase": codec::public_key_to_multibase(&key.public())
            }],
            "authentication": [format!("{subject}#key-1")]
        });
        Fixture {
            did: Did::new(subject).unwrap(),
            key,
            resolver: DidResolver::with_fetch(
                OneDoc {
                    url: "https://didhost.cc/agent/.well-known/did.json".into(),
                    doc: Mutex::new(doc),
                },
                ResolverConfig::default(),
            ),
            window: NonceWindow::new(1024, chrono::Duration::seconds(300)),
            config: AuthConfig::default(),
        }
    }

    #[test]
    fn parse_accepts_unordered_pairs_and_any_scheme_case() {
        let header = r##"didwba nonce="n-1", did="did:wba:didhost.cc:agent", signature="c2ln", verification_method="#key-1", timestamp="2026-08-01T12:00:00Z""##;
        let parsed = DidWbaHeader::parse(header).unwrap();
        assert_eq!(parsed.did.as_str(), "did:wba:didhost.cc:agent");
        assert_eq!(parsed.nonce, "n-1");
        assert_eq!(parsed.verification_method, "#key-1");
    }

    #[test]
    fn parse_rejects_missing_and_duplicate_fields() {
        let missing = r#"DIDWba did="did:wba:didhost.cc:agent", nonce="n""#;
        assert!(matches!(
            DidWbaHeader::parse(missing),
            Err(AuthError::HeaderMalformed(_))
        ));
        let duplicate = r##"DIDWba did="did:wba:a", did="did:wba:b", nonce="n", timestamp="2026-08-01T12:00:00Z", verification_method="#k", signature="s""##;
        assert!(matches!(
            DidWbaHeader::parse(duplicate),
            Err(AuthError::HeaderMalformed(_))
        ));
        let unquoted = r##"DIDWba did=did:wba:a, nonce="n", timestamp="2026-08-01T12:00:00Z", verification_method="#k", signature="s""##;
        assert!(matches!(
            DidWbaHeader::parse(unquoted),
            Err(AuthError::HeaderMalformed(_))
        ));
    }

    #[tokio::test]
    async fn round_trip_header_verifies_once() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let header = build_header(&fx.did, &fx.key, "#key-1", "didhost.cc").unwrap();

        let verified = verify_header(&header, "didhost.cc", &fx.resolver, &fx.window, &fx.config, &cancel)
            .await
            .unwrap();
        assert_eq!(verified.did, fx.did);

        // Same header again inside the window: replay.
        let replay = verify_header(&header, "didhost.cc", &fx.resolver, &fx.window, &fx.config, &cancel)
            .await
            .unwrap_err();
        assert_eq!(replay, AuthError::NonceReplay);
    }

    #[tokio::test]
    async fn header_is_bound_to_the_target_service() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let header = build_header(&fx.did, &fx.key, "#key-1", "didhost.cc").unwrap();
        let error = verify_header(&header, "other.example", &fx.resolver, &fx.window, &fx.config, &cancel)
            .await
            .unwrap_err();
        assert_eq!(error, AuthError::SignatureInvalid);
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected_by_skew_not_nonce() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let stale = UtcTimestamp::now() - chrono::Duration::seconds(301);
        let header = build_header_at(
            &fx.did,
            &fx.key,
            "#key-1",
            "didhost.cc",
            "stale-nonce".into(),
            stale,
        )
        .unwrap();
        let error = verify_header(&header, "didhost.cc", &fx.resolver, &fx.window, &fx.config, &cancel)
            .await
            .unwrap_err();
        assert_eq!(error, AuthError::TimestampOutsideSkew);
        assert!(fx.window.is_empty());
    }

    #[tokio::test]
    async fn timestamp_at_the_skew_boundary_is_accepted() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        // One second inside the boundary; the exact edge is exercised in the
        // claim-window tests where the clock is fully controlled.
        let edge = UtcTimestamp::now() - chrono::Duration::seconds(299);
        let header = build_header_at(
            &fx.did,
            &fx.key,
            "#key-1",
            "didhost.cc",
            "edge-nonce".into(),
            edge,
        )
        .unwrap();
        verify_header(&header, "didhost.cc", &fx.resolver, &fx.window, &fx.config, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tampered_signature_is_invalid() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let header = build_header(&fx.did, &fx.key, "#key-1", "didhost.cc").unwrap();
        let mut parsed = DidWbaHeader::parse(&header).unwrap();
        let mut raw = b64::decode(&parsed.signature).unwrap();
        raw[5] ^= 0x01;
        parsed.signature = b64::encode(raw);
        let error = verify_header(
            &parsed.to_header_value(),
            "didhost.cc",
            &fx.resolver,
            &fx.window,
            &fx.config,
            &cancel,
        )
        .await
        .unwrap_err();
        assert_eq!(error, AuthError::SignatureInvalid);
    }
}
