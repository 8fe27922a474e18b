//! DID document resolution and verification-method lookup.
//!
//! [`DidResolver`] fetches `.well-known/did.json`, validates the document,
//! and caches what it learned. Both outcomes are cached: a resolved document
//! for the configured TTL, and an authoritative failure (404, invalid
//! document, identifier mismatch) for a shorter negative TTL so a flapping
//! peer cannot force a fetch per request. Transient transport failures are
//! never cached.
//!
//! Fetching goes through the [`FetchDocument`] seam; production uses
//! [`HttpFetch`] (reqwest), tests inject documents directly.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use anp_crypto::codec;
use anp_crypto::{CryptoError, KeyKind, PublicKey};
use anp_types::did::{Did, DidDocument, VerificationMethod};

use crate::error::IdentityError;
use crate::wba::WbaDid;

/// Tunables for document resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// How long a resolved document stays fresh.
    pub ttl: Duration,
    /// How long an authoritative failure is remembered.
    pub negative_ttl: Duration,
    /// Per-attempt fetch timeout.
    pub request_timeout: Duration,
    /// Total fetch attempts for retryable failures.
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// One fetch attempt of a DID document URL.
///
/// Implementations perform a single request; retry and timeout policy belong
/// to the resolver.
#[async_trait]
pub trait FetchDocument: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<serde_json::Value, IdentityError>;
}

/// reqwest-backed [`FetchDocument`].
#[derive(Debug, Clone, Default)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FetchDocument for HttpFetch {
    async fn fetch(&self, url: &Url) -> Result<serde_json::Value, IdentityError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|error| IdentityError::Network(error.to_string()))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(IdentityError::HttpStatus(status));
        }
        response
            .json()
            .await
            .map_err(|error| IdentityError::Network(error.to_string()))
    }
}

enum CacheSlot {
    Document { doc: Arc<DidDocument>, expires: Instant },
    Failure { error: IdentityError, expires: Instant },
}

/// Resolves and caches `did:wba` documents.
pub struct DidResolver<F = HttpFetch> {
    fetch: F,
    config: ResolverConfig,
    cache: DashMap<Did, CacheSlot>,
}

impl DidResolver<HttpFetch> {
    pub fn new(config: ResolverConfig) -> Self {
        Self::with_fetch(HttpFetch::new(), config)
    }
}

impl<F: FetchDocument> DidResolver<F> {
    pub fn with_fetch(fetch: F, config: ResolverConfig) -> Self {
        Self {
            fetch,
            config,
            cache: DashMap::new(),
        }
    }

    /// Resolves a DID to its validated document.
    ///
    /// Serves from cache when fresh; otherwise fetches with bounded
    /// exponential backoff. `cancel` aborts outstanding I/O with
    /// [`IdentityError::Cancelled`].
    #[tracing::instrument(skip_all, fields(did = %did))]
    pub async fn resolve(
        &self,
        did: &Did,
        cancel: &CancellationToken,
    ) -> Result<Arc<DidDocument>, IdentityError> {
        if let Some(slot) = self.cache.get(did) {
            match &*slot {
                CacheSlot::Document { doc, expires } if *expires > Instant::now() => {
                    return Ok(Arc::clone(doc));
                }
                CacheSlot::Failure { error, expires } if *expires > Instant::now() => {
                    return Err(error.clone());
                }
                _ => {}
            }
        }

        let wba = WbaDid::parse(did.as_str())?;
        let url = wba.document_url();
        let outcome = match self.fetch_with_retry(&url, cancel).await {
            Ok(value) => self.validate(did, value),
            Err(IdentityError::HttpStatus(404)) => Err(IdentityError::NotFound(did.clone())),
            Err(error) => Err(error),
        };

        match &outcome {
            Ok(doc) => {
                self.cache.insert(
                    did.clone(),
                    CacheSlot::Document {
                        doc: Arc::clone(doc),
                        expires: Instant::now() + self.config.ttl,
                    },
                );
            }
            Err(error) if is_authoritative(error) => {
                tracing::debug!(%error, "caching negative resolution");
                self.cache.insert(
                    did.clone(),
                    CacheSlot::Failure {
                        error: error.clone(),
                        expires: Instant::now() + self.config.negative_ttl,
                    },
                );
            }
            Err(_) => {}
        }
        outcome
    }

    /// Drops any cached state for `did`. Documents are never mutated in
    /// place; re-resolution after invalidation is the only refresh path.
    pub fn invalidate(&self, did: &Did) {
        self.cache.remove(did);
    }

    async fn fetch_with_retry(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, IdentityError> {
        let mut delay = self.config.backoff_base;
        let mut attempt = 1u32;
        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IdentityError::Cancelled),
                result = tokio::time::timeout(self.config.request_timeout, self.fetch.fetch(url)) => {
                    match result {
                        Ok(inner) => inner,
                        Err(_) => Err(IdentityError::Timeout),
                    }
                }
            };
            match fetched {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.config.max_attempts && is_retryable(&error) => {
                    tracing::debug!(%error, attempt, "retrying DID document fetch");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(IdentityError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay *= 2;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn validate(&self, did: &Did, value: serde_json::Value) -> Result<Arc<DidDocument>, IdentityError> {
        let document: DidDocument = serde_json::from_value(value)
            .map_err(|error| IdentityError::DocumentInvalid(error.to_string()))?;
        document
            .validate()
            .map_err(|error| IdentityError::DocumentInvalid(error.to_string()))?;
        if document.id != *did {
            return Err(IdentityError::IdentifierMismatch {
                requested: did.clone(),
                found: document.id.clone(),
            });
        }
        Ok(Arc::new(document))
    }
}

fn is_retryable(error: &IdentityError) -> bool {
    matches!(
        error,
        IdentityError::Network(_) | IdentityError::Timeout | IdentityError::HttpStatus(500..=599)
    )
}

fn is_authoritative(error: &IdentityError) -> bool {
    matches!(
        error,
        IdentityError::NotFound(_)
            | IdentityError::DocumentInvalid(_)
            | IdentityError::IdentifierMismatch { .. }
    )
}

/// Looks up a verification method by DID URL and decodes its public key.
pub fn public_key_for(doc: &DidDocument, method_url: &str) -> Result<PublicKey, IdentityError> {
    let method = doc
        .find_method(method_url)
        .ok_or_else(|| IdentityError::MethodNotFound(method_url.to_string()))?;
    decode_method(method)
}

/// Decodes the key material of a verification method according to its type.
pub fn decode_method(method: &VerificationMethod) -> Result<PublicKey, IdentityError> {
    let key = match method.method_type.as_str() {
        "EcdsaSecp256k1VerificationKey2019" => {
            let encoded = require_multibase(method)?;
            codec::public_key_from_multibase(KeyKind::Secp256k1, encoded)?
        }
        "Ed25519VerificationKey2020" => {
            let encoded = require_multibase(method)?;
            codec::public_key_from_multibase(KeyKind::Ed25519, encoded)?
        }
        "JsonWebKey2020" => {
            let jwk = method.public_key_jwk.as_ref().ok_or_else(|| {
                IdentityError::Key(CryptoError::KeyEncodingInvalid(
                    "JsonWebKey2020 requires publicKeyJwk".into(),
                ))
            })?;
            codec::public_key_from_jwk(jwk)?
        }
        other => {
            return Err(IdentityError::Key(CryptoError::AlgorithmUnsupported(
                other.to_string(),
            )));
        }
    };
    Ok(key)
}

fn require_multibase(method: &VerificationMethod) -> Result<&str, IdentityError> {
    method.public_key_multibase.as_deref().ok_or_else(|| {
        IdentityError::Key(CryptoError::KeyEncodingInvalid(
            "verification method requires publicKeyMultibase".into(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anp_crypto::KeyPair;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MapFetch {
        responses: Mutex<HashMap<String, Result<serde_json::Value, IdentityError>>>,
        attempts: AtomicU32,
    }

    impl MapFetch {
        fn single(url: &str, response: Result<serde_json::Value, IdentityError>) -> Self {
            let mut responses = HashMap::new();
            responses.insert(url.to_string(), response);
            Self {
                responses: Mutex::new(responses),
                attempts: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FetchDocument for MapFetch {
        async fn fetch(&self, url: &Url) -> Result<serde_json::Value, IdentityError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .get(url.as_str())
                .cloned()
                .unwrap_or(Err(IdentityError::HttpStatus(404)))
        }
    }

    fn did(s: &str) -> Did {
        Did::new(s).unwrap()
    }

    fn document_for(subject: &str) -> serde_json::Value {
        let public = KeyPair::generate(anp_crypto::KeyKind::Secp256k1).public();
        json!({
            "@context": ["https://www.w3.org/ns/did/v1"],
            "id": subject,
            "verificationMethod": [{
                "id": format!("{subject}#key-1"),
                "type": "EcdsaSecp256k1VerificationKey2019",
                "controller": subject,
                "publicKeyMultibase": codec::public_key_to_multibase(&public)
            }],
            "authentication": [format!("{subject}#key-1")]
        })
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            backoff_base: Duration::from_millis(10),
            ..ResolverConfig::default()
        }
    }

    #[tokio::test]
    async fn resolves_and_caches_documents() {
        let subject = "did:wba:didhost.cc:agent";
        let fetch = MapFetch::single(
            "https://didhost.cc/agent/.well-known/did.json",
            Ok(document_for(subject)),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        let doc = resolver.resolve(&did(subject), &cancel).await.unwrap();
        assert_eq!(doc.id, did(subject));
        let _ = resolver.resolve(&did(subject), &cancel).await.unwrap();
        assert_eq!(resolver.fetch.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn authoritative_404_is_not_found_and_negatively_cached() {
        let subject = "did:wba:didhost.cc:missing";
        let fetch = MapFetch::single(
            "https://didhost.cc/missing/.well-known/did.json",
            Err(IdentityError::HttpStatus(404)),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let error = resolver.resolve(&did(subject), &cancel).await.unwrap_err();
            assert!(matches!(error, IdentityError::NotFound(_)));
        }
        assert_eq!(resolver.fetch.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_server_errors_with_backoff() {
        let subject = "did:wba:didhost.cc:flaky";
        let fetch = MapFetch::single(
            "https://didhost.cc/flaky/.well-known/did.json",
            Err(IdentityError::HttpStatus(503)),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        let error = resolver.resolve(&did(subject), &cancel).await.unwrap_err();
        assert_eq!(error, IdentityError::HttpStatus(503));
        assert_eq!(resolver.fetch.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn identifier_mismatch_is_rejected() {
        let subject = "did:wba:didhost.cc:agent";
        let fetch = MapFetch::single(
            "https://didhost.cc/agent/.well-known/did.json",
            Ok(document_for("did:wba:didhost.cc:other")),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        let error = resolver.resolve(&did(subject), &cancel).await.unwrap_err();
        assert!(matches!(error, IdentityError::IdentifierMismatch { .. }));
    }

    #[tokio::test]
    async fn malformed_document_is_document_invalid() {
        let subject = "did:wba:didhost.cc:agent";
        let fetch = MapFetch::single(
            "https://didhost.cc/agent/.well-known/did.json",
            Ok(json!({"hello": "world"})),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        let error = resolver.resolve(&did(subject), &cancel).await.unwrap_err();
        assert!(matches!(error, IdentityError::DocumentInvalid(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_resolution() {
        let subject = "did:wba:didhost.cc:agent";
        let fetch = MapFetch::single(
            "https://didhost.cc/agent/.well-known/did.json",
            Ok(document_for(subject)),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error = resolver.resolve(&did(subject), &cancel).await.unwrap_err();
        assert_eq!(error, IdentityError::Cancelled);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let subject = "did:wba:didhost.cc:agent";
        let fetch = MapFetch::single(
            "https://didhost.cc/agent/.well-known/did.json",
            Ok(document_for(subject)),
        );
        let resolver = DidResolver::with_fetch(fetch, config());
        let cancel = CancellationToken::new();

        resolver.resolve(&did(subject), &cancel).await.unwrap();
        resolver.invalidate(&did(subject));
        resolver.resolve(&did(subject), &cancel).await.unwrap();
        assert_eq!(resolver.fetch.attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn public_key_lookup_decodes_methods() {
        let subject = "did:wba:didhost.cc:agent";
        let document: DidDocument = serde_json::from_value(document_for(subject)).unwrap();
        let key = public_key_for(&document, "#key-1").unwrap();
        assert_eq!(key.kind(), anp_crypto::KeyKind::Secp256k1);
        assert!(matches!(
            public_key_for(&document, "#key-9").unwrap_err(),
            IdentityError::MethodNotFound(_)
        ));
    }
}
