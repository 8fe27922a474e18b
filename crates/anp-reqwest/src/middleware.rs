//! The middleware implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use http::Extensions;
use http::header::AUTHORIZATION;
use reqwest::{Request, Response, StatusCode};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;

use anp_auth::{build_header, parse_bearer};
use anp_crypto::KeyPair;
use anp_types::did::Did;

/// Errors raised while attaching authentication to a request.
#[derive(Debug, thiserror::Error)]
pub enum DidWbaAuthError {
    /// The request URL has no host to authenticate against.
    #[error("request URL has no host")]
    MissingHost,
    /// Building the `DIDWba` header failed.
    #[error(transparent)]
    Auth(#[from] anp_auth::AuthError),
    /// The original request body cannot be cloned for the re-auth retry.
    #[error("request is not cloneable; streaming bodies cannot be retried")]
    RequestNotCloneable,
}

/// Client-side ANP authentication state: signing identity plus the bearer
/// cache.
pub struct DidWbaAuth {
    did: Did,
    key: Arc<KeyPair>,
    verification_method: String,
    /// Cached bearer tokens keyed by `host[:port]`.
    tokens: DashMap<String, String>,
}

impl DidWbaAuth {
    pub fn new(did: Did, key: Arc<KeyPair>, verification_method: impl Into<String>) -> Self {
        Self {
            did,
            key,
            verification_method: verification_method.into(),
            tokens: DashMap::new(),
        }
    }

    /// The `(host, port)` cache key and service identifier for a URL.
    fn service_for(url: &reqwest::Url) -> Result<String, DidWbaAuthError> {
        let host = url.host_str().ok_or(DidWbaAuthError::MissingHost)?;
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    fn fresh_didwba_header(&self, service: &str) -> Result<String, DidWbaAuthError> {
        Ok(build_header(
            &self.did,
            &self.key,
            &self.verification_method,
            service,
        )?)
    }

    /// Remembers a bearer the server handed back in its response.
    fn absorb_bearer(&self, service: &str, response: &Response) {
        let bearer = response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer);
        if let Some(token) = bearer {
            tracing::debug!(service, "caching bearer token");
            self.tokens.insert(service.to_string(), token.to_string());
        }
    }
}

#[async_trait]
impl Middleware for DidWbaAuth {
    async fn handle(
        &self,
        mut request: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let service = Self::service_for(request.url())
            .map_err(|error| reqwest_middleware::Error::Middleware(error.into()))?;

        // Keep a clone around in case the server rejects our bearer.
        let retry = request.try_clone();

        let cached_bearer = self.tokens.get(&service).map(|token| token.clone());
        let authorization = match &cached_bearer {
            Some(token) => format!("Bearer {token}"),
            None => self
                .fresh_didwba_header(&service)
                .map_err(|error| reqwest_middleware::Error::Middleware(error.into()))?,
        };
        request.headers_mut().insert(
            AUTHORIZATION,
            authorization
                .parse()
                .map_err(|_| reqwest_middleware::Error::Middleware(anyhow::anyhow!("authorization header value invalid")))?,
        );

        let response = next.clone().run(request, extensions).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            self.absorb_bearer(&service, &response);
            return Ok(response);
        }

        // A rejected bearer sends us back to phase 1 exactly once.
        if cached_bearer.is_none() {
            return Ok(response);
        }
        tracing::debug!(service, "bearer rejected, re-authenticating with DIDWba");
        self.tokens.remove(&service);

        let mut retry = retry.ok_or_else(|| {
            reqwest_middleware::Error::Middleware(DidWbaAuthError::RequestNotCloneable.into())
        })?;
        let header = self
            .fresh_didwba_header(&service)
            .map_err(|error| reqwest_middleware::Error::Middleware(error.into()))?;
        retry.headers_mut().insert(
            AUTHORIZATION,
            header
                .parse()
                .map_err(|_| reqwest_middleware::Error::Middleware(anyhow::anyhow!("authorization header value invalid")))?,
        );
        let response = next.run(retry, extensions).await?;
        self.absorb_bearer(&service, &response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anp_crypto::KeyKind;

    #[test]
    fn service_keys_include_explicit_ports() {
        let bare: reqwest::Url = "https://didhost.cc/path".parse().unwrap();
        assert_eq!(DidWbaAuth::service_for(&bare).unwrap(), "didhost.cc");
        let with_port: reqwest::Url = "https://didhost.cc:8443/path".parse().unwrap();
        assert_eq!(DidWbaAuth::service_for(&with_port).unwrap(), "didhost.cc:8443");
    }

    #[test]
    fn fresh_header_carries_the_scheme() {
        let auth = DidWbaAuth::new(
            Did::new("did:wba:didhost.cc:agent").unwrap(),
            Arc::new(KeyPair::generate(KeyKind::Secp256k1)),
            "#key-1",
        );
        let header = auth.fresh_didwba_header("didhost.cc").unwrap();
        assert!(header.starts_with("DIDWba "));
        assert!(header.contains("did=\"did:wba:didhost.cc:agent\""));
    }
}
