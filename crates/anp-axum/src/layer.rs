//! The tower layer and service.

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};

use anp_auth::header::AuthConfig;
use anp_auth::token::DEFAULT_LIFETIME_SECS;
use anp_auth::{NonceWindow, issue_token, parse_bearer, verify_header, verify_token};
use anp_identity::DidResolver;
use anp_identity::proof::jws::{JwsSigner, JwsVerifier};
use anp_identity::resolver::{FetchDocument, HttpFetch};
use anp_types::did::Did;

/// The authenticated caller, inserted as a request extension for handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerDid(pub Did);

/// Shared verification state: resolver, replay window, token keys, policy.
pub struct AuthState<F = HttpFetch> {
    pub resolver: Arc<DidResolver<F>>,
    pub nonce_window: NonceWindow,
    pub token_signer: JwsSigner,
    pub token_verifier: JwsVerifier,
    /// The service identifier callers must have signed over, normally this
    /// server's external authority (`host` or `host:port`).
    pub service: String,
    pub config: AuthConfig,
    pub token_lifetime_secs: i64,
}

impl<F> AuthState<F> {
    pub fn new(resolver: Arc<DidResolver<F>>, token_signer: JwsSigner, service: impl Into<String>) -> Self {
        let config = AuthConfig::default();
        let token_verifier = token_signer.verifier();
        Self {
            resolver,
            nonce_window: NonceWindow::new(4096, config.clock_skew),
            token_signer,
            token_verifier,
            service: service.into(),
            config,
            token_lifetime_secs: DEFAULT_LIFETIME_SECS,
        }
    }
}

/// Layer wrapping routes with ANP authentication.
pub struct DidWbaLayer<F = HttpFetch> {
    state: Arc<AuthState<F>>,
}

impl<F> DidWbaLayer<F> {
    pub fn new(state: Arc<AuthState<F>>) -> Self {
        Self { state }
    }
}

impl<F> Clone for DidWbaLayer<F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S, F> Layer<S> for DidWbaLayer<F> {
    type Service = DidWbaMiddleware<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        DidWbaMiddleware {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// The middleware service produced by [`DidWbaLayer`].
pub struct DidWbaMiddleware<S, F = HttpFetch> {
    inner: S,
    state: Arc<AuthState<F>>,
}

impl<S: Clone, F> Clone for DidWbaMiddleware<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S, F> Service<Request> for DidWbaMiddleware<S, F>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    F: FetchDocument + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let state = Arc::clone(&self.state);
        let clone = self.inner.clone();
        // The clone is fresh; the original has been poll_ready'd.
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(authorization) = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
            else {
                return Ok(unauthorized("missing Authorization header"));
            };

            // Phase 2: a cached bearer token.
            if let Some(token) = parse_bearer(&authorization) {
                return match verify_token(token, &state.token_verifier, state.config.clock_skew) {
                    Ok(did) => {
                        request.extensions_mut().insert(CallerDid(did));
                        inner.call(request).await
                    }
                    Err(error) => {
                        tracing::debug!(%error, "bearer token rejected");
                        Ok(unauthorized("bearer token rejected"))
                    }
                };
            }

            // Phase 1: a DIDWba header.
            let cancel = CancellationToken::new();
            let verified = match verify_header(
                &authorization,
                &state.service,
                &state.resolver,
                &state.nonce_window,
                &state.config,
                &cancel,
            )
            .await
            {
                Ok(verified) => verified,
                Err(error) => {
                    tracing::debug!(%error, "DIDWba header rejected");
                    return Ok(unauthorized(&error.to_string()));
                }
            };

            request.extensions_mut().insert(CallerDid(verified.did.clone()));
            let mut response = inner.call(request).await?;

            // Hand the caller a bearer for subsequent requests.
            match issue_token(&verified.did, &state.token_signer, state.token_lifetime_secs) {
                Ok(token) => {
                    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                        response.headers_mut().insert(AUTHORIZATION, value);
                    }
                }
                Err(error) => tracing::warn!(%error, "failed to issue bearer token"),
            }
            Ok(response)
        })
    }
}

fn unauthorized(reason: &str) -> Response {
    let body = json!({
        "error": reason,
        "schemes": ["DIDWba", "Bearer"],
    });
    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("DIDWba"));
    response
}
