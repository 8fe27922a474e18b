//! HTTP handlers for the agent node.
//!
//! Public handlers serve the agent's identity documents; the AP2 merchant
//! handlers sit behind the `DIDWba` / `Bearer` layer and read the
//! authenticated caller from the [`CallerDid`] request extension.

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use anp_ap2::types::{CartContents, MoneyAmount, PaymentItem, PaymentMandate};
use anp_ap2::wire::CreateCartMandateRequest;
use anp_ap2::{CartMandateParams, build_cart_mandate, content_hash, verify_payment_mandate};
use anp_axum::CallerDid;
use anp_crypto::PublicKey;
use anp_identity::DidResolver;
use anp_identity::proof::jws::JwsVerifier;
use anp_identity::resolver::{FetchDocument, HttpFetch, public_key_for};
use anp_types::proto::DidMessage;
use anp_types::util::b64;

use crate::identity::AgentIdentity;

/// Shared application state for the handlers.
pub struct AppState<F = HttpFetch> {
    pub identity: AgentIdentity,
    pub resolver: Arc<DidResolver<F>>,
    /// Cart id → cart hash for mandates this merchant issued, so an
    /// incoming payment can be checked against the cart it claims to pay.
    pub issued_carts: DashMap<String, String>,
    pub skew: chrono::Duration,
}

/// Routes that need no authentication.
pub fn public_routes<F: FetchDocument + 'static>() -> Router<Arc<AppState<F>>> {
    Router::new()
        .route("/.well-known/did.json", get(get_did_document::<F>))
        .route("/ad.json", get(get_agent_description::<F>))
        .route("/health", get(get_health))
}

/// The AP2 merchant routes; the caller must be authenticated.
pub fn merchant_routes<F: FetchDocument + 'static>() -> Router<Arc<AppState<F>>> {
    Router::new()
        .route("/ap2/merchant/create_cart_mandate", post(post_create_cart_mandate::<F>))
        .route("/ap2/merchant/send_payment_mandate", post(post_send_payment_mandate::<F>))
}

/// `GET /.well-known/did.json`
#[instrument(skip_all)]
pub async fn get_did_document<F>(State(state): State<Arc<AppState<F>>>) -> impl IntoResponse {
    Json(state.identity.did_document())
}

/// `GET /ad.json`
#[instrument(skip_all)]
pub async fn get_agent_description<F>(State(state): State<Arc<AppState<F>>>) -> impl IntoResponse {
    Json(state.identity.agent_description())
}

/// `GET /health`
pub async fn get_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `POST /ap2/merchant/create_cart_mandate`
///
/// Assembles a cart from the request, signs a mandate addressed to the
/// caller, and remembers the cart hash for the payment phase.
#[instrument(skip_all)]
pub async fn post_create_cart_mandate<F>(
    State(state): State<Arc<AppState<F>>>,
    Extension(CallerDid(caller)): Extension<CallerDid>,
    Json(request): Json<DidMessage<CreateCartMandateRequest>>,
) -> Response {
    if request.from != caller {
        return problem(StatusCode::FORBIDDEN, "envelope sender does not match the authenticated caller");
    }
    let total = match cart_total(&request.data.items) {
        Ok(total) => total,
        Err(reason) => return problem(StatusCode::BAD_REQUEST, &reason),
    };
    let contents = CartContents {
        id: request.data.cart_mandate_id.clone(),
        items: request.data.items.clone(),
        shipping: request.data.shipping_address.clone(),
        total,
        payment_request: None,
        extra: Default::default(),
    };
    let params = CartMandateParams::new(
        state.identity.did.clone(),
        state.identity.verification_method(),
        caller,
    );
    match build_cart_mandate(contents, &params, &state.identity.jws_signer()) {
        Ok(mandate) => {
            match content_hash(&mandate.contents) {
                Ok(cart_hash) => {
                    state.issued_carts.insert(mandate.contents.id.clone(), cart_hash);
                }
                Err(error) => return problem(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string()),
            }
            Json(request.reply(mandate)).into_response()
        }
        Err(error) => problem(StatusCode::BAD_REQUEST, &error.to_string()),
    }
}

/// `POST /ap2/merchant/send_payment_mandate`
///
/// Verifies the caller's payment mandate against the cart hash this
/// merchant issued and the caller's resolved signing key.
#[instrument(skip_all)]
pub async fn post_send_payment_mandate<F: FetchDocument>(
    State(state): State<Arc<AppState<F>>>,
    Extension(CallerDid(caller)): Extension<CallerDid>,
    Json(request): Json<DidMessage<PaymentMandate>>,
) -> Response {
    if request.from != caller {
        return problem(StatusCode::FORBIDDEN, "envelope sender does not match the authenticated caller");
    }
    let mandate = &request.data;
    let Some(details_id) = mandate.payment_mandate_contents.payment_details_id.clone() else {
        return problem(StatusCode::BAD_REQUEST, "payment_details_id is required");
    };
    let Some(expected_cart_hash) = state
        .issued_carts
        .get(&details_id)
        .map(|entry| entry.value().clone())
    else {
        return problem(StatusCode::BAD_REQUEST, "unknown cart");
    };

    let Some(kid) = jws_kid(&mandate.user_authorization) else {
        return problem(StatusCode::BAD_REQUEST, "user_authorization has no kid");
    };
    let document = match state.resolver.resolve(&caller, &CancellationToken::new()).await {
        Ok(document) => document,
        Err(error) => return problem(StatusCode::BAD_GATEWAY, &error.to_string()),
    };
    let verifier = match public_key_for(&document, &kid) {
        Ok(PublicKey::Secp256k1(key)) => JwsVerifier::Es256k(key),
        Ok(other) => {
            return problem(
                StatusCode::BAD_REQUEST,
                &format!("verification method is {}, expected secp256k1 for ES256K", other.kind()),
            );
        }
        Err(error) => return problem(StatusCode::BAD_REQUEST, &error.to_string()),
    };

    match verify_payment_mandate(
        mandate,
        &verifier,
        &expected_cart_hash,
        Some(&state.identity.did),
        state.skew,
    ) {
        Ok(verified) => Json(request.reply(json!({
            "status": "accepted",
            "jti": verified.jti,
            "cartHash": verified.cart_hash,
            "pmtHash": verified.pmt_hash,
        })))
        .into_response(),
        Err(error) => problem(StatusCode::BAD_REQUEST, &error.to_string()),
    }
}

/// Sums the line items into a total, requiring one shared currency.
fn cart_total(items: &[PaymentItem]) -> Result<PaymentItem, String> {
    let first = items.first().ok_or_else(|| "cart has no items".to_string())?;
    let currency = first.amount.currency.clone();
    let mut value = 0.0;
    for item in items {
        if item.amount.currency != currency {
            return Err(format!(
                "mixed currencies in cart: {} and {}",
                currency, item.amount.currency
            ));
        }
        value += item.amount.value * item.quantity.unwrap_or(1) as f64;
    }
    Ok(PaymentItem {
        label: "Total".into(),
        amount: MoneyAmount { currency, value },
        quantity: None,
        sku: None,
    })
}

/// Pulls the `kid` out of a compact JWS header without verifying anything.
fn jws_kid(token: &str) -> Option<String> {
    let header_b64 = token.split('.').next()?;
    let header: serde_json::Value = serde_json::from_slice(&b64::decode(header_b64).ok()?).ok()?;
    header.get("kid")?.as_str().map(str::to_string)
}

fn problem(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}
