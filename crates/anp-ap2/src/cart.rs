//! CartMandate construction and verification.

use serde_json::{Value, json};
use uuid::Uuid;

use anp_identity::proof::jws::{self, ClaimPolicy, JwsSigner, JwsVerifier};
use anp_types::UtcTimestamp;
use anp_types::did::Did;

use crate::content_hash;
use crate::error::Ap2Error;
use crate::types::{CartContents, CartMandate};

/// Default cart mandate lifetime: 15 minutes.
pub const DEFAULT_CART_TTL_SECS: i64 = 900;

/// Signing parameters for a cart mandate.
#[derive(Debug, Clone)]
pub struct CartMandateParams {
    pub merchant_did: Did,
    /// `kid` naming the merchant's verification method.
    pub merchant_kid: String,
    /// The shopper the mandate is addressed to (`aud`).
    pub shopper_did: Did,
    pub ttl_secs: i64,
    /// Optional confirmation-key claim, carried in the envelope only.
    pub cnf: Option<Value>,
    /// Optional selective-disclosure hash, carried in the envelope only.
    pub sd_hash: Option<String>,
}

impl CartMandateParams {
    pub fn new(merchant_did: Did, merchant_kid: impl Into<String>, shopper_did: Did) -> Self {
        Self {
            merchant_did,
            merchant_kid: merchant_kid.into(),
            shopper_did,
            ttl_secs: DEFAULT_CART_TTL_SECS,
            cnf: None,
            sd_hash: None,
        }
    }
}

/// Claims established by a successful cart mandate verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCart {
    pub merchant: Did,
    pub cart_hash: String,
    pub jti: String,
}

/// Builds a merchant-signed cart mandate.
///
/// `cart_hash` commits to the JCS form of `contents`; `cnf` and `sd_hash`
/// ride in the JWS envelope without entering the hash chain.
#[tracing::instrument(skip_all, fields(cart = %contents.id))]
pub fn build_cart_mandate(
    contents: CartContents,
    params: &CartMandateParams,
    signer: &JwsSigner,
) -> Result<CartMandate, Ap2Error> {
    contents.validate()?;
    let cart_hash = content_hash(&contents)?;
    let now = UtcTimestamp::now();
    let mut claims = json!({
        "iss": params.merchant_did,
        "sub": params.merchant_did,
        "aud": params.shopper_did,
        "iat": now.unix(),
        "exp": now.unix() + params.ttl_secs,
        "jti": Uuid::new_v4().to_string(),
        "cart_hash": cart_hash,
    });
    if let Some(cnf) = &params.cnf {
        claims["cnf"] = cnf.clone();
    }
    if let Some(sd_hash) = &params.sd_hash {
        claims["sd_hash"] = Value::String(sd_hash.clone());
    }
    let merchant_authorization = jws::sign(&claims, Some(&params.merchant_kid), signer)?;
    Ok(CartMandate {
        contents,
        merchant_authorization,
        timestamp: now,
    })
}

/// Verifies a cart mandate against the merchant's key.
///
/// Checks the JWS envelope (signature, algorithm/key consistency, time
/// window, optional audience), then recomputes the cart hash from the
/// contents and compares it to the claim.
#[tracing::instrument(skip_all, fields(cart = %mandate.contents.id))]
pub fn verify_cart_mandate(
    mandate: &CartMandate,
    merchant_key: &JwsVerifier,
    expected_audience: Option<&Did>,
    skew: chrono::Duration,
) -> Result<VerifiedCart, Ap2Error> {
    mandate.contents.validate()?;
    let decoded = jws::verify(&mandate.merchant_authorization, merchant_key)?;
    let mut policy = ClaimPolicy::new(UtcTimestamp::now(), skew);
    if let Some(audience) = expected_audience {
        policy = policy.with_audience(audience.as_str());
    }
    jws::validate_claims(&decoded.claims, &policy)?;

    let recomputed = content_hash(&mandate.contents)?;
    let claimed = decoded
        .claims
        .get("cart_hash")
        .and_then(Value::as_str)
        .ok_or_else(|| Ap2Error::PayloadSchemaInvalid("missing cart_hash claim".into()))?;
    if claimed != recomputed {
        return Err(Ap2Error::CartHashMismatch);
    }

    let merchant = claim_did(&decoded.claims, "iss")?;
    let jti = decoded
        .claims
        .get("jti")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(VerifiedCart {
        merchant,
        cart_hash: recomputed,
        jti,
    })
}

pub(crate) fn claim_did(claims: &Value, name: &str) -> Result<Did, Ap2Error> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Ap2Error::PayloadSchemaInvalid(format!("missing {name} claim")))
        .and_then(|raw| {
            Did::new(raw).map_err(|error| Ap2Error::PayloadSchemaInvalid(error.to_string()))
        })
}
