//! PaymentMandate construction and verification.

use serde_json::{Value, json};
use uuid::Uuid;

use anp_identity::proof::jws::{self, ClaimPolicy, JwsSigner, JwsVerifier};
use anp_types::UtcTimestamp;
use anp_types::did::Did;

use crate::cart::claim_did;
use crate::content_hash;
use crate::error::Ap2Error;
use crate::types::{PaymentMandate, PaymentMandateContents};

/// Default payment mandate lifetime: 180 days.
pub const DEFAULT_PAYMENT_TTL_SECS: i64 = 180 * 24 * 3600;

/// Signing parameters for a payment mandate.
#[derive(Debug, Clone)]
pub struct PaymentMandateParams {
    pub user_did: Did,
    /// `kid` naming the user's verification method.
    pub user_kid: String,
    /// The merchant the mandate is addressed to (`aud`).
    pub merchant_did: Did,
    /// `cart_hash` from the verified cart mandate this payment chains to.
    pub cart_hash: String,
    pub ttl_secs: i64,
    pub cnf: Option<Value>,
    pub sd_hash: Option<String>,
}

impl PaymentMandateParams {
    pub fn new(
        user_did: Did,
        user_kid: impl Into<String>,
        merchant_did: Did,
        cart_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_did,
            user_kid: user_kid.into(),
            merchant_did,
            cart_hash: cart_hash.into(),
            ttl_secs: DEFAULT_PAYMENT_TTL_SECS,
            cnf: None,
            sd_hash: None,
        }
    }
}

/// Claims established by a successful payment mandate verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub user: Did,
    pub cart_hash: String,
    pub pmt_hash: String,
    pub jti: String,
}

/// Builds a user-signed payment mandate chained to a verified cart.
///
/// The cart hash is stamped into `contents.prev_hash` before hashing, so the
/// chain marker itself is under the user's signature, and the claims carry
/// `transaction_data: [cart_hash, pmt_hash]`.
#[tracing::instrument(skip_all, fields(payment = %contents.payment_mandate_id))]
pub fn build_payment_mandate(
    mut contents: PaymentMandateContents,
    params: &PaymentMandateParams,
    signer: &JwsSigner,
) -> Result<PaymentMandate, Ap2Error> {
    contents.prev_hash = Some(params.cart_hash.clone());
    contents.validate()?;
    let pmt_hash = content_hash(&contents)?;
    let now = UtcTimestamp::now();
    let mut claims = json!({
        "iss": params.user_did,
        "sub": params.user_did,
        "aud": params.merchant_did,
        "iat": now.unix(),
        "exp": now.unix() + params.ttl_secs,
        "jti": Uuid::new_v4().to_string(),
        "transaction_data": [params.cart_hash, pmt_hash],
    });
    if let Some(cnf) = &params.cnf {
        claims["cnf"] = cnf.clone();
    }
    if let Some(sd_hash) = &params.sd_hash {
        claims["sd_hash"] = Value::String(sd_hash.clone());
    }
    let user_authorization = jws::sign(&claims, Some(&params.user_kid), signer)?;
    Ok(PaymentMandate {
        payment_mandate_contents: contents,
        user_authorization,
    })
}

/// Verifies a payment mandate against the user's key and the expected cart
/// hash.
///
/// `transaction_data` must equal exactly
/// `[expected_cart_hash, hash(contents)]`; the two mismatches carry distinct
/// kinds so a broken chain is distinguishable from tampered contents.
#[tracing::instrument(skip_all, fields(payment = %mandate.payment_mandate_contents.payment_mandate_id))]
pub fn verify_payment_mandate(
    mandate: &PaymentMandate,
    user_key: &JwsVerifier,
    expected_cart_hash: &str,
    expected_audience: Option<&Did>,
    skew: chrono::Duration,
) -> Result<VerifiedPayment, Ap2Error> {
    mandate.payment_mandate_contents.validate()?;
    let decoded = jws::verify(&mandate.user_authorization, user_key)?;
    let mut policy = ClaimPolicy::new(UtcTimestamp::now(), skew);
    if let Some(audience) = expected_audience {
        policy = policy.with_audience(audience.as_str());
    }
    jws::validate_claims(&decoded.claims, &policy)?;

    let transaction_data = decoded
        .claims
        .get("transaction_data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Ap2Error::TransactionDataMalformed("missing transaction_data claim".into())
        })?;
    let [cart_claim, pmt_claim] = transaction_data.as_slice() else {
        return Err(Ap2Error::TransactionDataMalformed(format!(
            "expected 2 elements, got {}",
            transaction_data.len()
        )));
    };
    let (Some(cart_claim), Some(pmt_claim)) = (cart_claim.as_str(), pmt_claim.as_str()) else {
        return Err(Ap2Error::TransactionDataMalformed(
            "transaction_data elements must be strings".into(),
        ));
    };

    if cart_claim != expected_cart_hash {
        return Err(Ap2Error::CartHashMismatch);
    }
    let recomputed = content_hash(&mandate.payment_mandate_contents)?;
    if pmt_claim != recomputed {
        return Err(Ap2Error::PmtHashMismatch);
    }

    let user = claim_did(&decoded.claims, "iss")?;
    let jti = decoded
        .claims
        .get("jti")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok(VerifiedPayment {
        user,
        cart_hash: cart_claim.to_string(),
        pmt_hash: recomputed,
        jti,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartMandateParams, build_cart_mandate, verify_cart_mandate};
    use crate::types::CartContents;
    use serde_json::json;

    fn did(s: &str) -> Did {
        Did::new(s).unwrap()
    }

    fn payment_contents() -> PaymentMandateContents {
        serde_json::from_value(json!({
            "payment_mandate_id": "pmt_1",
            "payment_details_total": {
                "label": "Total",
                "amount": {"currency": "CNY", "value": 120.0}
            },
            "merchant_agent": "did:wba:didhost.cc:merchant"
        }))
        .unwrap()
    }

    fn params(cart_hash: &str) -> PaymentMandateParams {
        PaymentMandateParams::new(
            did("did:wba:didhost.cc:shopper"),
            "did:wba:didhost.cc:shopper#key-1",
            did("did:wba:didhost.cc:merchant"),
            cart_hash,
        )
    }

    #[test]
    fn build_verify_round_trip_with_chain() {
        let signer = JwsSigner::generate_es256k();
        let cart_hash = "hYco6djEBN6KPd0SDW1ZLrMgFY61pVSq0XSK2osI_GE";
        let mandate =
            build_payment_mandate(payment_contents(), &params(cart_hash), &signer).unwrap();
        assert_eq!(
            mandate.payment_mandate_contents.prev_hash.as_deref(),
            Some(cart_hash)
        );
        let verified = verify_payment_mandate(
            &mandate,
            &signer.verifier(),
            cart_hash,
            Some(&did("did:wba:didhost.cc:merchant")),
            chrono::Duration::seconds(300),
        )
        .unwrap();
        assert_eq!(verified.user, did("did:wba:didhost.cc:shopper"));
        assert_eq!(verified.cart_hash, cart_hash);
    }

    #[test]
    fn different_expected_cart_hash_is_cart_hash_mismatch() {
        let signer = JwsSigner::generate_es256k();
        let mandate = build_payment_mandate(payment_contents(), &params("hash-a"), &signer).unwrap();
        assert_eq!(
            verify_payment_mandate(
                &mandate,
                &signer.verifier(),
                "hash-b",
                None,
                chrono::Duration::seconds(300)
            ),
            Err(Ap2Error::CartHashMismatch)
        );
    }

    #[test]
    fn tampered_contents_is_pmt_hash_mismatch() {
        let signer = JwsSigner::generate_es256k();
        let mut mandate =
            build_payment_mandate(payment_contents(), &params("hash-a"), &signer).unwrap();
        mandate.payment_mandate_contents.merchant_agent = Some("did:wba:evil.example".into());
        assert_eq!(
            verify_payment_mandate(
                &mandate,
                &signer.verifier(),
                "hash-a",
                None,
                chrono::Duration::seconds(300)
            ),
            Err(Ap2Error::PmtHashMismatch)
        );
    }

    #[test]
    fn malformed_transaction_data_is_its_own_kind() {
        let signer = JwsSigner::generate_es256k();
        let now = UtcTimestamp::now().unix();
        let claims = json!({
            "iss": "did:wba:didhost.cc:shopper",
            "sub": "did:wba:didhost.cc:shopper",
            "aud": "did:wba:didhost.cc:merchant",
            "iat": now,
            "exp": now + 600,
            "jti": "x",
            "transaction_data": ["only-one"],
        });
        let mandate = PaymentMandate {
            payment_mandate_contents: payment_contents(),
            user_authorization: jws::sign(&claims, None, &signer).unwrap(),
        };
        assert!(matches!(
            verify_payment_mandate(
                &mandate,
                &signer.verifier(),
                "only-one",
                None,
                chrono::Duration::seconds(300)
            ),
            Err(Ap2Error::TransactionDataMalformed(_))
        ));
    }

    #[test]
    fn full_cart_to_payment_chain() {
        let merchant = JwsSigner::generate_es256k();
        let user = JwsSigner::generate_es256k();
        let cart: CartContents = serde_json::from_value(json!({
            "id": "cart_1",
            "total": {"label": "Total", "amount": {"currency": "CNY", "value": 120.0}}
        }))
        .unwrap();
        let cart_mandate = build_cart_mandate(
            cart,
            &CartMandateParams::new(
                did("did:wba:didhost.cc:merchant"),
                "did:wba:didhost.cc:merchant#key-1",
                did("did:wba:didhost.cc:shopper"),
            ),
            &merchant,
        )
        .unwrap();
        let verified_cart = verify_cart_mandate(
            &cart_mandate,
            &merchant.verifier(),
            Some(&did("did:wba:didhost.cc:shopper")),
            chrono::Duration::seconds(300),
        )
        .unwrap();

        let payment = build_payment_mandate(
            payment_contents(),
            &params(&verified_cart.cart_hash),
            &user,
        )
        .unwrap();
        let verified_payment = verify_payment_mandate(
            &payment,
            &user.verifier(),
            &verified_cart.cart_hash,
            Some(&did("did:wba:didhost.cc:merchant")),
            chrono::Duration::seconds(300),
        )
        .unwrap();
        assert_eq!(verified_payment.cart_hash, verified_cart.cart_hash);
    }
}
