//! End-to-end AP2 flow over real HTTP: a shopper agent authenticates with
//! `DIDWba`, receives a bearer token, obtains a signed cart mandate, and
//! pays with a chained payment mandate.

use async_trait::async_trait;
use axum::Router;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use url::Url;

use anp_ap2::types::{CartMandate, PaymentMandateContents};
use anp_ap2::wire::CreateCartMandateRequest;
use anp_ap2::{PaymentMandateParams, build_payment_mandate, verify_cart_mandate};
use anp_axum::{AuthState, DidWbaLayer};
use anp_crypto::{KeyPair, codec};
use anp_identity::proof::jws::JwsSigner;
use anp_identity::resolver::{DidResolver, FetchDocument, ResolverConfig};
use anp_reqwest::DidWbaAuth;
use anp_rs::handlers::{AppState, merchant_routes, public_routes};
use anp_rs::identity::ephemeral_identity;
use anp_types::proto::DidMessage;

struct OneDoc {
    url: String,
    doc: serde_json::Value,
}

#[async_trait]
impl FetchDocument for OneDoc {
    async fn fetch(&self, url: &Url) -> Result<serde_json::Value, anp_identity::IdentityError> {
        if url.as_str() == self.url {
            Ok(self.doc.clone())
        } else {
            Err(anp_identity::IdentityError::HttpStatus(404))
        }
    }
}

fn did_document_for(did: &str, key: &KeyPair) -> serde_json::Value {
    json!({
        "@context": ["https://www.w3.org/ns/did/v1"],
        "id": did,
        "verificationMethod": [{
            "id": format!("{did}#key-1"),
            "type": "EcdsaSecp256k1VerificationKey2019",
            "controller": did,
            "publicKeyMultibase": codec::public_key_to_multibase(&key.public())
        }],
        "authentication": [format!("{did}#key-1")]
    })
}

#[tokio::test]
async fn shopper_buys_coffee_end_to_end() {
    // Shopper identity, resolvable by the merchant through the fetch seam.
    let shopper_key = Arc::new(KeyPair::generate(anp_crypto::KeyKind::Secp256k1));
    let shopper_did: anp_types::did::Did = "did:wba:didhost.cc:shopper".parse().unwrap();
    let resolver = Arc::new(DidResolver::with_fetch(
        OneDoc {
            url: "https://didhost.cc/shopper/.well-known/did.json".into(),
            doc: did_document_for(shopper_did.as_str(), &shopper_key),
        },
        ResolverConfig::default(),
    ));

    // Merchant agent.
    let merchant = ephemeral_identity("merchant.example", "shop", "coffee-merchant");
    let merchant_did = merchant.did.clone();
    let merchant_verifier = merchant.jws_signer().verifier();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let authority = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    let auth_state = Arc::new(AuthState::new(
        Arc::clone(&resolver),
        JwsSigner::generate_es256k(),
        authority.clone(),
    ));
    let skew = auth_state.config.clock_skew;
    let app_state = Arc::new(AppState {
        identity: merchant,
        resolver: Arc::clone(&resolver),
        issued_carts: DashMap::new(),
        skew,
    });
    let app: Router = public_routes()
        .merge(merchant_routes().layer(DidWbaLayer::new(Arc::clone(&auth_state))))
        .with_state(app_state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(DidWbaAuth::new(
            shopper_did.clone(),
            Arc::clone(&shopper_key),
            format!("{shopper_did}#key-1"),
        ))
        .build();
    let base = format!("http://{authority}");

    // Identity documents are public.
    let health = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(health.status(), 200);
    let doc = reqwest::get(format!("{base}/.well-known/did.json"))
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(doc["id"], merchant_did.as_str());

    // Phase 1: create a cart mandate (authenticated with DIDWba).
    let cart_request = DidMessage::new(
        shopper_did.clone(),
        merchant_did.clone(),
        CreateCartMandateRequest {
            cart_mandate_id: "cart_1".into(),
            items: vec![serde_json::from_value(json!({
                "label": "coffee beans",
                "amount": {"currency": "CNY", "value": 60.0},
                "quantity": 2
            }))
            .unwrap()],
            shipping_address: None,
            remark: Some("grind fine".into()),
        },
    );
    let response = client
        .post(format!("{base}/ap2/merchant/create_cart_mandate"))
        .json(&cart_request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let envelope: DidMessage<CartMandate> = response.json().await.unwrap();
    assert_eq!(envelope.from, merchant_did);
    assert_eq!(envelope.data.contents.total.amount.value, 120.0);

    // The shopper verifies the mandate before paying.
    let verified_cart = verify_cart_mandate(
        &envelope.data,
        &merchant_verifier,
        Some(&shopper_did),
        chrono::Duration::seconds(300),
    )
    .unwrap();

    // Phase 2: pay. The middleware now holds a bearer token.
    let contents: PaymentMandateContents = serde_json::from_value(json!({
        "payment_mandate_id": "pmt_1",
        "payment_details_id": "cart_1",
        "payment_details_total": envelope.data.contents.total,
    }))
    .unwrap();
    let shopper_signer = match shopper_key.as_ref() {
        KeyPair::Secp256k1(secret) => JwsSigner::Es256k(secret.clone()),
        _ => unreachable!(),
    };
    let payment = build_payment_mandate(
        contents,
        &PaymentMandateParams::new(
            shopper_did.clone(),
            format!("{shopper_did}#key-1"),
            merchant_did.clone(),
            verified_cart.cart_hash.clone(),
        ),
        &shopper_signer,
    )
    .unwrap();
    let response = client
        .post(format!("{base}/ap2/merchant/send_payment_mandate"))
        .json(&DidMessage::new(
            shopper_did.clone(),
            merchant_did.clone(),
            payment,
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let receipt: DidMessage<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(receipt.data["status"], "accepted");
    assert_eq!(receipt.data["cartHash"], verified_cart.cart_hash);

    // Only the first request spent a nonce; the second rode the bearer.
    assert_eq!(auth_state.nonce_window.len(), 1);
}
