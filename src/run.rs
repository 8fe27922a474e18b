//! Server assembly and runtime.

use axum::Router;
use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors;
use tower_http::trace::TraceLayer;

use anp_axum::{AuthState, DidWbaLayer};
use anp_identity::proof::jws::JwsSigner;
use anp_identity::{DidResolver, ResolverConfig};

use crate::config::Config;
use crate::handlers::{AppState, merchant_routes, public_routes};
use crate::identity::AgentIdentity;
use crate::telemetry;

/// Starts the agent node.
///
/// - loads `.env` and CLI / environment configuration,
/// - loads or generates the agent's key material,
/// - assembles the router (public identity documents, authenticated AP2
///   merchant endpoints),
/// - serves until SIGTERM / SIGINT.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    telemetry::init();

    let config = Config::load();
    let identity = AgentIdentity::load_or_generate(&config)?;
    tracing::info!(did = %identity.did, "agent identity ready");

    let resolver = Arc::new(DidResolver::new(ResolverConfig::default()));
    // The bearer-token key is process-local; restarting invalidates
    // outstanding bearers, which the DIDWba fallback absorbs.
    let token_signer = JwsSigner::generate_rs256()?;
    let auth_state = Arc::new(AuthState::new(
        Arc::clone(&resolver),
        token_signer,
        identity.service_authority.clone(),
    ));
    let skew = auth_state.config.clock_skew;
    let app_state = Arc::new(AppState {
        identity,
        resolver,
        issued_carts: Default::default(),
        skew,
    });

    let app: Router = public_routes()
        .merge(merchant_routes().layer(DidWbaLayer::new(auth_state)))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_origin(cors::Any),
        );

    // Register signal handlers before accepting traffic; the resulting
    // future is handed straight to axum's graceful shutdown.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("SIGTERM received, draining"),
            _ = sigint.recv() => tracing::info!("SIGINT received, draining"),
        }
    };

    let address = SocketAddr::from((config.host, config.port));
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(%address, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("shut down cleanly");
    Ok(())
}
