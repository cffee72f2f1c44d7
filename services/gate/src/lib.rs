//! The OnlyStars access gate.
//!
//! Issues scoped one-time nonces, verifies signed challenge messages and
//! answers access questions from the creator hub.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
use dotenvy as _;
use tracing_subscriber as _;

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use tokio::sync::oneshot;

use crate::{
    nonce::NonceService,
    rate_limit::RateLimiter,
    routes::build_router,
    types::AppState,
    verifier::ProofVerifier,
};

pub use crate::{
    config::{GateConfig, GateSettings},
    error::{GateError, GateResult},
    ledger::{CreatorLedger, LedgerError, OnchainLedger},
    storage::KvStore,
    verifier::{ContractAwareVerifier, MessageVerifier, PersonalSignVerifier},
};
pub use onlystars_services_common::ProviderArgs;

mod api_error;
mod config;
mod error;
mod ledger;
pub mod metrics;
pub mod nonce;
mod rate_limit;
mod routes;
pub mod storage;
mod types;
mod verifier;

/// External collaborators of the gate.
#[derive(Clone)]
pub struct GateServices {
    pub kv: KvStore,
    pub ledger: Arc<dyn CreatorLedger>,
    pub message_verifier: Arc<dyn MessageVerifier>,
}

impl GateServices {
    /// Builds the RPC provider, the on-chain ledger, the signature verifier
    /// and the KV store described by `cfg`.
    pub async fn from_config(cfg: &GateConfig) -> GateResult<Self> {
        let provider = cfg.provider.clone().http()?;
        let timeout = cfg.upstream_timeout();

        let ledger = Arc::new(OnchainLedger::new(
            cfg.creator_hub_address,
            provider.clone(),
            timeout,
        ));
        let message_verifier: Arc<dyn MessageVerifier> = if cfg.contract_signatures {
            tracing::info!("ERC-1271 contract wallet signatures enabled");
            Arc::new(ContractAwareVerifier::new(provider, timeout))
        } else {
            Arc::new(PersonalSignVerifier)
        };
        let kv = KvStore::connect(cfg.redis_url.as_deref(), timeout).await;

        Ok(Self {
            kv,
            ledger,
            message_verifier,
        })
    }
}

/// Assembles the HTTP app.
pub fn build_app(settings: &GateSettings, services: GateServices) -> Router {
    let nonces = NonceService::new(services.kv.clone(), settings.nonce_ttl);
    let state = AppState {
        verifier: ProofVerifier::new(nonces.clone(), services.message_verifier),
        rate_limiter: RateLimiter::new(
            services.kv,
            settings.rate_limit_window,
            settings.rate_limit_max_requests,
        ),
        nonces,
        ledger: services.ledger,
        trust_proxy_headers: settings.trust_proxy_headers,
    };
    build_router(state, settings.request_timeout_secs)
}

#[derive(Debug)]
pub struct GateHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<GateResult<()>>,
    pub listen_addr: SocketAddr,
}

impl GateHandle {
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(res) => Ok(res?),
            Err(e) => Err(anyhow::anyhow!(format!("join error: {e}"))),
        }
    }
}

/// Binds `listen_addr` and serves the gate in a background task.
pub async fn spawn_gate(
    listen_addr: SocketAddr,
    settings: &GateSettings,
    services: GateServices,
) -> GateResult<GateHandle> {
    let app = build_app(settings, services);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|source| GateError::Bind {
            addr: listen_addr,
            source,
        })?;
    let addr = listener.local_addr().map_err(GateError::Serve)?;

    let (tx, rx) = oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = rx.await;
    });
    let join = tokio::spawn(async move { server.await.map_err(GateError::Serve) });

    Ok(GateHandle {
        shutdown: Some(tx),
        join,
        listen_addr: addr,
    })
}

/// For tests only: spawn the gate with collaborators built from `cfg`.
pub async fn spawn_gate_for_tests(cfg: GateConfig) -> anyhow::Result<GateHandle> {
    let services = GateServices::from_config(&cfg).await?;
    Ok(spawn_gate(cfg.listen_addr, &cfg.settings(), services).await?)
}

/// Run to completion using CLI flags and env vars (bin-compatible).
pub async fn run() -> anyhow::Result<()> {
    let cfg = GateConfig::from_env()?;
    let services = GateServices::from_config(&cfg).await?;

    tracing::info!("Config is ready. Building app...");
    let app = build_app(&cfg.settings(), services);
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    tracing::info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;
    Ok(())
}
