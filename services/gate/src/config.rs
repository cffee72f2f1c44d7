use std::{net::SocketAddr, time::Duration};

use alloy::primitives::Address;
use clap::Parser;
use onlystars_services_common::ProviderArgs;

use crate::error::{GateError, GateResult};

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct GateConfig {
    /// The address of the creator hub contract
    #[arg(long, env = "CREATOR_HUB_ADDRESS")]
    pub creator_hub_address: Address,

    /// Read-only RPC access to the chain of the creator hub
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// The address and port to listen for HTTP requests
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Redis URL for nonces and rate limits (e.g. redis://localhost:6379).
    /// Falls back to in-process storage when absent.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Lifetime of issued nonces in seconds
    #[arg(long, env = "NONCE_TTL_SECS", default_value = "600")]
    pub nonce_ttl_secs: u64,

    /// Nonce rate limit window in seconds
    #[arg(long, env = "NONCE_RATE_LIMIT_WINDOW_SECS", default_value = "5")]
    pub nonce_rate_limit_window_secs: u64,

    /// Nonce requests allowed per IP and account within the window
    #[arg(long, env = "NONCE_RATE_LIMIT_MAX_REQUESTS", default_value = "1")]
    pub nonce_rate_limit_max_requests: u64,

    /// Timeout in seconds for each key-value store and ledger call
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "8")]
    pub upstream_timeout_secs: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "15")]
    pub request_timeout_secs: u64,

    /// Accept ERC-1271 contract wallet signatures
    #[arg(long, env = "CONTRACT_SIGNATURES", default_value_t = false)]
    pub contract_signatures: bool,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`. Only enable
    /// behind a reverse proxy that overwrites these headers.
    #[arg(long, env = "TRUST_PROXY_HEADERS", default_value_t = false)]
    pub trust_proxy_headers: bool,
}

/// Runtime knobs of the HTTP app, independent of how collaborators are built.
#[derive(Clone, Debug)]
pub struct GateSettings {
    pub nonce_ttl: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u64,
    pub request_timeout_secs: u64,
    pub trust_proxy_headers: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            nonce_ttl: Duration::from_secs(600),
            rate_limit_window: Duration::from_secs(5),
            rate_limit_max_requests: 1,
            request_timeout_secs: 15,
            trust_proxy_headers: false,
        }
    }
}

impl GateConfig {
    pub fn from_env() -> GateResult<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GateResult<()> {
        let positive = [
            ("--nonce-ttl-secs", self.nonce_ttl_secs),
            (
                "--nonce-rate-limit-window-secs",
                self.nonce_rate_limit_window_secs,
            ),
            (
                "--nonce-rate-limit-max-requests",
                self.nonce_rate_limit_max_requests,
            ),
            ("--upstream-timeout-secs", self.upstream_timeout_secs),
            ("--request-timeout-secs", self.request_timeout_secs),
        ];
        if let Some((flag, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(GateError::Config(format!("{flag} must be greater than 0")));
        }

        if self.provider.http.as_ref().is_none_or(Vec::is_empty) {
            return Err(GateError::Config("--rpc-url must be provided".to_string()));
        }

        if self.redis_url.is_none() {
            tracing::warn!(
                "No --redis-url configured, nonces and rate limits are kept in memory and not shared across replicas"
            );
        }

        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn settings(&self) -> GateSettings {
        GateSettings {
            nonce_ttl: Duration::from_secs(self.nonce_ttl_secs),
            rate_limit_window: Duration::from_secs(self.nonce_rate_limit_window_secs),
            rate_limit_max_requests: self.nonce_rate_limit_max_requests,
            request_timeout_secs: self.request_timeout_secs,
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}
