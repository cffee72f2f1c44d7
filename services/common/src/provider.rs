use std::{num::NonZeroUsize, path::Path, time::Duration};

use alloy::{
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
    transports::{
        RpcError, TransportError, TransportErrorKind,
        http::{Http, reqwest},
        layers::{FallbackLayer, RateLimitRetryPolicy, RetryBackoffLayer, RetryPolicy},
    },
};
use clap::Args;
use config::ConfigError;
use serde::Deserialize;
use thiserror::Error;
use tower::ServiceBuilder;
use url::Url;

mod defaults {
    pub const MAX_RETRIES: u32 = 3;
    pub const INITIAL_BACKOFF_MS: u64 = 500;
    pub const TIMEOUT_SECS: u64 = 8;

    pub const fn default_max_retries() -> u32 {
        MAX_RETRIES
    }
    pub const fn default_initial_backoff_ms() -> u64 {
        INITIAL_BACKOFF_MS
    }
    pub const fn default_timeout_secs() -> u64 {
        TIMEOUT_SECS
    }
}

/// No compute-unit budget: retries only wait for the backoff.
const COMPUTE_UNITS_PER_SECOND: u64 = u64::MAX;

#[derive(Args, Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries for a failed RPC read. 0 disables retries.
    #[arg(long = "rpc-max-retries", default_value_t = defaults::MAX_RETRIES, env = "RPC_MAX_RETRIES")]
    #[serde(default = "defaults::default_max_retries")]
    pub max_retries: u32,

    /// Delay in milliseconds before each retry, unless the node asks for longer.
    #[arg(long = "rpc-initial-backoff-ms", default_value_t = defaults::INITIAL_BACKOFF_MS, env = "RPC_INITIAL_BACKOFF_MS")]
    #[serde(default = "defaults::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Per-RPC request timeout in seconds.
    #[arg(long = "rpc-timeout-secs", default_value_t = defaults::TIMEOUT_SECS, env = "RPC_TIMEOUT_SECS")]
    #[serde(default = "defaults::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            initial_backoff_ms: defaults::INITIAL_BACKOFF_MS,
            timeout_secs: defaults::TIMEOUT_SECS,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no HTTP URLs provided")]
    NoHttpUrls,
    #[error("invalid RPC URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Read-only RPC access to the chain holding the creator hub.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[command(next_help_heading = "Rpc Configuration")]
pub struct ProviderArgs {
    /// HTTP RPC endpoints (in priority order).
    #[arg(long = "rpc-url", value_delimiter = ',', env = "RPC_URL")]
    #[serde(default)]
    pub http: Option<Vec<Url>>,

    #[command(flatten)]
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl ProviderArgs {
    /// Create a new provider configuration with default retry settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file, either from a `[provider]` table or the top level.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        Ok(settings
            .get::<Self>("provider")
            .or_else(|_| settings.try_deserialize::<Self>())?)
    }

    /// Add HTTP RPC endpoints after the ones already configured.
    pub fn with_http_urls(
        mut self,
        urls: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> ProviderResult<Self> {
        let parsed = urls
            .into_iter()
            .map(|u| Url::parse(u.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.http.get_or_insert_with(Vec::new).extend(parsed);
        Ok(self)
    }

    /// Set the maximum number of RPC retries. Set to 0 to disable retries.
    pub fn with_max_rpc_retries(mut self, max_retries: u32) -> Self {
        self.retry
            .get_or_insert_with(RetryConfig::default)
            .max_retries = max_retries;
        self
    }

    /// Build a read-only dynamic provider from the configuration.
    ///
    /// Endpoints are queried through a fallback layer; transient failures are
    /// retried after a fixed backoff or the delay the node asks for.
    pub fn http(self) -> ProviderResult<DynProvider> {
        let http = self.http.unwrap_or_default();
        let num_urls = NonZeroUsize::new(http.len()).ok_or(ProviderError::NoHttpUrls)?;

        let retry_cfg = self.retry.unwrap_or_default();

        // Hanging connections must surface as errors for the retry layer.
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_cfg.timeout_secs))
            .build()?;

        let transports = http
            .into_iter()
            .map(|url| Http::with_client(http_client.clone(), url))
            .collect::<Vec<_>>();

        let fallback_layer = FallbackLayer::default().with_active_transport_count(num_urls);
        let retry_layer = RetryBackoffLayer::new_with_policy(
            retry_cfg.max_retries,
            retry_cfg.initial_backoff_ms,
            COMPUTE_UNITS_PER_SECOND,
            retry_policy(),
        );

        let transport = ServiceBuilder::new()
            .layer(retry_layer)
            .layer(fallback_layer)
            .service(transports);
        let client = RpcClient::builder().transport(transport, false);

        Ok(ProviderBuilder::new().connect_client(client).erased())
    }
}

/// [`RateLimitRetryPolicy`] (429, 503, null responses, retryable JSON-RPC codes)
/// extended with transient transport failures.
fn retry_policy() -> impl RetryPolicy + Clone + 'static {
    RateLimitRetryPolicy::default().or(|error: &TransportError| match error {
        RpcError::Transport(TransportErrorKind::Custom(_)) => true,
        RpcError::Transport(TransportErrorKind::HttpError(e)) => {
            matches!(e.status, 408 | 502 | 504)
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn from_file_loads_fallback_endpoints_in_order() {
        let file = write_toml(
            r#"
            [provider]
            http = ["https://rpc1.example.com", "https://rpc2.example.com"]
        "#,
        );

        let args = ProviderArgs::from_file(file.path()).unwrap();
        let urls = args.http.unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "https://rpc1.example.com/");
        assert_eq!(urls[1].as_str(), "https://rpc2.example.com/");
        assert!(args.retry.is_none());
    }

    #[test]
    fn from_file_accepts_top_level_table() {
        let file = write_toml(r#"http = ["https://rpc.example.com"]"#);
        let args = ProviderArgs::from_file(file.path()).unwrap();
        assert_eq!(args.http.unwrap().len(), 1);
    }

    #[test]
    fn from_file_fills_missing_retry_fields_with_defaults() {
        let file = write_toml(
            r#"
            [provider]
            http = ["https://rpc.example.com"]

            [provider.retry]
            max_retries = 5
            timeout_secs = 2
        "#,
        );

        let retry = ProviderArgs::from_file(file.path()).unwrap().retry.unwrap();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.timeout_secs, 2);
        assert_eq!(
            retry.initial_backoff_ms,
            RetryConfig::default().initial_backoff_ms
        );
    }

    fn http_error(status: u16) -> TransportError {
        TransportErrorKind::http_error(status, String::new())
    }

    #[test]
    fn transient_gateway_errors_are_retried() {
        let policy = retry_policy();
        for status in [408, 429, 502, 503, 504] {
            assert!(policy.should_retry(&http_error(status)), "status {status}");
        }
        assert!(policy.should_retry(&TransportErrorKind::custom_str("connection reset")));
    }

    #[test]
    fn client_errors_are_not_retried() {
        let policy = retry_policy();
        for status in [400, 401, 404, 500] {
            assert!(!policy.should_retry(&http_error(status)), "status {status}");
        }
    }

    #[test]
    fn builder_rejects_bad_urls() {
        let err = ProviderArgs::new().with_http_urls(["not a url"]).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidUrl(_)));
    }

    #[test]
    fn http_without_endpoints_fails() {
        assert!(matches!(
            ProviderArgs::new().http(),
            Err(ProviderError::NoHttpUrls)
        ));

        let empty = ProviderArgs {
            http: Some(vec![]),
            retry: None,
        };
        assert!(matches!(empty.http(), Err(ProviderError::NoHttpUrls)));
    }
}
