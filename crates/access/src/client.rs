use std::sync::Arc;

use async_trait::async_trait;
use onlystars_core::types::{
    CheckQuery, CheckResponse, GateErrorBody, GateErrorCode, GateRequest, GateResponse,
    NonceRequest, NonceResponse,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

/// Errors returned by the gate HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum GateClientError {
    /// Network/HTTP request error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The gate refused to issue another nonce yet.
    #[error("Rate limited by the gate")]
    RateLimited,

    /// Gate returned an error response.
    #[error("Gate error (status {status}): {error}")]
    Gate {
        /// HTTP status code
        status: StatusCode,
        /// Machine-readable code, when the body could be parsed
        code: Option<GateErrorCode>,
        /// Response body or its `error` field
        error: String,
    },
}

/// The three gate operations a resolver needs.
#[async_trait]
pub trait GateApi: Send + Sync {
    /// `POST /gate/nonce`
    async fn request_nonce(&self, request: &NonceRequest)
        -> Result<NonceResponse, GateClientError>;

    /// `POST /gate`
    async fn submit_proof(&self, request: &GateRequest) -> Result<GateResponse, GateClientError>;

    /// `GET /gate`
    async fn cheap_check(&self, query: &CheckQuery) -> Result<CheckResponse, GateClientError>;
}

#[async_trait]
impl<T: GateApi + ?Sized> GateApi for Arc<T> {
    async fn request_nonce(
        &self,
        request: &NonceRequest,
    ) -> Result<NonceResponse, GateClientError> {
        (**self).request_nonce(request).await
    }

    async fn submit_proof(&self, request: &GateRequest) -> Result<GateResponse, GateClientError> {
        (**self).submit_proof(request).await
    }

    async fn cheap_check(&self, query: &CheckQuery) -> Result<CheckResponse, GateClientError> {
        (**self).cheap_check(query).await
    }
}

/// [`GateApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct GateClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GateClient {
    /// Client for the gate served at `base_url`, e.g. `https://gate.example.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, GateClientError> {
        let resp = request.send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GateClientError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<GateErrorBody>(&body) {
                Ok(parsed) => GateClientError::Gate {
                    status,
                    code: Some(parsed.code),
                    error: parsed.error,
                },
                Err(_) => GateClientError::Gate {
                    status,
                    code: None,
                    error: body,
                },
            });
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl GateApi for GateClient {
    async fn request_nonce(
        &self,
        request: &NonceRequest,
    ) -> Result<NonceResponse, GateClientError> {
        Self::send(self.http_client.post(self.url("/gate/nonce")).json(request)).await
    }

    async fn submit_proof(&self, request: &GateRequest) -> Result<GateResponse, GateClientError> {
        Self::send(self.http_client.post(self.url("/gate")).json(request)).await
    }

    async fn cheap_check(&self, query: &CheckQuery) -> Result<CheckResponse, GateClientError> {
        Self::send(self.http_client.get(self.url("/gate")).query(query)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use onlystars_core::{GateMode, PostId};

    const ACCOUNT: alloy::primitives::Address =
        address!("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb0");

    #[tokio::test]
    async fn test_request_nonce() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/gate/nonce")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::JsonString(
                serde_json::json!({
                    "account": ACCOUNT,
                    "mode": "post",
                    "postId": "5"
                })
                .to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "ok": true,
                    "nonce": "00112233445566778899aabbccddeeff",
                    "expiresInSeconds": 600,
                    "scoped": true
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GateClient::new(format!("{}/", server.url()));
        let resp = client
            .request_nonce(&NonceRequest {
                account: ACCOUNT,
                mode: Some(GateMode::Post),
                post_id: Some(PostId::from(5)),
                creator_address: None,
            })
            .await
            .unwrap();

        assert_eq!(resp.nonce, "00112233445566778899aabbccddeeff");
        assert_eq!(resp.expires_in_seconds, 600);
        assert!(resp.scoped);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_nonce() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/gate/nonce")
            .with_status(429)
            .with_body(r#"{"ok":false,"error":"Slow down","code":"rate_limited"}"#)
            .create_async()
            .await;

        let client = GateClient::new(server.url());
        let err = client
            .request_nonce(&NonceRequest {
                account: ACCOUNT,
                mode: None,
                post_id: None,
                creator_address: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GateClientError::RateLimited));
    }

    #[tokio::test]
    async fn test_cheap_check_query_and_errors() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("GET", "/gate")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("account".into(), ACCOUNT.to_string()),
                mockito::Matcher::UrlEncoded("postId".into(), "12".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"subActive":null,"hasAccess":true}"#)
            .create_async()
            .await;

        let client = GateClient::new(server.url());
        let query = CheckQuery {
            account: ACCOUNT,
            creator_address: None,
            post_id: Some(PostId::from(12)),
        };
        let resp = client.cheap_check(&query).await.unwrap();
        assert_eq!(resp.has_access, Some(true));
        assert_eq!(resp.sub_active, None);
        ok.assert_async().await;
        ok.remove_async().await;

        let _unavailable = server
            .mock("GET", "/gate")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .with_body(
                r#"{"ok":false,"error":"Creator hub is unavailable.","code":"ledger_unavailable"}"#,
            )
            .create_async()
            .await;
        let err = client.cheap_check(&query).await.unwrap_err();
        match err {
            GateClientError::Gate { status, code, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(code, Some(GateErrorCode::LedgerUnavailable));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
