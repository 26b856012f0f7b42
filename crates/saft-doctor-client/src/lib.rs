//! HTTP client for the SAFT Doctor backend.
//!
//! [`ApiClient`] holds the base URL and the bearer token of one session and
//! exposes generic JSON helpers plus the domain operations: chunked uploads
//! ([`Uploader`]), validation ([`ApiClient::validate`]), fix application,
//! document extraction, custom fix rules and the backend [`Heartbeat`].

pub mod api;
pub mod auth;
pub mod heartbeat;
pub mod uploader;
pub mod validation;

use reqwest::{Client, RequestBuilder, Response};
use saft_doctor_core::{backend_message, ClientConfig, ClientError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub use heartbeat::{Heartbeat, HeartbeatEvent};
pub use uploader::Uploader;
pub use validation::{SubmitTarget, ValidationSource};

/// HTTP client for one authenticated backend session.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(
            config.api_url.clone(),
            config.token.clone(),
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Attach the bearer token, or fail before anything touches the network.
    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
        request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    async fn read_text(response: Response) -> Result<(u16, String), ClientError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok((status, text))
    }

    /// Map a JSON endpoint response: non-2xx becomes [`ClientError::Api`] with
    /// the backend's message, a malformed 2xx body [`ClientError::InvalidResponse`].
    async fn json_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let (status, text) = Self::read_text(response).await?;
        if !(200..300).contains(&status) {
            return Err(ClientError::Api {
                status,
                message: backend_message(&text, "Unknown error"),
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            ClientError::InvalidResponse(format!("Failed to parse response as JSON: {}", e))
        })
    }

    /// Authenticated GET. Deserializes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut request = self.authed(self.client.get(self.build_url(path)))?;
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = Self::send(request).await?;
        Self::json_response(response).await
    }

    /// Authenticated POST with a JSON body. Deserializes the JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ClientError> {
        let mut request = self.authed(self.client.post(self.build_url(path)))?;
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = Self::send(request.json(body)).await?;
        Self::json_response(response).await
    }

    /// Raw client for custom requests. Caller must apply auth.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:8000/", None, None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.build_url("/pt/upload/start"),
            "http://localhost:8000/pt/upload/start"
        );
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn protected_call_without_token_never_hits_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/auth/me").expect(0).create_async().await;

        let client = ApiClient::new(server.url(), None, None).unwrap();
        let err = client.get_json::<Value>("/auth/me", &[]).await.unwrap_err();

        assert!(matches!(err, ClientError::NotAuthenticated));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/auth/me")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_body(r#"{"username":"dev"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Some("tok-123".to_string()), None).unwrap();
        let body: Value = client.get_json("/auth/me", &[]).await.unwrap();

        assert_eq!(body["username"], "dev");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_maps_to_api_error_with_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pt/fix-rules")
            .with_status(422)
            .with_body(r#"{"detail":"rule id already exists"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Some("t".to_string()), None).unwrap();
        let err = client
            .post_json::<Value, _>("/pt/fix-rules", &[], &serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "rule id already exists");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_success_body_is_invalid_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/me")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Some("t".to_string()), None).unwrap();
        let err = client.get_json::<Value>("/auth/me", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let client =
            ApiClient::new("http://127.0.0.1:9", Some("t".to_string()), None).unwrap();
        let err = client.get_json::<Value>("/auth/me", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
