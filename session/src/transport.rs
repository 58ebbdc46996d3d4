//! HTTP transport seam.
//!
//! The session only needs two request shapes, so the transport is a small
//! async trait that tests replace with a scripted double.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::TransportError;

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A completed HTTP exchange. Any status code counts as completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `GET url?query`. Query values are URL-encoded by the transport.
    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;

    /// `POST url` with a JSON body.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.http_client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        self.execute(request, timeout).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.execute(self.http_client.post(url).json(body), timeout)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_2xx() {
        assert!(HttpResponse::new(204, Vec::new()).is_success());
        assert!(!HttpResponse::new(413, Vec::new()).is_success());
        assert!(!HttpResponse::new(302, Vec::new()).is_success());
    }

    #[test]
    fn decodes_json_body() {
        let response = HttpResponse::new(200, br#"["chess","go"]"#.to_vec());
        let games: Vec<String> = response.json().unwrap();
        assert_eq!(games, vec!["chess", "go"]);
        assert!(response.json::<u32>().is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_classified() {
        let transport = ReqwestTransport::new();
        // Port 9 (discard) on loopback is closed in test environments.
        let result = transport
            .get("http://127.0.0.1:9/health", &[], Duration::from_secs(2))
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Connect(_)) | Err(TransportError::Timeout(_))
        ));
    }
}
