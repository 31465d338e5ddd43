//! HTTP side of WHEP: POST the offer, read the answer, DELETE on teardown.

use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, LOCATION};
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Outcome of an SDP POST that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingResponse {
    pub status: u16,
    /// WHEP resource URL from the `Location` header, made absolute.
    pub location: Option<String>,
    pub body: String,
}

impl SignalingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POSTs `sdp` as `application/sdp`. Only transport-level failures are
    /// errors; any HTTP status comes back as a response.
    async fn post_sdp(&self, url: &str, sdp: &str, token: Option<&str>)
        -> Result<SignalingResponse>;

    /// Tears down the WHEP resource. Returns the HTTP status.
    async fn delete(&self, url: &str, token: Option<&str>) -> Result<u16>;
}

/// `HttpClient` over reqwest with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

fn with_token(req: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => req.header(AUTHORIZATION, format!("Bearer {}", token)),
        None => req,
    }
}

/// Resolves a `Location` value against the URL the request went to.
pub fn resolve_location(base: &Url, location: &str) -> Option<String> {
    base.join(location).ok().map(|u| u.to_string())
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_sdp(
        &self,
        url: &str,
        sdp: &str,
        token: Option<&str>,
    ) -> Result<SignalingResponse> {
        debug!(%url, bytes = sdp.len(), "POST offer");

        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(sdp.to_owned());
        let response = with_token(req, token).send().await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| resolve_location(response.url(), loc));
        let body = response.text().await?;

        Ok(SignalingResponse {
            status,
            location,
            body,
        })
    }

    async fn delete(&self, url: &str, token: Option<&str>) -> Result<u16> {
        debug!(%url, "DELETE session");
        let response = with_token(self.client.delete(url), token).send().await?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_any_2xx() {
        let mut resp = SignalingResponse {
            status: 201,
            location: None,
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 299;
        assert!(resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
        resp.status = 199;
        assert!(!resp.is_success());
    }

    #[test]
    fn relative_location_uses_endpoint_origin() {
        let base = Url::parse("https://edge.example/whep/room1").unwrap();
        assert_eq!(
            resolve_location(&base, "/whep/resource/abc").as_deref(),
            Some("https://edge.example/whep/resource/abc")
        );
        assert_eq!(
            resolve_location(&base, "https://other.example/r/1").as_deref(),
            Some("https://other.example/r/1")
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let client = ReqwestClient::new(Duration::from_secs(1)).unwrap();
        let err = client
            .post_sdp("not a url", "v=0\r\n", None)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Network(_)));
    }
}
