use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

/// Sends one request and hands back the raw response body.
///
/// Non-2xx responses are not errors here: the service puts `{"error": ...}` in the body
/// and callers read it like any other reply. `Err` is reserved for the request itself
/// failing (connection refused, timeout, unreadable body).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<String>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<String> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        let builder = if let Some(body) = &request.body {
            builder.json(body)
        } else {
            builder
        };

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            debug!("{:?} {} answered {}", request.method, request.url, status);
        }
        Ok(text)
    }
}

/// Transport failures collapse into an empty body; the parsers downstream treat that
/// the same as a reply with no usable fields.
pub(crate) async fn fetch_text(transport: &dyn Transport, request: &ApiRequest) -> String {
    match transport.send(request).await {
        Ok(body) => body,
        Err(err) => {
            warn!("Request to {} failed: {:#}", request.url, err);
            String::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::ScriptedTransport;
    use super::*;

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let transport = ScriptedTransport::with_bodies(&[r#"{"status":"ok"}"#]);
        let body = fetch_text(&transport, &ApiRequest::get("http://svc/api/vms")).await;
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn fetch_text_degrades_failure_to_empty_body() {
        let transport = ScriptedTransport::new(&[None]);
        let body = fetch_text(&transport, &ApiRequest::get("http://svc/api/vms")).await;
        assert!(body.is_empty());
    }

    #[test]
    fn post_request_carries_payload() {
        let request = ApiRequest::post("http://svc/api/launch", json!({ "vmid": 7 }));
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.body, Some(json!({ "vmid": 7 })));
    }

    #[test]
    fn http_transport_builds_with_timeout() {
        assert!(HttpTransport::new(Duration::from_secs(3)).is_ok());
    }
}
