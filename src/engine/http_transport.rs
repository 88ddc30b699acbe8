//! HTTP transport: posts each dispatch request as JSON to the backend
//! gateway and returns the envelope body undecoded.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use super::transport::{DispatchRequest, Transport};
use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl HttpTransportConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

pub struct HttpTransport {
    config: HttpTransportConfig,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn build_headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.config.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| TransportError::Network(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: &DispatchRequest) -> Result<Value, TransportError> {
        let headers = self.build_headers()?;
        let resp = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => Ok(value),
            // A bare HTTP 401 without an envelope still has to reach the
            // auth classification.
            Err(_) if status.as_u16() == 401 => Ok(serde_json::json!({ "status": 401 })),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }
}
