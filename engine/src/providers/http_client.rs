//! Injectable HTTP POST for provider calls, so tests can stand in for the network
//! without a live server — the same shape as a trait-wrapped `reqwest` client used
//! elsewhere in this stack for testable HTTP resolution.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A single POST-JSON-get-JSON round trip, abortable via `cancel`.
#[async_trait]
pub trait HttpPost: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        cancel: CancellationToken,
    ) -> Result<(u16, String), String>;
}

/// Production implementation backed by `reqwest`.
pub struct ReqwestHttpPost {
    client: reqwest::Client,
}

impl ReqwestHttpPost {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestHttpPost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpPost for ReqwestHttpPost {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        cancel: CancellationToken,
    ) -> Result<(u16, String), String> {
        let mut builder = self.client.post(url).json(body);
        for (k, v) in headers {
            builder = builder.header(k, v);
        }
        let request = builder.send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err("cancelled".to_string()),
            result = request => result.map_err(|e| e.to_string())?,
        };
        let status = response.status().as_u16();
        let text = tokio::select! {
            _ = cancel.cancelled() => return Err("cancelled".to_string()),
            result = response.text() => result.map_err(|e| e.to_string())?,
        };
        Ok((status, text))
    }
}
