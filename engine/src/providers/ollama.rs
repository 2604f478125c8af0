//! Ollama `/api/generate` provider (spec §4.3).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{synthesize_chunks, CallContext, HttpPost, Provider, ProviderError, ProviderResponse};

const DEFAULT_BASE_URI: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3";

pub struct OllamaProvider {
    http: Arc<dyn HttpPost>,
}

impl OllamaProvider {
    pub fn new(http: Arc<dyn HttpPost>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn call(&self, ctx: CallContext<'_>) -> Result<ProviderResponse, ProviderError> {
        if ctx.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let model = ctx
            .profile
            .default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_uri = if ctx.profile.base_uri.is_empty() {
            DEFAULT_BASE_URI
        } else {
            ctx.profile.base_uri.trim_end_matches('/')
        };

        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(model.clone()));
        body.insert("prompt".to_string(), Value::String(ctx.prompt.to_string()));
        body.insert("stream".to_string(), Value::Bool(false));
        if let Some(system) = ctx.profile.extra.get("system") {
            body.insert("system".to_string(), system.clone());
        }
        if let Some(options) = ctx.profile.extra.get("options") {
            body.insert("options".to_string(), options.clone());
        }

        let url = format!("{base_uri}/api/generate");
        let (status, text) = self
            .http
            .post_json(&url, &[], &json!(body), ctx.cancel.clone())
            .await
            .map_err(|e| {
                if e == "cancelled" {
                    ProviderError::Cancelled
                } else {
                    ProviderError::Http(e)
                }
            })?;

        if !(200..300).contains(&status) {
            return Err(ProviderError::Http(format!("status {status}: {text}")));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Http(format!("invalid json response: {e}")))?;
        let output = match parsed.get("response").and_then(|r| r.as_str()) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return Err(ProviderError::EmptyResponse),
        };

        let mut metadata = Map::new();
        metadata.insert("provider".to_string(), Value::String("ollama".to_string()));
        metadata.insert("model".to_string(), Value::String(model));

        Ok(ProviderResponse {
            chunks: synthesize_chunks(&output),
            output,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PipelineDef, ProviderKind, ProviderProfile};
    use crate::providers::InputContext;
    use crate::providers::http_client::test_support::MockHttpPost;
    use tokio_util::sync::CancellationToken;

    fn profile() -> ProviderProfile {
        ProviderProfile {
            id: "p1".to_string(),
            kind: ProviderKind::Ollama,
            base_uri: String::new(),
            api_key: None,
            default_model: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn success_extracts_response_field() {
        let mock = Arc::new(MockHttpPost::ok(200, r#"{"response":"hi there"}"#));
        let provider = OllamaProvider::new(mock);
        let profile = profile();
        let step = PipelineDef::default_single_step("t").steps.remove(0);
        let input = InputContext::default();
        let resp = provider
            .call(CallContext {
                step: &step,
                prompt: "hello",
                profile: &profile,
                input_ctx: &input,
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap();
        assert_eq!(resp.output, "hi there");
        assert_eq!(resp.metadata["model"], DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn empty_response_field_is_empty_response_error() {
        let mock = Arc::new(MockHttpPost::ok(200, r#"{"response":""}"#));
        let provider = OllamaProvider::new(mock);
        let profile = profile();
        let step = PipelineDef::default_single_step("t").steps.remove(0);
        let input = InputContext::default();
        let err = provider
            .call(CallContext {
                step: &step,
                prompt: "hello",
                profile: &profile,
                input_ctx: &input,
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "provider_empty_response");
    }
}
