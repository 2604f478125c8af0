//! OpenAI chat-completions provider (spec §4.3).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{synthesize_chunks, CallContext, HttpPost, Provider, ProviderError, ProviderResponse};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const API_KEY_ENV_VAR: &str = "PIPELINE_ENGINE_OPENAI_API_KEY";

pub struct OpenAiProvider {
    http: Arc<dyn HttpPost>,
}

impl OpenAiProvider {
    pub fn new(http: Arc<dyn HttpPost>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn call(&self, ctx: CallContext<'_>) -> Result<ProviderResponse, ProviderError> {
        if ctx.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let model = ctx
            .profile
            .default_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let mut messages = Vec::new();
        if let Some(Value::String(system)) = ctx.profile.extra.get("system_prompt") {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": ctx.prompt}));

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": 0,
        });

        let api_key = ctx
            .profile
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .unwrap_or_default();
        let headers = vec![("Authorization".to_string(), format!("Bearer {api_key}"))];

        let url = format!("{}/chat/completions", ctx.profile.base_uri.trim_end_matches('/'));
        let (status, text) = self
            .http
            .post_json(&url, &headers, &body, ctx.cancel.clone())
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
        let content = parsed
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str());

        let output = match content {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => return Err(ProviderError::EmptyResponse),
        };

        let mut metadata = Map::new();
        metadata.insert("provider".to_string(), Value::String("openai".to_string()));
        metadata.insert("model".to_string(), Value::String(model));

        Ok(ProviderResponse {
            chunks: synthesize_chunks(&output),
            output,
            metadata,
        })
    }
}
