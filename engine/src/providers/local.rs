//! Image and local-tool stub providers (spec §4.3): deterministic synthetic output,
//! no external I/O, used to exercise the abstraction end to end.

use async_trait::async_trait;
use serde_json::Map;

use super::{synthesize_chunks, CallContext, Provider, ProviderError, ProviderResponse};

pub struct ImageProvider;

#[async_trait]
impl Provider for ImageProvider {
    async fn call(&self, ctx: CallContext<'_>) -> Result<ProviderResponse, ProviderError> {
        if ctx.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let output = format!("[image stub output for step {}]", ctx.step.id);
        let mut metadata = Map::new();
        metadata.insert("provider".into(), "image".into());
        Ok(ProviderResponse {
            chunks: synthesize_chunks(&output),
            output,
            metadata,
        })
    }
}

pub struct LocalToolProvider;

#[async_trait]
impl Provider for LocalToolProvider {
    async fn call(&self, ctx: CallContext<'_>) -> Result<ProviderResponse, ProviderError> {
        if ctx.cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let output = format!("[local-tool stub output for step {}]", ctx.step.id);
        let mut metadata = Map::new();
        metadata.insert("provider".into(), "local_tool".into());
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
    use tokio_util::sync::CancellationToken;

    fn profile(kind: ProviderKind) -> ProviderProfile {
        ProviderProfile {
            id: "p1".to_string(),
            kind,
            base_uri: String::new(),
            api_key: None,
            default_model: None,
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn image_provider_returns_deterministic_output() {
        let provider = ImageProvider;
        let profile = profile(ProviderKind::Image);
        let step = PipelineDef::default_single_step("t").steps.remove(0);
        let input = InputContext::default();
        let resp = provider
            .call(CallContext {
                step: &step,
                prompt: "ignored",
                profile: &profile,
                input_ctx: &input,
                cancel: CancellationToken::new(),
            })
            .await
            .unwrap();
        assert!(resp.output.contains(&step.id));
    }

    #[tokio::test]
    async fn local_tool_provider_honors_cancellation() {
        let provider = LocalToolProvider;
        let profile = profile(ProviderKind::LocalTool);
        let step = PipelineDef::default_single_step("t").steps.remove(0);
        let input = InputContext::default();
        let token = CancellationToken::new();
        token.cancel();
        let err = provider
            .call(CallContext {
                step: &step,
                prompt: "ignored",
                profile: &profile,
                input_ctx: &input,
                cancel: token,
            })
            .await
            .unwrap_err();
        assert_eq!(err.tag(), "cancelled");
    }
}
