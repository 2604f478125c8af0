//! Providers (spec §4.3): turn a rendered prompt into an output plus synthetic chunks.

mod http_client;
mod local;
mod ollama;
mod openai;

pub use http_client::{HttpPost, ReqwestHttpPost};
pub use local::{ImageProvider, LocalToolProvider};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::model::{ProviderProfile, ResultItem, Source, StepDef};

/// The sources and prior-step outputs scoped to one provider call. The DAG
/// Executor narrows this per step mode (spec §4.5.1): `fanout` scopes `sources`
/// to one source at a time, `per_item` scopes `previous` to one upstream item.
#[derive(Clone, Debug, Default)]
pub struct InputContext {
    pub sources: Vec<Source>,
    pub previous: HashMap<String, Vec<ResultItem>>,
}

/// A provider call's input context: the step, the rendered prompt, the resolved
/// profile, and the sources/previous-outputs view the step mode constructed.
pub struct CallContext<'a> {
    pub step: &'a StepDef,
    pub prompt: &'a str,
    pub profile: &'a ProviderProfile,
    pub input_ctx: &'a InputContext,
    pub cancel: CancellationToken,
}

/// What a provider call produces on success: the text output, provider metadata,
/// and any chunks synthesized from that output.
#[derive(Clone, Debug)]
pub struct ProviderResponse {
    pub output: String,
    pub metadata: Map<String, Value>,
    pub chunks: Vec<String>,
}

/// Failure modes for a provider call (spec §7 Execution tags).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider http error: {0}")]
    Http(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
    #[error("call cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderError::Http(_) => "provider_http_error",
            ProviderError::EmptyResponse => "provider_empty_response",
            ProviderError::Cancelled => "cancelled",
        }
    }
}

/// An executor that turns a prompt into an output, backed by an external API or a
/// local stub. Implementations must check `ctx.cancel` before starting work and,
/// if they issue network I/O, race that I/O against cancellation.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn call(&self, ctx: CallContext<'_>) -> Result<ProviderResponse, ProviderError>;
}

/// Segments a finished response into readable chunks so downstream `provider_chunk`
/// events remain meaningful even when the transport itself is non-streaming
/// (spec §4.3, "Chunks are synthesized by segmenting the final text").
pub fn synthesize_chunks(text: &str) -> Vec<String> {
    const TARGET_LEN: usize = 40;
    if text.is_empty() {
        return Vec::new();
    }
    let words = text.split_whitespace();
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in words {
        if !current.is_empty() && current.len() + 1 + word.len() > TARGET_LEN {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
