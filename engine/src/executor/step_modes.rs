//! Step mode dispatch (spec §4.5.1): single / fanout / per_item, with their
//! degradation rules, plus the shared provider-call + chunk-recording +
//! `ResultItem` construction path all three modes funnel through.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::model::{Job, ProviderProfile, ResultItem, StepDef, StepKind, StepMode};
use crate::providers::{CallContext, InputContext, Provider, ProviderError, ProviderResponse};
use crate::store::JobStore;

/// A step's resolved provider, or the absence of one (spec §4.5: "registry may
/// return `(nil, _)` when no profile is configured; in that case synthesize a
/// deterministic textual result").
pub enum ResolvedProvider {
    Real(Arc<dyn Provider>, ProviderProfile),
    None,
}

/// Dispatches `step` by its mode, producing its list of `ResultItem`s. Chunks are
/// recorded onto `job`'s matching `StepExecution` and persisted via `store` as
/// each provider call completes.
pub async fn run_step(
    step: &StepDef,
    job: &mut Job,
    store: &JobStore,
    resolved: &ResolvedProvider,
    prompt: &str,
    outputs: &HashMap<String, Vec<ResultItem>>,
    cancel: CancellationToken,
) -> Result<Vec<ResultItem>, ProviderError> {
    match step.mode {
        StepMode::Single => run_single(step, job, store, resolved, prompt, outputs, cancel).await,
        StepMode::Fanout => run_fanout(step, job, store, resolved, prompt, outputs, cancel).await,
        StepMode::PerItem => run_per_item(step, job, store, resolved, prompt, outputs, cancel).await,
    }
}

/// One provider call with the full context (spec §4.5.1 "single").
async fn run_single(
    step: &StepDef,
    job: &mut Job,
    store: &JobStore,
    resolved: &ResolvedProvider,
    prompt: &str,
    outputs: &HashMap<String, Vec<ResultItem>>,
    cancel: CancellationToken,
) -> Result<Vec<ResultItem>, ProviderError> {
    let input_ctx = InputContext {
        sources: job.input.sources.clone(),
        previous: outputs.clone(),
    };
    let item = call_and_record(
        step,
        job,
        store,
        resolved,
        prompt,
        input_ctx,
        cancel,
        None,
        step_label(step),
        Map::new(),
    )
    .await?;
    Ok(vec![item])
}

/// One item per source; degrades to `single` when there are no sources
/// (spec §4.5.1 "fanout").
async fn run_fanout(
    step: &StepDef,
    job: &mut Job,
    store: &JobStore,
    resolved: &ResolvedProvider,
    prompt: &str,
    outputs: &HashMap<String, Vec<ResultItem>>,
    cancel: CancellationToken,
) -> Result<Vec<ResultItem>, ProviderError> {
    if job.input.sources.is_empty() {
        return run_single(step, job, store, resolved, prompt, outputs, cancel).await;
    }
    let sources = job.input.sources.clone();
    let mut items = Vec::with_capacity(sources.len());
    for (i, source) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let input_ctx = InputContext {
            sources: vec![source.clone()],
            previous: outputs.clone(),
        };
        let mut extra = Map::new();
        extra.insert(
            "source_kind".to_string(),
            Value::String(source.kind.clone()),
        );
        extra.insert(
            "source".to_string(),
            serde_json::to_value(source).unwrap_or(Value::Null),
        );
        let shard_key = format!("{}-{}", step.id, i);
        let label = format!("{}#{}", step_label(step), i + 1);
        let item = call_and_record(
            step,
            job,
            store,
            resolved,
            prompt,
            input_ctx,
            cancel.clone(),
            Some(shard_key),
            label,
            extra,
        )
        .await?;
        items.push(item);
    }
    Ok(items)
}

/// Consumes the last dependency's items, one call per item; degrades to `fanout`
/// when that dependency produced nothing (spec §4.5.1 "per_item").
async fn run_per_item(
    step: &StepDef,
    job: &mut Job,
    store: &JobStore,
    resolved: &ResolvedProvider,
    prompt: &str,
    outputs: &HashMap<String, Vec<ResultItem>>,
    cancel: CancellationToken,
) -> Result<Vec<ResultItem>, ProviderError> {
    let base: Vec<ResultItem> = step
        .depends_on
        .last()
        .and_then(|id| outputs.get(id))
        .cloned()
        .unwrap_or_default();
    if base.is_empty() {
        return run_fanout(step, job, store, resolved, prompt, outputs, cancel).await;
    }
    let mut items = Vec::with_capacity(base.len());
    for (i, prev) in base.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        let mut previous = HashMap::new();
        previous.insert(prev.step_id.clone(), vec![prev.clone()]);
        let input_ctx = InputContext {
            sources: job.input.sources.clone(),
            previous,
        };
        let shard_key = prev
            .shard_key
            .clone()
            .unwrap_or_else(|| format!("{}-{}", step.id, i));
        let label = format!("{}#{}", step_label(step), i + 1);
        let item = call_and_record(
            step,
            job,
            store,
            resolved,
            prompt,
            input_ctx,
            cancel.clone(),
            Some(shard_key),
            label,
            Map::new(),
        )
        .await?;
        items.push(item);
    }
    Ok(items)
}

fn step_label(step: &StepDef) -> String {
    if step.name.is_empty() {
        step.id.clone()
    } else {
        step.name.clone()
    }
}

fn step_kind_str(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Llm => "llm",
        StepKind::Image => "image",
        StepKind::Map => "map",
        StepKind::Reduce => "reduce",
        StepKind::Custom => "custom",
    }
}

/// Issues one provider call (or synthesizes a placeholder when no provider is
/// configured), records its chunks onto the step execution as they arrive
/// (persisting after each one so the Streaming Tracker can emit `provider_chunk`),
/// then builds the resulting `ResultItem`.
#[allow(clippy::too_many_arguments)]
async fn call_and_record(
    step: &StepDef,
    job: &mut Job,
    store: &JobStore,
    resolved: &ResolvedProvider,
    prompt: &str,
    input_ctx: InputContext,
    cancel: CancellationToken,
    shard_key: Option<String>,
    label: String,
    extra_data: Map<String, Value>,
) -> Result<ResultItem, ProviderError> {
    let shard_label = shard_key.clone().unwrap_or_else(|| step.id.clone());

    let mut response = match resolved {
        ResolvedProvider::Real(provider, profile) => {
            provider
                .call(CallContext {
                    step,
                    prompt,
                    profile,
                    input_ctx: &input_ctx,
                    cancel: cancel.clone(),
                })
                .await?
        }
        ResolvedProvider::None => {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            ProviderResponse {
                output: String::new(),
                metadata: Map::new(),
                chunks: Vec::new(),
            }
        }
    };

    // Tie-break (spec §4.5.1): empty provider output becomes a deterministic
    // placeholder naming the step and shard.
    if response.output.is_empty() {
        response.output = format!("[no output for step {} ({})]", step.id, shard_label);
    }

    for chunk in &response.chunks {
        if cancel.is_cancelled() {
            // A concurrent cancel_job call may already have written the job's
            // terminal state; don't clobber it with a stale in-flight snapshot.
            break;
        }
        if let Some(exec) = job.step_execution_mut(&step.id) {
            exec.push_chunk(chunk.clone());
        }
        job.touch();
        let _ = store.update(job.clone()).await;
    }

    let mut data = Map::new();
    data.insert("text".to_string(), Value::String(response.output.clone()));
    data.insert("prompt".to_string(), Value::String(prompt.to_string()));
    data.insert(
        "pipelineType".to_string(),
        Value::String(job.pipeline_type.clone()),
    );
    for (k, v) in response.metadata {
        data.insert(k, v);
    }
    for (k, v) in extra_data {
        data.insert(k, v);
    }

    Ok(ResultItem {
        id: uuid::Uuid::new_v4().simple().to_string(),
        label,
        step_id: step.id.clone(),
        shard_key,
        is_primary: None,
        kind: step_kind_str(step.kind).to_string(),
        tag: step.export_tag.clone(),
        content_type: step.output_type_or_default().to_string(),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobInput, JobMode, JobStatus, PipelineDef, Source, StepExecution};
    use crate::providers::LocalToolProvider;

    fn job_with_sources(sources: Vec<Source>) -> Job {
        let now = chrono::Utc::now();
        Job {
            id: "job-1".to_string(),
            pipeline_type: "t".to_string(),
            pipeline_version: "v0".to_string(),
            status: JobStatus::Running,
            created_at: now,
            updated_at: now,
            input: JobInput {
                sources,
                options: None,
            },
            mode: JobMode::Async,
            parent_job_id: None,
            rerun_from_step: None,
            reuse_upstream: false,
            step_executions: vec![StepExecution::pending("step-1")],
            result: None,
            error: None,
        }
    }

    fn source(label: &str, content: &str) -> Source {
        Source {
            kind: "note".to_string(),
            label: label.to_string(),
            content: content.to_string(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn fanout_degrades_to_single_on_empty_sources() {
        let store = JobStore::new();
        let mut step = PipelineDef::default_single_step("t").steps.remove(0);
        step.mode = StepMode::Fanout;
        let mut job = job_with_sources(vec![]);
        let items = run_step(
            &step,
            &mut job,
            &store,
            &ResolvedProvider::None,
            "prompt",
            &HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].shard_key, None);
    }

    #[tokio::test]
    async fn fanout_produces_one_item_per_source_in_order() {
        let store = JobStore::new();
        let mut step = PipelineDef::default_single_step("step-1").steps.remove(0);
        step.mode = StepMode::Fanout;
        let mut job = job_with_sources(vec![source("a", "hello"), source("b", "world")]);
        let items = run_step(
            &step,
            &mut job,
            &store,
            &ResolvedProvider::None,
            "prompt",
            &HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].shard_key.as_deref(), Some("step-1-0"));
        assert_eq!(items[1].shard_key.as_deref(), Some("step-1-1"));
        assert_eq!(items[0].label, "default#1");
    }

    #[tokio::test]
    async fn per_item_degrades_to_fanout_on_empty_base() {
        let store = JobStore::new();
        let mut step = PipelineDef::default_single_step("step-1").steps.remove(0);
        step.mode = StepMode::PerItem;
        step.depends_on = vec!["upstream".to_string()];
        let mut job = job_with_sources(vec![source("a", "hello")]);
        let items = run_step(
            &step,
            &mut job,
            &store,
            &ResolvedProvider::None,
            "prompt",
            &HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        // degraded to fanout over the one source
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].shard_key.as_deref(), Some("step-1-0"));
    }

    #[tokio::test]
    async fn per_item_consumes_last_dependency_items() {
        let store = JobStore::new();
        let mut step = PipelineDef::default_single_step("step-2").steps.remove(0);
        step.mode = StepMode::PerItem;
        step.depends_on = vec!["step-1".to_string()];
        let mut job = job_with_sources(vec![]);
        let mut outputs = HashMap::new();
        outputs.insert(
            "step-1".to_string(),
            vec![
                ResultItem {
                    id: "i1".to_string(),
                    label: "a".to_string(),
                    step_id: "step-1".to_string(),
                    shard_key: Some("step-1-0".to_string()),
                    is_primary: None,
                    kind: "text".to_string(),
                    tag: None,
                    content_type: "text".to_string(),
                    data: Default::default(),
                },
                ResultItem {
                    id: "i2".to_string(),
                    label: "b".to_string(),
                    step_id: "step-1".to_string(),
                    shard_key: Some("step-1-1".to_string()),
                    is_primary: None,
                    kind: "text".to_string(),
                    tag: None,
                    content_type: "text".to_string(),
                    data: Default::default(),
                },
            ],
        );
        let items = run_step(
            &step,
            &mut job,
            &store,
            &ResolvedProvider::None,
            "prompt",
            &outputs,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].shard_key.as_deref(), Some("step-1-0"));
        assert_eq!(items[1].shard_key.as_deref(), Some("step-1-1"));
    }

    #[tokio::test]
    async fn no_provider_configured_yields_deterministic_placeholder() {
        let store = JobStore::new();
        let step = PipelineDef::default_single_step("step-1").steps.remove(0);
        let mut job = job_with_sources(vec![]);
        let items = run_step(
            &step,
            &mut job,
            &store,
            &ResolvedProvider::None,
            "prompt",
            &HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(items[0].data["text"]
            .as_str()
            .unwrap()
            .contains("step-1"));
    }

    #[tokio::test]
    async fn chunks_are_recorded_onto_the_step_execution() {
        let store = JobStore::new();
        let step = PipelineDef::default_single_step("step-1").steps.remove(0);
        let mut job = job_with_sources(vec![]);
        let provider: Arc<dyn Provider> = Arc::new(LocalToolProvider);
        let profile = ProviderProfile {
            id: "p".to_string(),
            kind: crate::model::ProviderKind::LocalTool,
            base_uri: String::new(),
            api_key: None,
            default_model: None,
            extra: Default::default(),
        };
        let resolved = ResolvedProvider::Real(provider, profile);
        run_step(
            &step,
            &mut job,
            &store,
            &resolved,
            "prompt",
            &HashMap::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(!job.step_executions[0].chunks.is_empty());
    }
}
