//! Pipeline definitions: steps, their modes, dependencies, and prompts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution mode for a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepMode {
    #[default]
    Single,
    Fanout,
    PerItem,
}

/// What a step does, independent of provider kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Llm,
    Image,
    Map,
    Reduce,
    Custom,
}

/// System/user template text plus arbitrary render-time metadata.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PromptDef {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

/// One node in a pipeline's DAG.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepDef {
    pub id: String,
    pub name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub mode: StepMode,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub provider_profile_id: String,
    #[serde(default)]
    pub provider_override: Map<String, Value>,
    #[serde(default)]
    pub prompt: PromptDef,
    #[serde(default)]
    pub output_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default)]
    pub export: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_tag: Option<String>,
}

impl StepDef {
    /// `output_type` defaults to `text` when empty (spec.md §4.5.1 tie-break).
    pub fn output_type_or_default(&self) -> &str {
        if self.output_type.is_empty() {
            "text"
        } else {
            &self.output_type
        }
    }
}

/// An ordered, DAG-validated list of steps identified by type and version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineDef {
    #[serde(rename = "type")]
    pub pipeline_type: String,
    pub version: String,
    pub steps: Vec<StepDef>,
}

impl PipelineDef {
    /// The single-step pipeline used when `pipeline_type` is not found in the
    /// registry (spec.md §4.5 entry, §8 boundary behavior).
    pub fn default_single_step(pipeline_type: &str) -> Self {
        PipelineDef {
            pipeline_type: pipeline_type.to_string(),
            version: "v0".to_string(),
            steps: vec![StepDef {
                id: "step-1".to_string(),
                name: "default".to_string(),
                kind: StepKind::Custom,
                mode: StepMode::Single,
                depends_on: Vec::new(),
                provider_profile_id: String::new(),
                provider_override: Map::new(),
                prompt: PromptDef::default(),
                output_type: "text".to_string(),
                output_format: None,
                config: None,
                export: true,
                export_tag: None,
            }],
        }
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }
}

/// One piece of input content a job is asked to process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Source {
    pub kind: String,
    pub label: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Job-level options affecting rendering/generation, all optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The sources and options a job was submitted with.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<JobOptions>,
}
