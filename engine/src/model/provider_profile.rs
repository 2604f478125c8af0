//! Provider profiles: named configuration bundles for a provider kind.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The kind of provider a profile (and the step it's attached to) targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Ollama,
    Image,
    LocalTool,
}

impl ProviderKind {
    /// Parses a kind from its wire string, case-insensitively. Unknown/empty
    /// strings default to `LocalTool` per the registry's `upsert_profile` rule.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "openai" => ProviderKind::Openai,
            "ollama" => ProviderKind::Ollama,
            "image" => ProviderKind::Image,
            _ => ProviderKind::LocalTool,
        }
    }
}

/// A named configuration bundle for a provider: endpoint, credentials, default
/// model, and an open extras map. Immutable once registered except via explicit
/// `upsert_profile`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub kind: ProviderKind,
    pub base_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl ProviderProfile {
    /// Applies a step's `provider_override` map: the three named keys (matched
    /// case-insensitively) overwrite the corresponding field; everything else
    /// spills into `extra` under its original key.
    pub fn merged_with_override(&self, overrides: &Map<String, Value>) -> ProviderProfile {
        let mut merged = self.clone();
        for (key, value) in overrides {
            match key.to_ascii_lowercase().as_str() {
                "base_uri" => merged.base_uri = value_as_string(value),
                "api_key" => merged.api_key = Some(value_as_string(value)),
                "default_model" => merged.default_model = Some(value_as_string(value)),
                _ => {
                    merged.extra.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
