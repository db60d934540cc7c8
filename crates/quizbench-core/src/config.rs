use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

fn default_workers() -> usize {
    4
}

fn default_max_errors() -> usize {
    5
}

/// Target model deployment and where its calls run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,

    /// Deployed model identifier.
    pub deployment: String,

    /// Environment variable holding the API key.
    #[serde(default = "ModelConfig::default_api_key_env")]
    pub api_key_env: String,

    /// Compute target for the generation node.
    #[serde(default)]
    pub compute_target: Option<String>,
}

impl ModelConfig {
    fn default_api_key_env() -> String {
        "OPENAI_API_KEY".into()
    }
}

/// Naming and tagging for a pipeline submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub base_experiment_name: String,

    pub default_compute_target: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// The configuration surface for one evaluation run.
///
/// Loaded from YAML and validated before any stage executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Source benchmark dataset identifier.
    pub mmlu_dataset: String,

    /// Selector for the evaluation split.
    pub eval_split: String,

    /// Selector for the few-shot exemplar split.
    pub fewshot_split: String,

    /// Worker-pool width for the generation stage.
    #[serde(default = "default_workers")]
    pub guidance_workers: usize,

    /// Per-run budget of tolerated generation failures.
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    pub model: ModelConfig,

    pub pipeline: PipelineSettings,
}

impl RunConfig {
    /// Parse a YAML document into a config. Structural errors (missing
    /// sections, wrong types) surface here; value checks live in `validate`.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: RunConfig = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// Fail fast on values no stage could run with.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("mmlu_dataset", &self.mmlu_dataset),
            ("eval_split", &self.eval_split),
            ("fewshot_split", &self.fewshot_split),
            ("model.endpoint", &self.model.endpoint),
            ("model.deployment", &self.model.deployment),
            (
                "pipeline.base_experiment_name",
                &self.pipeline.base_experiment_name,
            ),
            (
                "pipeline.default_compute_target",
                &self.pipeline.default_compute_target,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(name.into()).into());
            }
        }

        if self.guidance_workers == 0 {
            return Err(ConfigError::Invalid("guidance_workers must be at least 1".into()).into());
        }
        if self.max_errors == 0 {
            return Err(ConfigError::Invalid("max_errors must be at least 1".into()).into());
        }

        Ok(())
    }
}
