use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use quizbench_core::error::{ConfigError, Result};
use quizbench_core::model::ChatModel;
use quizbench_core::record::{Dataset, GeneratedRecord, Record};
use quizbench_eval::convert::to_aggregate_document;
use quizbench_eval::fewshot::FewShotGenerator;
use quizbench_eval::score::score;
use quizbench_eval::split::{FetchedDataset, split};
use quizbench_eval::store::DatasetStore;

use crate::runner::{Component, ComponentRegistry};

/// Component identifiers used by the assembled few-shot pipeline.
pub mod ids {
    pub const MMLU_FETCH: &str = "mmlu_fetch";
    pub const DATASET_SPLIT: &str = "dataset_split";
    pub const JSONL_TO_JSON: &str = "jsonl_to_json";
    pub const FEWSHOT_GENERATE: &str = "fewshot_generate";
    pub const SCORE_MULTIPLE_CHOICE: &str = "score_multiple_choice";
}

fn param_str<'a>(params: &'a BTreeMap<String, Value>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::MissingField(format!("param '{name}'")).into())
}

fn param_usize(params: &BTreeMap<String, Value>, name: &str) -> Result<usize> {
    params
        .get(name)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| ConfigError::MissingField(format!("param '{name}'")).into())
}

fn input_value(inputs: &BTreeMap<String, Value>, name: &str) -> Result<Value> {
    inputs
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingField(format!("input '{name}'")).into())
}

fn single_output(value: Value) -> BTreeMap<String, Value> {
    [("output_dataset".to_string(), value)].into()
}

/// Fetches the named benchmark dataset through a `DatasetStore`.
pub struct FetchComponent {
    store: Arc<dyn DatasetStore>,
}

impl FetchComponent {
    pub fn new(store: Arc<dyn DatasetStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Component for FetchComponent {
    async fn run(
        &self,
        _inputs: BTreeMap<String, Value>,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let dataset = param_str(params, "mmlu_dataset")?;
        let fetched = self.store.fetch(dataset).await?;
        Ok(single_output(serde_json::to_value(fetched)?))
    }
}

/// Extracts one partition of a fetched dataset by filename pattern.
pub struct SplitComponent;

#[async_trait]
impl Component for SplitComponent {
    async fn run(
        &self,
        inputs: BTreeMap<String, Value>,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let source: FetchedDataset = serde_json::from_value(input_value(&inputs, "input_dataset")?)?;
        let selector = param_str(params, "filename_pattern")?;
        let dataset = split(&source, selector)?;
        Ok(single_output(serde_json::to_value(dataset)?))
    }
}

/// Collapses a line-delimited dataset into one aggregate JSON document.
pub struct ConvertComponent;

#[async_trait]
impl Component for ConvertComponent {
    async fn run(
        &self,
        inputs: BTreeMap<String, Value>,
        _params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let dataset: Dataset = serde_json::from_value(input_value(&inputs, "input_dataset")?)?;
        Ok(single_output(to_aggregate_document(&dataset)?))
    }
}

/// Runs the few-shot generation stage against the bound model.
pub struct FewShotComponent {
    model: Arc<dyn ChatModel>,
}

impl FewShotComponent {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Component for FewShotComponent {
    async fn run(
        &self,
        inputs: BTreeMap<String, Value>,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let dataset: Dataset = serde_json::from_value(input_value(&inputs, "input_dataset")?)?;
        let exemplars: Vec<Record> =
            serde_json::from_value(input_value(&inputs, "common_dataset")?)?;
        let workers = param_usize(params, "guidance_workers")?;
        let max_errors = param_usize(params, "max_errors")?;

        let generator =
            FewShotGenerator::new(Arc::clone(&self.model), exemplars, workers, max_errors);
        let outputs = generator.run(&dataset).await?;
        Ok(single_output(serde_json::to_value(outputs)?))
    }
}

/// Scores generated choices against ground truth from the source split.
pub struct ScoreComponent;

#[async_trait]
impl Component for ScoreComponent {
    async fn run(
        &self,
        inputs: BTreeMap<String, Value>,
        _params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>> {
        let outputs: Vec<GeneratedRecord> =
            serde_json::from_value(input_value(&inputs, "input_dataset")?)?;
        let source: Dataset = serde_json::from_value(input_value(&inputs, "source_dataset")?)?;
        let report = score(&outputs, &source)?;
        Ok([("output_report".to_string(), serde_json::to_value(report)?)].into())
    }
}

/// The full component set the assembled few-shot pipeline expects.
pub fn standard_registry(
    store: Arc<dyn DatasetStore>,
    model: Arc<dyn ChatModel>,
) -> ComponentRegistry {
    ComponentRegistry::new()
        .register(ids::MMLU_FETCH, Arc::new(FetchComponent::new(store)))
        .register(ids::DATASET_SPLIT, Arc::new(SplitComponent))
        .register(ids::JSONL_TO_JSON, Arc::new(ConvertComponent))
        .register(ids::FEWSHOT_GENERATE, Arc::new(FewShotComponent::new(model)))
        .register(ids::SCORE_MULTIPLE_CHOICE, Arc::new(ScoreComponent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbench_core::message::Message;
    use quizbench_core::model::{CallOptions, ChatResult, check_allowed_tokens};
    use serde_json::json;

    struct MemoryStore {
        fetched: FetchedDataset,
    }

    #[async_trait]
    impl DatasetStore for MemoryStore {
        async fn fetch(&self, _dataset: &str) -> Result<FetchedDataset> {
            Ok(self.fetched.clone())
        }
    }

    /// Always answers the ground-truth choice of the target question.
    struct OracleModel {
        answers: BTreeMap<String, String>,
    }

    #[async_trait]
    impl ChatModel for OracleModel {
        async fn generate(
            &self,
            _messages: &[Message],
            _options: &CallOptions,
        ) -> Result<ChatResult> {
            Ok(ChatResult {
                message: Message::assistant("0"),
            })
        }

        async fn generate_constrained(
            &self,
            messages: &[Message],
            allowed: &[String],
        ) -> Result<String> {
            check_allowed_tokens(allowed)?;
            let user = messages[1].content();
            let answer = self
                .answers
                .iter()
                .find(|(q, _)| user.contains(q.as_str()))
                .map(|(_, a)| a.clone())
                .unwrap_or_else(|| allowed[0].clone());
            Ok(answer)
        }

        fn model_name(&self) -> &str {
            "oracle"
        }
    }

    fn record(question: &str, correct: usize) -> Record {
        Record::new(question, vec!["a".into(), "b".into(), "c".into()], correct)
    }

    #[tokio::test]
    async fn split_component_extracts_partition() {
        let fetched = FetchedDataset::new()
            .with_partition("test.jsonl", Dataset::new(vec![record("t1", 0)]))
            .with_partition("dev.jsonl", Dataset::new(vec![record("d1", 1)]));

        let inputs: BTreeMap<String, Value> =
            [("input_dataset".to_string(), serde_json::to_value(fetched).unwrap())].into();
        let params: BTreeMap<String, Value> =
            [("filename_pattern".to_string(), json!("dev.jsonl"))].into();

        let outputs = SplitComponent.run(inputs, &params).await.unwrap();
        let dataset: Dataset = serde_json::from_value(outputs["output_dataset"].clone()).unwrap();
        assert_eq!(dataset.records[0].question, "d1");
    }

    #[tokio::test]
    async fn missing_param_fails() {
        let outputs = SplitComponent.run(BTreeMap::new(), &BTreeMap::new()).await;
        assert!(outputs.unwrap_err().to_string().contains("input_dataset"));
    }

    #[tokio::test]
    async fn end_to_end_pipeline_scores_oracle_at_one() {
        use crate::assemble::assemble_fewshot_pipeline;
        use crate::submit::RunIdentity;
        use quizbench_core::config::RunConfig;
        use quizbench_eval::score::ScoreReport;

        let yaml = r#"
mmlu_dataset: anatomy
eval_split: test
fewshot_split: dev
guidance_workers: 2
max_errors: 3
model:
  endpoint: https://unused.test
  deployment: oracle
pipeline:
  base_experiment_name: fewshot_mmlu
  default_compute_target: cpu
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        let assembled = assemble_fewshot_pipeline(&config, &RunIdentity::new()).unwrap();

        let fetched = FetchedDataset::new()
            .with_partition(
                "test.jsonl",
                Dataset::new(vec![record("capital of France?", 2), record("2+2?", 1)]),
            )
            .with_partition("dev.jsonl", Dataset::new(vec![record("exemplar", 0)]));
        let store = Arc::new(MemoryStore { fetched });
        let model = Arc::new(OracleModel {
            answers: [
                ("capital of France?".to_string(), "2".to_string()),
                ("2+2?".to_string(), "1".to_string()),
            ]
            .into(),
        });

        let registry = standard_registry(store, model);
        let results = assembled
            .pipeline
            .execute(&registry, &BTreeMap::new())
            .await
            .unwrap();

        let report: ScoreReport =
            serde_json::from_value(results["fewshot_score"]["output_report"].clone()).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.accuracy, 1.0);
    }
}
