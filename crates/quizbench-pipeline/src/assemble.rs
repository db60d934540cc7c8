use serde_json::json;

use quizbench_core::config::RunConfig;
use quizbench_core::error::Result;

use crate::components::ids;
use crate::graph::{CompiledPipeline, PipelineGraph};
use crate::node::{InputRef, JobNode};
use crate::submit::{RunIdentity, RunMetadata};

/// A compiled pipeline plus the run metadata it should be submitted with.
#[derive(Debug, Clone)]
pub struct AssembledPipeline {
    pub pipeline: CompiledPipeline,
    pub metadata: RunMetadata,
}

/// Wire the few-shot evaluation DAG from a validated run configuration.
///
/// fetch -> split(eval) + split(fewshot) -> convert -> generate -> score,
/// with generation consuming both the evaluation split and the converted
/// exemplar pool, and scoring consuming the generation output plus the
/// evaluation split as ground truth. Pure graph construction: fails only on
/// invalid configuration, never on data content.
pub fn assemble_fewshot_pipeline(
    config: &RunConfig,
    version: &RunIdentity,
) -> Result<AssembledPipeline> {
    config.validate()?;

    let fetch_name = format!("fetch_mmlu_{}", config.mmlu_dataset);
    let eval_split_name = format!("extract_split_{}", config.eval_split);
    let fewshot_split_name = format!("extract_split_{}", config.fewshot_split);

    let mut graph = PipelineGraph::new();

    graph.add_node(
        JobNode::new(&fetch_name, ids::MMLU_FETCH)
            .with_param("mmlu_dataset", json!(config.mmlu_dataset)),
    )?;

    graph.add_node(split_node(&eval_split_name, &fetch_name, &config.eval_split))?;

    // When both selectors name the same split, one extraction node feeds both
    // consumers instead of colliding on the node name.
    if fewshot_split_name != eval_split_name {
        graph.add_node(split_node(
            &fewshot_split_name,
            &fetch_name,
            &config.fewshot_split,
        ))?;
    }

    graph.add_node(
        JobNode::new("convert_fewshot_to_json", ids::JSONL_TO_JSON).with_input(
            "input_dataset",
            InputRef::output(&fewshot_split_name, "output_dataset"),
        ),
    )?;

    let mut guidance = JobNode::new("fewshot_guidance", ids::FEWSHOT_GENERATE)
        .with_input(
            "input_dataset",
            InputRef::output(&eval_split_name, "output_dataset"),
        )
        .with_input(
            "common_dataset",
            InputRef::output("convert_fewshot_to_json", "output_dataset"),
        )
        .with_param("guidance_workers", json!(config.guidance_workers))
        .with_param("max_errors", json!(config.max_errors))
        .with_param("endpoint", json!(config.model.endpoint))
        .with_param("deployment", json!(config.model.deployment));
    if let Some(compute) = &config.model.compute_target {
        guidance = guidance.with_compute(compute);
    }
    graph.add_node(guidance)?;

    graph.add_node(
        JobNode::new("fewshot_score", ids::SCORE_MULTIPLE_CHOICE)
            .with_input(
                "input_dataset",
                InputRef::output("fewshot_guidance", "output_dataset"),
            )
            .with_input(
                "source_dataset",
                InputRef::output(&eval_split_name, "output_dataset"),
            ),
    )?;

    let pipeline = graph.compile()?;

    let mut tags = config.pipeline.tags.clone();
    tags.insert("version".into(), version.to_string());
    let metadata = RunMetadata {
        experiment_name: format!(
            "{}_{}",
            config.pipeline.base_experiment_name, config.mmlu_dataset
        ),
        display_name: config.pipeline.display_name.clone(),
        default_compute_target: config.pipeline.default_compute_target.clone(),
        tags,
    };

    tracing::info!(
        experiment = %metadata.experiment_name,
        version = %version,
        nodes = pipeline.node_count(),
        "assembled few-shot pipeline"
    );

    Ok(AssembledPipeline { pipeline, metadata })
}

fn split_node(name: &str, fetch_name: &str, selector: &str) -> JobNode {
    JobNode::new(name, ids::DATASET_SPLIT)
        .with_input(
            "input_dataset",
            InputRef::output(fetch_name, "output_dataset"),
        )
        .with_param("filename_pattern", json!(format!("{selector}.jsonl")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbench_core::config::RunConfig;

    fn config(eval_split: &str, fewshot_split: &str) -> RunConfig {
        RunConfig::from_yaml(&format!(
            r#"
mmlu_dataset: anatomy
eval_split: {eval_split}
fewshot_split: {fewshot_split}
model:
  endpoint: https://example.test
  deployment: gpt-4o-mini
  compute_target: aoai-cluster
pipeline:
  base_experiment_name: fewshot_mmlu
  default_compute_target: cpu-cluster
  tags:
    team: eval
"#
        ))
        .unwrap()
    }

    #[test]
    fn assembles_six_node_dag() {
        let assembled =
            assemble_fewshot_pipeline(&config("test", "dev"), &RunIdentity::new()).unwrap();
        let pipeline = &assembled.pipeline;

        assert_eq!(pipeline.node_count(), 6);
        let order = pipeline.execution_order();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("fetch_mmlu_anatomy") < pos("extract_split_test"));
        assert!(pos("fetch_mmlu_anatomy") < pos("extract_split_dev"));
        assert!(pos("extract_split_dev") < pos("convert_fewshot_to_json"));
        assert!(pos("convert_fewshot_to_json") < pos("fewshot_guidance"));
        assert!(pos("extract_split_test") < pos("fewshot_guidance"));
        assert!(pos("fewshot_guidance") < pos("fewshot_score"));
    }

    #[test]
    fn guidance_node_carries_config_params_and_compute() {
        let assembled =
            assemble_fewshot_pipeline(&config("test", "dev"), &RunIdentity::new()).unwrap();
        let guidance = assembled.pipeline.node("fewshot_guidance").unwrap();
        assert_eq!(guidance.params["guidance_workers"], json!(4));
        assert_eq!(guidance.params["max_errors"], json!(5));
        assert_eq!(guidance.params["deployment"], json!("gpt-4o-mini"));
        assert_eq!(guidance.compute.as_deref(), Some("aoai-cluster"));
    }

    #[test]
    fn metadata_names_experiment_after_dataset() {
        let version = RunIdentity::new();
        let assembled = assemble_fewshot_pipeline(&config("test", "dev"), &version).unwrap();
        assert_eq!(assembled.metadata.experiment_name, "fewshot_mmlu_anatomy");
        assert_eq!(assembled.metadata.tags["team"], "eval");
        assert_eq!(assembled.metadata.tags["version"], version.to_string());
    }

    #[test]
    fn identical_splits_share_one_extraction_node() {
        let assembled =
            assemble_fewshot_pipeline(&config("dev", "dev"), &RunIdentity::new()).unwrap();
        assert_eq!(assembled.pipeline.node_count(), 5);
        assert!(assembled.pipeline.node("extract_split_dev").is_some());
    }

    #[test]
    fn invalid_config_fails_before_assembly() {
        let mut bad = config("test", "dev");
        bad.guidance_workers = 0;
        assert!(assemble_fewshot_pipeline(&bad, &RunIdentity::new()).is_err());
    }
}
