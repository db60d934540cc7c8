use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quizbench_core::config::RunConfig;
use quizbench_core::error::{ConfigError, QuizbenchError, Result};
use quizbench_eval::score::ScoreReport;
use quizbench_eval::store::FsDatasetStore;
use quizbench_llm::openai::OpenAiChatModel;
use quizbench_pipeline::prelude::*;

#[derive(Parser)]
#[command(name = "quizbench", about = "Few-shot multiple-choice evaluation pipelines")]
struct Cli {
    /// Path to the YAML run configuration.
    #[arg(short, long, global = true, default_value = "quizbench.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble the pipeline and emit its submission spec as JSON.
    Plan {
        /// Write the spec here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Execute the pipeline locally against JSONL datasets on disk.
    Run {
        /// Directory holding one subdirectory of *.jsonl partitions per dataset.
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

fn load_config(path: &PathBuf) -> Result<RunConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        QuizbenchError::Config(ConfigError::Invalid(format!(
            "cannot read {}: {e}",
            path.display()
        )))
    })?;
    let config = RunConfig::from_yaml(&content)?;
    config.validate()?;
    Ok(config)
}

async fn plan(config: &RunConfig, out: Option<PathBuf>) -> Result<()> {
    let version = RunIdentity::new();
    tracing::info!(version = %version, "pipeline version for this run");

    let assembled = assemble_fewshot_pipeline(config, &version)?;
    let spec = PipelineSpec::from_pipeline(&assembled.pipeline, version, assembled.metadata)?;
    let json = serde_json::to_string_pretty(&spec)?;

    match out {
        Some(path) => {
            std::fs::write(&path, json).map_err(|e| {
                QuizbenchError::Other(format!("cannot write {}: {e}", path.display()))
            })?;
            tracing::info!(path = %path.display(), "wrote pipeline spec");
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn run(config: &RunConfig, data_dir: PathBuf) -> Result<()> {
    let version = RunIdentity::new();
    tracing::info!(version = %version, "pipeline version for this run");
    tracing::info!(dataset = %config.mmlu_dataset, "evaluating dataset");

    let assembled = assemble_fewshot_pipeline(config, &version)?;

    let api_key = std::env::var(&config.model.api_key_env)
        .map_err(|_| ConfigError::MissingField(config.model.api_key_env.clone()))?;
    let model = Arc::new(OpenAiChatModel::new(
        config.model.endpoint.clone(),
        api_key,
        config.model.deployment.clone(),
    ));
    let store = Arc::new(FsDatasetStore::new(data_dir));
    let registry = standard_registry(store, model);

    let results = assembled
        .pipeline
        .execute(&registry, &BTreeMap::new())
        .await?;

    let report: ScoreReport =
        serde_json::from_value(results["fewshot_score"]["output_report"].clone())?;
    tracing::info!(
        total = report.total,
        correct = report.correct,
        failed = report.failed,
        accuracy = report.accuracy,
        "evaluation finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let outcome = match load_config(&cli.config) {
        Ok(config) => match cli.command {
            Command::Plan { out } => plan(&config, out).await,
            Command::Run { data_dir } => run(&config, data_dir).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = outcome {
        tracing::error!(error = %e, "quizbench failed");
        std::process::exit(1);
    }
}
