use thiserror::Error;

/// Top-level error type for the quizbench pipeline.
#[derive(Debug, Error)]
pub enum QuizbenchError {
    #[error("Split error: {0}")]
    Split(#[from] SplitError),

    #[error("Convert error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Score error: {0}")]
    Score(#[from] ScoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors from the dataset splitter stage.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("No partition matches selector '{selector}'")]
    SelectorNotFound { selector: String },
}

/// Errors from the format converter stage and JSONL parsing.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },
}

/// Errors from the few-shot generation stage.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Error budget exceeded: {failures} failures (budget {budget})")]
    ErrorBudgetExceeded { failures: usize, budget: usize },

    #[error("Generation call failed: {0}")]
    Call(#[from] ModelError),
}

/// Errors from the scoring stage.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Schema mismatch between generated and source datasets: {detail}")]
    SchemaMismatch { detail: String },
}

/// Errors from pipeline graph construction and execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid pipeline: {0}")]
    InvalidGraph(String),

    #[error("Cycle detected in pipeline graph involving node '{node}'")]
    CycleDetected { node: String },

    #[error("Missing input '{input}' for node '{node}'")]
    MissingInput { node: String, input: String },

    #[error("Node '{node}' failed: {source}")]
    NodeExecution {
        node: String,
        source: Box<QuizbenchError>,
    },
}

/// Errors from the run configuration surface.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config field: {0}")]
    MissingField(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors from a model-invocation collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API request failed: {0}")]
    ApiRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },
}

pub type Result<T> = std::result::Result<T, QuizbenchError>;
