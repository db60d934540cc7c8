pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod record;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{ModelConfig, PipelineSettings, RunConfig};
    pub use crate::error::{
        ConfigError, ConvertError, GenerationError, ModelError, PipelineError, QuizbenchError,
        Result, ScoreError, SplitError,
    };
    pub use crate::message::Message;
    pub use crate::model::{CallOptions, ChatModel, ChatResult};
    pub use crate::record::{Dataset, GeneratedRecord, GenerationOutcome, Record};
}
