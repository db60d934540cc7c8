pub mod assemble;
pub mod components;
pub mod graph;
pub mod node;
pub mod runner;
pub mod submit;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assemble::{AssembledPipeline, assemble_fewshot_pipeline};
    pub use crate::components::standard_registry;
    pub use crate::graph::{CompiledPipeline, PipelineGraph};
    pub use crate::node::{InputRef, JobNode};
    pub use crate::runner::{Component, ComponentRegistry};
    pub use crate::submit::{PipelineSpec, RunIdentity, RunMetadata, SubmittedJob, Workspace};
}
