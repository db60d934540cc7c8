use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quizbench_core::error::{PipelineError, Result};

use crate::graph::CompiledPipeline;
use crate::node::JobNode;

/// Versioning token attached to every artifact a run produces.
///
/// Derived from wall-clock seconds, like the submitter scripts that came
/// before, with a short random suffix so two submissions in the same second
/// cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity(String);

impl RunIdentity {
    pub fn new() -> Self {
        let seconds = chrono::Utc::now().timestamp();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{seconds}-{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run metadata handed to the workspace collaborator alongside the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub experiment_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub default_compute_target: String,
    #[serde(default)]
    pub tags: std::collections::BTreeMap<String, String>,
}

/// Serializable projection of a compiled pipeline, ready for submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub version: RunIdentity,
    pub metadata: RunMetadata,
    /// Nodes in execution order.
    pub nodes: Vec<JobNode>,
}

impl PipelineSpec {
    pub fn from_pipeline(
        pipeline: &CompiledPipeline,
        version: RunIdentity,
        metadata: RunMetadata,
    ) -> Result<Self> {
        let mut nodes = Vec::with_capacity(pipeline.node_count());
        for name in pipeline.execution_order() {
            let node = pipeline.node(name).ok_or_else(|| {
                PipelineError::InvalidGraph(format!("Node '{name}' missing from pipeline"))
            })?;
            nodes.push(node.clone());
        }
        Ok(Self {
            version,
            metadata,
            nodes,
        })
    }
}

/// Handle returned by a workspace after accepting a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedJob {
    pub name: String,
}

/// Compute/workspace collaborator: accepts a pipeline spec plus run metadata
/// and returns a submitted-job handle. Execution ownership passes to the
/// workspace's scheduler; nothing in this crate blocks on it.
#[async_trait]
pub trait Workspace: Send + Sync {
    async fn submit(&self, spec: &PipelineSpec) -> Result<SubmittedJob>;
}
