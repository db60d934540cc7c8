use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use quizbench_core::error::{PipelineError, Result};

use crate::graph::CompiledPipeline;
use crate::node::InputRef;

/// A component implementation bound to a node's `component` identifier.
///
/// Inputs and outputs travel as JSON values keyed by port name, mirroring how
/// the remote scheduler moves datasets between jobs.
#[async_trait]
pub trait Component: Send + Sync {
    async fn run(
        &self,
        inputs: BTreeMap<String, Value>,
        params: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>>;
}

/// Registry mapping component identifiers to implementations.
#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, id: impl Into<String>, component: Arc<dyn Component>) -> Self {
        self.components.insert(id.into(), component);
        self
    }

    fn get(&self, id: &str) -> Option<&Arc<dyn Component>> {
        self.components.get(id)
    }
}

impl CompiledPipeline {
    /// Execute the pipeline in topological order.
    ///
    /// A node runs only after every upstream node it depends on has
    /// completed successfully; the first node failure aborts the run,
    /// reporting the node name and underlying error. External input
    /// locators are resolved from `externals`.
    pub async fn execute(
        &self,
        registry: &ComponentRegistry,
        externals: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, BTreeMap<String, Value>>> {
        let mut completed: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();

        for name in self.execution_order() {
            let node = self.node(name).ok_or_else(|| {
                PipelineError::InvalidGraph(format!("Node '{name}' missing during execution"))
            })?;

            let mut inputs = BTreeMap::new();
            for (input_name, input_ref) in &node.inputs {
                let value = match input_ref {
                    InputRef::External { locator } => externals.get(locator).cloned(),
                    InputRef::Output { node: dep, port } => completed
                        .get(dep)
                        .and_then(|outputs| outputs.get(port))
                        .cloned(),
                };
                let value = value.ok_or_else(|| PipelineError::MissingInput {
                    node: name.clone(),
                    input: input_name.clone(),
                })?;
                inputs.insert(input_name.clone(), value);
            }

            let component = registry.get(&node.component).ok_or_else(|| {
                PipelineError::InvalidGraph(format!(
                    "No component registered for '{}' (node '{name}')",
                    node.component
                ))
            })?;

            tracing::info!(node = %name, component = %node.component, "running pipeline node");
            let outputs = component.run(inputs, &node.params).await.map_err(|e| {
                PipelineError::NodeExecution {
                    node: name.clone(),
                    source: Box::new(e),
                }
            })?;

            completed.insert(name.clone(), outputs);
        }

        Ok(completed)
    }
}
