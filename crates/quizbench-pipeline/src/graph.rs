use std::collections::{BTreeMap, HashMap, VecDeque};

use quizbench_core::error::{PipelineError, Result};

use crate::node::JobNode;

/// Builder for a pipeline DAG.
///
/// Add nodes with `add_node`, then call `compile()` to validate references,
/// reject cycles, and produce a `CompiledPipeline` with a fixed topological
/// order. Construction is pure: no I/O happens here.
#[derive(Debug, Default)]
pub struct PipelineGraph {
    nodes: Vec<JobNode>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph. Duplicate names are rejected.
    pub fn add_node(&mut self, node: JobNode) -> Result<&mut Self> {
        if self.nodes.iter().any(|n| n.name == node.name) {
            return Err(
                PipelineError::InvalidGraph(format!("Duplicate node name: '{}'", node.name)).into(),
            );
        }
        self.nodes.push(node);
        Ok(self)
    }

    /// Validate the graph and fix a topological execution order.
    pub fn compile(self) -> Result<CompiledPipeline> {
        // Every referenced upstream node must exist.
        for node in &self.nodes {
            for dep in node.upstream() {
                if !self.nodes.iter().any(|n| n.name == dep) {
                    return Err(PipelineError::InvalidGraph(format!(
                        "Unknown node '{dep}' referenced by '{}'",
                        node.name
                    ))
                    .into());
                }
            }
        }

        // Kahn's algorithm. Dependencies resolved in insertion order so the
        // resulting schedule is deterministic.
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut downstream: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in &self.nodes {
            let deps: Vec<&str> = node.upstream().collect();
            in_degree.insert(node.name.as_str(), deps.len());
            for dep in deps {
                downstream.entry(dep).or_default().push(node.name.as_str());
            }
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .filter(|n| in_degree[n.name.as_str()] == 0)
            .map(|n| n.name.as_str())
            .collect();

        let mut order: Vec<String> = Vec::with_capacity(self.nodes.len());
        while let Some(name) = queue.pop_front() {
            order.push(name.to_string());
            if let Some(next) = downstream.get(name) {
                for &dep_name in next {
                    let degree = in_degree
                        .get_mut(dep_name)
                        .ok_or_else(|| PipelineError::InvalidGraph(format!(
                            "Node '{dep_name}' missing from in-degree table"
                        )))?;
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dep_name);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .find(|n| !order.contains(&n.name))
                .map(|n| n.name.clone())
                .unwrap_or_default();
            return Err(PipelineError::CycleDetected { node: stuck }.into());
        }

        let nodes: BTreeMap<String, JobNode> = self
            .nodes
            .into_iter()
            .map(|n| (n.name.clone(), n))
            .collect();

        Ok(CompiledPipeline { nodes, order })
    }
}

/// A validated pipeline with a fixed topological execution order.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub(crate) nodes: BTreeMap<String, JobNode>,
    pub(crate) order: Vec<String>,
}

impl CompiledPipeline {
    pub fn node(&self, name: &str) -> Option<&JobNode> {
        self.nodes.get(name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Node names in execution order (upstream before downstream).
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }
}
