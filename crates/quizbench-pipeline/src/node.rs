use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a node input comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputRef {
    /// An external resource locator resolved at execution time.
    External { locator: String },
    /// The named output port of another node.
    Output { node: String, port: String },
}

impl InputRef {
    pub fn external(locator: impl Into<String>) -> Self {
        InputRef::External {
            locator: locator.into(),
        }
    }

    pub fn output(node: impl Into<String>, port: impl Into<String>) -> Self {
        InputRef::Output {
            node: node.into(),
            port: port.into(),
        }
    }
}

/// A named unit of work in the pipeline graph.
///
/// `component` identifies which registered component implementation runs the
/// node; `inputs` wires upstream outputs or external resources to input
/// names; `params` is a bundle of scalar configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobNode {
    pub name: String,
    pub component: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputRef>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    /// Compute target override; nodes without one run on the pipeline's
    /// default target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,
}

impl JobNode {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            inputs: BTreeMap::new(),
            params: BTreeMap::new(),
            compute: None,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, input: InputRef) -> Self {
        self.inputs.insert(name.into(), input);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_compute(mut self, compute: impl Into<String>) -> Self {
        self.compute = Some(compute.into());
        self
    }

    /// Names of nodes this node depends on.
    pub fn upstream(&self) -> impl Iterator<Item = &str> {
        self.inputs.values().filter_map(|input| match input {
            InputRef::Output { node, .. } => Some(node.as_str()),
            InputRef::External { .. } => None,
        })
    }
}
