use quizbench_core::error::{Result, SplitError};
use quizbench_core::record::Dataset;
use serde::{Deserialize, Serialize};

/// A fetched benchmark dataset: named partitions in a stable order, as
/// resolved by the dataset-storage collaborator (one partition per JSONL
/// file, e.g. `test.jsonl`, `dev.jsonl`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchedDataset {
    partitions: Vec<(String, Dataset)>,
}

impl FetchedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition(mut self, name: impl Into<String>, dataset: Dataset) -> Self {
        self.partitions.push((name.into(), dataset));
        self
    }

    pub fn partition_names(&self) -> Vec<&str> {
        self.partitions.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    fn find(&self, selector: &str) -> Option<&Dataset> {
        let pattern = format!("{selector}.jsonl");
        self.partitions
            .iter()
            .find(|(name, _)| name == selector || name == &pattern)
            .map(|(_, ds)| ds)
    }
}

/// Extract the partition matching `selector` as a fresh dataset.
///
/// A selector `test` matches a partition named either `test` or `test.jsonl`.
/// The source is never mutated, and the same source + selector always yields
/// the same output.
pub fn split(source: &FetchedDataset, selector: &str) -> Result<Dataset> {
    match source.find(selector) {
        Some(dataset) => Ok(dataset.clone()),
        None => Err(SplitError::SelectorNotFound {
            selector: selector.to_string(),
        }
        .into()),
    }
}
