use std::path::{Path, PathBuf};

use async_trait::async_trait;

use quizbench_core::error::{QuizbenchError, Result};
use quizbench_core::record::Dataset;

use crate::split::FetchedDataset;

/// Dataset-storage collaborator: resolves a dataset reference to partitioned
/// line-delimited content.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Fetch every partition of the named dataset.
    async fn fetch(&self, dataset: &str) -> Result<FetchedDataset>;
}

/// Filesystem-backed store: a dataset is a directory of `*.jsonl` files, one
/// partition per file.
pub struct FsDatasetStore {
    root: PathBuf,
}

impl FsDatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DatasetStore for FsDatasetStore {
    async fn fetch(&self, dataset: &str) -> Result<FetchedDataset> {
        let dir = self.root.join(dataset);
        let mut names = list_jsonl_files(&dir).await?;
        // Stable partition order regardless of directory iteration order.
        names.sort();

        let mut fetched = FetchedDataset::new();
        for name in names {
            let content = tokio::fs::read_to_string(dir.join(&name))
                .await
                .map_err(|e| QuizbenchError::Other(format!("failed to read {name}: {e}")))?;
            fetched = fetched.with_partition(name, Dataset::from_jsonl(&content)?);
        }

        tracing::debug!(dataset, partitions = ?fetched.partition_names(), "fetched dataset");
        Ok(fetched)
    }
}

async fn list_jsonl_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| QuizbenchError::Other(format!("failed to read {}: {e}", dir.display())))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| QuizbenchError::Other(format!("failed to read {}: {e}", dir.display())))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".jsonl") {
            names.push(name);
        }
    }
    Ok(names)
}
