use quizbench_core::error::{ConvertError, Result};
use quizbench_core::record::Dataset;
use serde_json::Value;

/// Collapse a line-delimited dataset into a single aggregate JSON document.
///
/// The output is a JSON array with one element per input record, in input
/// order. Order matters downstream: the exemplar pool is presented to the
/// model exactly as it appears here.
pub fn to_aggregate_document(dataset: &Dataset) -> Result<Value> {
    let mut items = Vec::with_capacity(dataset.len());
    for (i, record) in dataset.records.iter().enumerate() {
        if let Some(reason) = record.malformed_reason() {
            return Err(ConvertError::MalformedRecord {
                line: i + 1,
                reason,
            }
            .into());
        }
        items.push(serde_json::to_value(record)?);
    }
    Ok(Value::Array(items))
}
