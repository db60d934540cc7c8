use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConvertError, Result};

/// A single multiple-choice question record.
///
/// Required fields match the benchmark schema; anything else in the source
/// line is carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub question: String,
    pub choices: Vec<String>,
    pub correct_answer: usize,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Record {
    pub fn new(question: impl Into<String>, choices: Vec<String>, correct_answer: usize) -> Self {
        Self {
            question: question.into(),
            choices,
            correct_answer,
            extra: serde_json::Map::new(),
        }
    }

    /// Check the required fields hold sensible values.
    ///
    /// Returns the reason a record is malformed, or `None` if it is fine.
    pub fn malformed_reason(&self) -> Option<String> {
        if self.question.trim().is_empty() {
            return Some("empty question".into());
        }
        if self.choices.is_empty() {
            return Some("empty choices".into());
        }
        if self.correct_answer >= self.choices.len() {
            return Some(format!(
                "correct_answer {} out of range for {} choices",
                self.correct_answer,
                self.choices.len()
            ));
        }
        None
    }
}

/// An ordered, immutable sequence of records.
///
/// Stages never mutate a dataset in place; every stage output is a fresh
/// `Dataset` value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse line-delimited JSON records (one object per line).
    ///
    /// Blank lines are skipped. Line numbers in errors are 1-based.
    pub fn from_jsonl(content: &str) -> Result<Self> {
        let mut records = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Record =
                serde_json::from_str(line).map_err(|e| ConvertError::MalformedRecord {
                    line: i + 1,
                    reason: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    /// Serialize as line-delimited JSON, one record per line, in order.
    pub fn to_jsonl(&self) -> Result<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// The per-record result of the few-shot generation stage.
///
/// `Failed` is an explicit marker so that scoring can distinguish "could not
/// generate" from a wrong answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Choice { value: usize },
    Failed,
}

/// A generation-stage output record, joined to its input by `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRecord {
    /// Position of the source record in the input dataset. This is the stable
    /// join key; output order never depends on worker completion order.
    pub index: usize,
    pub record: Record,
    pub outcome: GenerationOutcome,
}
