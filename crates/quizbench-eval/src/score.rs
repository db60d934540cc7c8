use serde::{Deserialize, Serialize};

use quizbench_core::error::{Result, ScoreError};
use quizbench_core::record::{Dataset, GeneratedRecord, GenerationOutcome};

/// Per-record scoring verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordScore {
    pub index: usize,
    pub correct: bool,
    /// True when the generation stage emitted a failure marker instead of a
    /// choice. Always scored incorrect, but reported separately so "wrong"
    /// and "could not generate" stay distinguishable.
    pub failed: bool,
}

/// Aggregate report for one scored dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub total: usize,
    pub correct: usize,
    pub failed: usize,
    pub accuracy: f64,
    pub results: Vec<RecordScore>,
}

/// Score generated choices against ground truth from the source dataset.
///
/// The two datasets must agree in length and join key (record index). A
/// `Failed` outcome counts as incorrect. Accuracy is correct/total, 0.0 for
/// an empty dataset.
pub fn score(outputs: &[GeneratedRecord], source: &Dataset) -> Result<ScoreReport> {
    if outputs.len() != source.len() {
        return Err(ScoreError::SchemaMismatch {
            detail: format!(
                "length {} (generated) vs {} (source)",
                outputs.len(),
                source.len()
            ),
        }
        .into());
    }

    let mut results = Vec::with_capacity(outputs.len());
    let mut correct = 0;
    let mut failed = 0;

    for (i, (output, source_record)) in outputs.iter().zip(source.records.iter()).enumerate() {
        if output.index != i {
            return Err(ScoreError::SchemaMismatch {
                detail: format!("generated record at position {i} carries join key {}", output.index),
            }
            .into());
        }

        let (is_correct, is_failed) = match output.outcome {
            GenerationOutcome::Choice { value } => (value == source_record.correct_answer, false),
            GenerationOutcome::Failed => (false, true),
        };
        if is_correct {
            correct += 1;
        }
        if is_failed {
            failed += 1;
        }
        results.push(RecordScore {
            index: i,
            correct: is_correct,
            failed: is_failed,
        });
    }

    let total = results.len();
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };

    tracing::info!(total, correct, failed, accuracy, "scored dataset");

    Ok(ScoreReport {
        total,
        correct,
        failed,
        accuracy,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizbench_core::record::Record;

    fn record(correct_answer: usize) -> Record {
        Record::new(
            "q",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer,
        )
    }

    fn generated(index: usize, outcome: GenerationOutcome) -> GeneratedRecord {
        GeneratedRecord {
            index,
            record: record(2),
            outcome,
        }
    }

    #[test]
    fn all_correct_scores_one() {
        let source = Dataset::new(vec![record(2), record(2), record(2)]);
        let outputs: Vec<_> = (0..3)
            .map(|i| generated(i, GenerationOutcome::Choice { value: 2 }))
            .collect();
        let report = score(&outputs, &source).unwrap();
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.correct, 3);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn none_correct_scores_zero() {
        let source = Dataset::new(vec![record(2), record(2)]);
        let outputs: Vec<_> = (0..2)
            .map(|i| generated(i, GenerationOutcome::Choice { value: 0 }))
            .collect();
        let report = score(&outputs, &source).unwrap();
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn four_choice_scenario() {
        // ground truth 2: choice 2 correct, choice 1 incorrect, marker incorrect
        let source = Dataset::new(vec![record(2), record(2), record(2)]);
        let outputs = vec![
            generated(0, GenerationOutcome::Choice { value: 2 }),
            generated(1, GenerationOutcome::Choice { value: 1 }),
            generated(2, GenerationOutcome::Failed),
        ];
        let report = score(&outputs, &source).unwrap();
        assert!(report.results[0].correct);
        assert!(!report.results[1].correct);
        assert!(!report.results[2].correct);
        assert!(report.results[2].failed);
        assert!(!report.results[1].failed);
        assert_eq!(report.failed, 1);
        assert!((report.accuracy - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn length_mismatch_fails() {
        let source = Dataset::new(vec![record(2), record(2)]);
        let outputs = vec![generated(0, GenerationOutcome::Choice { value: 2 })];
        let err = score(&outputs, &source).unwrap_err();
        assert!(err.to_string().contains("length 1"));
    }

    #[test]
    fn join_key_mismatch_fails() {
        let source = Dataset::new(vec![record(2), record(2)]);
        let outputs = vec![
            generated(1, GenerationOutcome::Choice { value: 2 }),
            generated(0, GenerationOutcome::Choice { value: 2 }),
        ];
        let err = score(&outputs, &source).unwrap_err();
        assert!(err.to_string().contains("join key"));
    }

    #[test]
    fn empty_dataset_scores_zero_without_panic() {
        let report = score(&[], &Dataset::default()).unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(report.accuracy, 0.0);
    }
}
