use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;

use quizbench_core::error::Result;
use quizbench_core::message::Message;
use quizbench_core::model::{CallOptions, ChatModel, ChatResult, check_allowed_tokens};
use quizbench_core::record::{Dataset, GenerationOutcome, Record};
use quizbench_eval::prelude::*;

fn arb_record() -> impl Strategy<Value = Record> {
    (
        "[a-zA-Z0-9][a-zA-Z0-9 ?]{0,39}",                   // question
        prop::collection::vec("[a-zA-Z0-9 ]{1,20}", 2..6), // choices
    )
        .prop_flat_map(|(question, choices)| {
            let n = choices.len();
            (Just(question), Just(choices), 0..n)
        })
        .prop_map(|(question, choices, correct)| Record::new(question, choices, correct))
}

fn arb_dataset(max: usize) -> impl Strategy<Value = Dataset> {
    prop::collection::vec(arb_record(), 0..max).prop_map(Dataset::new)
}

/// Picks a deterministic pseudo-random member of the allowed set.
struct SpreadModel;

#[async_trait]
impl ChatModel for SpreadModel {
    async fn generate(&self, _messages: &[Message], _options: &CallOptions) -> Result<ChatResult> {
        Ok(ChatResult {
            message: Message::assistant("0"),
        })
    }

    async fn generate_constrained(
        &self,
        messages: &[Message],
        allowed: &[String],
    ) -> Result<String> {
        check_allowed_tokens(allowed)?;
        let pick = messages[1].content().len() % allowed.len();
        Ok(allowed[pick].clone())
    }

    fn model_name(&self) -> &str {
        "spread"
    }
}

proptest! {
    /// Splitting twice with the same selector yields identical output.
    #[test]
    fn split_is_idempotent(
        datasets in prop::collection::vec(arb_dataset(5), 1..4),
        pick in 0usize..4,
    ) {
        let mut source = FetchedDataset::new();
        for (i, ds) in datasets.iter().enumerate() {
            source = source.with_partition(format!("part{i}.jsonl"), ds.clone());
        }
        let selector = format!("part{}", pick % datasets.len());

        let first = split(&source, &selector).unwrap();
        let second = split(&source, &selector).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Generation output joins 1:1 with input for any worker-pool width.
    #[test]
    fn generation_preserves_join_keys(
        dataset in arb_dataset(20),
        workers in 1usize..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let generator = FewShotGenerator::new(Arc::new(SpreadModel), Vec::new(), workers, 100);
        let outputs = rt.block_on(generator.run(&dataset)).unwrap();

        prop_assert_eq!(outputs.len(), dataset.len());
        for (i, out) in outputs.iter().enumerate() {
            prop_assert_eq!(out.index, i);
            prop_assert_eq!(&out.record, &dataset.records[i]);
        }
    }

    /// Every non-failure result is a choice index in [0, K).
    #[test]
    fn generated_choices_are_in_range(dataset in arb_dataset(15)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let generator = FewShotGenerator::new(Arc::new(SpreadModel), Vec::new(), 4, 100);
        let outputs = rt.block_on(generator.run(&dataset)).unwrap();

        for out in &outputs {
            match out.outcome {
                GenerationOutcome::Choice { value } => {
                    prop_assert!(value < out.record.choices.len());
                }
                GenerationOutcome::Failed => {}
            }
        }
    }

    /// Accuracy is always within [0, 1].
    #[test]
    fn accuracy_is_bounded(dataset in arb_dataset(15)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let generator = FewShotGenerator::new(Arc::new(SpreadModel), Vec::new(), 4, 100);
        let outputs = rt.block_on(generator.run(&dataset)).unwrap();

        let report = score(&outputs, &dataset).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.accuracy));
        prop_assert_eq!(report.total, dataset.len());
    }

    /// The aggregate document preserves record count and order.
    #[test]
    fn aggregate_document_preserves_order(dataset in arb_dataset(10)) {
        let doc = to_aggregate_document(&dataset).unwrap();
        let items = doc.as_array().unwrap();
        prop_assert_eq!(items.len(), dataset.len());
        for (item, record) in items.iter().zip(dataset.records.iter()) {
            prop_assert_eq!(item["question"].as_str().unwrap(), record.question.as_str());
        }
    }
}
