use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use quizbench_core::error::{GenerationError, QuizbenchError, Result};
use quizbench_core::message::Message;
use quizbench_core::model::ChatModel;
use quizbench_core::record::{Dataset, GeneratedRecord, GenerationOutcome, Record};

/// Fixed instruction preamble for every prompt.
pub const INSTRUCTION: &str = "You are a student taking a multiple choice test.\n\
You will be shown a question, followed by numbered multiple choice answers.\n\
Respond with the number corresponding to the best answer.";

/// The legal output alphabet for a question with `choice_count` choices.
pub fn allowed_tokens(choice_count: usize) -> Vec<String> {
    (0..choice_count).map(|i| i.to_string()).collect()
}

fn render_choices(out: &mut String, choices: &[String]) {
    for (j, choice) in choices.iter().enumerate() {
        let _ = writeln!(out, "{j} : {choice}");
    }
}

/// Assemble the full prompt for one target question.
///
/// The system turn carries the instruction preamble and, when the exemplar
/// pool is non-empty, every exemplar rendered in pool order. The user turn
/// carries the target question and its enumerated choices. An empty pool
/// yields a plain zero-shot prompt.
pub fn build_prompt(question: &str, choices: &[String], exemplars: &[Record]) -> Vec<Message> {
    let mut system = String::from(INSTRUCTION);

    if !exemplars.is_empty() {
        system.push_str("\n\nHere are some examples to help you:\n");
        for (i, example) in exemplars.iter().enumerate() {
            let _ = writeln!(system, "\nExample {i}");
            let _ = writeln!(system, "{}", example.question);
            render_choices(&mut system, &example.choices);
            let _ = writeln!(system, "Correct Answer: {}", example.correct_answer);
        }
    }

    let mut user = String::new();
    let _ = writeln!(user, "{question}");
    render_choices(&mut user, choices);
    user.push_str("Correct Answer: ");

    vec![Message::system(system), Message::user(user)]
}

/// The few-shot generation stage.
///
/// Processes every record of a target dataset through a bounded worker pool.
/// Workers share only the read-only exemplar pool and the model handle; the
/// failure counter is the single piece of mutable shared state.
pub struct FewShotGenerator {
    model: Arc<dyn ChatModel>,
    exemplars: Arc<Vec<Record>>,
    workers: usize,
    max_errors: usize,
}

struct Shared {
    queue: Mutex<VecDeque<(usize, Record)>>,
    failures: AtomicUsize,
    cancelled: AtomicBool,
}

impl FewShotGenerator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        exemplars: Vec<Record>,
        workers: usize,
        max_errors: usize,
    ) -> Self {
        Self {
            model,
            exemplars: Arc::new(exemplars),
            workers: workers.max(1),
            max_errors,
        }
    }

    /// Generate a constrained answer for every record in `dataset`.
    ///
    /// Output is parallel to the input: same count, joined by record index,
    /// never by worker completion order. Individual call failures are
    /// recorded as `GenerationOutcome::Failed` and counted; once the count
    /// reaches the budget the whole stage aborts with `ErrorBudgetExceeded`
    /// and no partial results are emitted. The budget is checked before each
    /// new unit is dispatched.
    pub async fn run(&self, dataset: &Dataset) -> Result<Vec<GeneratedRecord>> {
        let total = dataset.len();
        tracing::info!(
            total,
            workers = self.workers,
            max_errors = self.max_errors,
            exemplars = self.exemplars.len(),
            "starting few-shot generation"
        );

        let shared = Arc::new(Shared {
            queue: Mutex::new(
                dataset
                    .records
                    .iter()
                    .cloned()
                    .enumerate()
                    .collect::<VecDeque<_>>(),
            ),
            failures: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });

        let mut handles = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let model = Arc::clone(&self.model);
            let exemplars = Arc::clone(&self.exemplars);
            let shared = Arc::clone(&shared);
            let max_errors = self.max_errors;
            handles.push(tokio::spawn(async move {
                worker_loop(model, exemplars, shared, max_errors).await
            }));
        }

        let mut outputs: Vec<GeneratedRecord> = Vec::with_capacity(total);
        for joined in futures::future::join_all(handles).await {
            let worker_outputs = joined
                .map_err(|e| QuizbenchError::Other(format!("generation worker panicked: {e}")))?;
            outputs.extend(worker_outputs);
        }

        let failures = shared.failures.load(Ordering::SeqCst);
        if shared.cancelled.load(Ordering::SeqCst) {
            tracing::error!(failures, budget = self.max_errors, "error budget exceeded");
            return Err(GenerationError::ErrorBudgetExceeded {
                failures,
                budget: self.max_errors,
            }
            .into());
        }

        outputs.sort_by_key(|r| r.index);
        if outputs.len() != total || outputs.iter().enumerate().any(|(i, r)| r.index != i) {
            return Err(QuizbenchError::Other(format!(
                "generation output does not join 1:1 with input ({} outputs for {} inputs)",
                outputs.len(),
                total
            )));
        }

        tracing::info!(total, failures, "few-shot generation finished");
        Ok(outputs)
    }
}

async fn worker_loop(
    model: Arc<dyn ChatModel>,
    exemplars: Arc<Vec<Record>>,
    shared: Arc<Shared>,
    max_errors: usize,
) -> Vec<GeneratedRecord> {
    let mut outputs = Vec::new();

    loop {
        if shared.cancelled.load(Ordering::SeqCst) {
            break;
        }
        // Conservative budget policy: check before dispatching a new unit.
        if shared.failures.load(Ordering::SeqCst) >= max_errors {
            shared.cancelled.store(true, Ordering::SeqCst);
            break;
        }

        let next = shared.queue.lock().await.pop_front();
        let Some((index, record)) = next else {
            break;
        };

        let prompt = build_prompt(&record.question, &record.choices, &exemplars);
        let allowed = allowed_tokens(record.choices.len());

        let outcome = match model.generate_constrained(&prompt, &allowed).await {
            Ok(token) => match token.parse::<usize>() {
                Ok(value) if value < record.choices.len() => {
                    GenerationOutcome::Choice { value }
                }
                _ => {
                    tracing::warn!(index, token = %token, "model returned token outside allowed set");
                    count_failure(&shared, index, max_errors);
                    GenerationOutcome::Failed
                }
            },
            Err(e) => {
                tracing::warn!(index, error = %e, "generation call failed");
                count_failure(&shared, index, max_errors);
                GenerationOutcome::Failed
            }
        };

        outputs.push(GeneratedRecord {
            index,
            record,
            outcome,
        });
    }

    outputs
}

fn count_failure(shared: &Shared, index: usize, max_errors: usize) {
    let failures = shared.failures.fetch_add(1, Ordering::SeqCst) + 1;
    if failures >= max_errors {
        tracing::warn!(index, failures, "failure budget reached, cancelling");
        shared.cancelled.store(true, Ordering::SeqCst);
    }
}
