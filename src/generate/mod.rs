//! Prompt-file → JSONL dataset generation.
//!
//! The pieces, leaves first:
//! - [`source`]: lazy prompt reader
//! - [`sink`]: serialized JSONL writer
//! - [`cost`]: spend estimate from fully-known pricing
//! - [`stats`]: counters and progress notification
//! - [`scheduler`]: bounded-concurrency driver
//!
//! Output rows are written in completion order, not input order.

pub mod cost;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod stats;

use std::num::NonZeroUsize;

use crate::gateway::{
    ChatGateway, ChatRequest, FinishReason, PricingInfo, ProviderPreferences, ReasoningEffort,
};

pub use cost::CostAccumulator;
pub use record::{assistant_content, Completion, CompletionOutcome, OutputRecord};
pub use scheduler::{PipelineError, Scheduler, TaskOutcome};
pub use sink::{JsonlSink, SinkError, SinkWorker};
pub use source::{count_prompts, LinePromptSource, PromptSource, PromptTask, SourceError};
pub use stats::{
    NoopObserver, ProgressObserver, ProgressSnapshot, RunStats, StatsReporter, TaskStatus,
};

/// Per-request settings shared by every prompt in a run.
#[derive(Debug, Clone, Default)]
pub struct GenerationSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    /// Keep the system message in output rows.
    pub store_system: bool,
    pub provider: Option<ProviderPreferences>,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// The request always carries the system prompt, whether or not it is
    /// stored in the row.
    pub fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest::prompt(&self.model, self.system_prompt.as_deref(), prompt)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .provider(self.provider.clone())
            .reasoning_effort(self.reasoning_effort)
    }
}

/// Run-level knobs that are not part of the request.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub max_concurrent: NonZeroUsize,
    /// Cost is tracked only when this is fully known.
    pub pricing: Option<PricingInfo>,
    /// Total prompt count for progress display, if known up front.
    pub total: Option<u64>,
}

/// Complete one prompt and write its row. Request failures are returned as
/// `TaskOutcome::Failure`; only sink failures are errors.
pub async fn process_prompt<G: ChatGateway + ?Sized>(
    gateway: &G,
    settings: &GenerationSettings,
    sink: &JsonlSink,
    task: PromptTask,
) -> Result<TaskOutcome, PipelineError> {
    let result = gateway.chat(settings.request(&task.text)).await;
    if let Ok(resp) = &result {
        tracing::debug!(
            line = task.line_number,
            latency_ms = resp.latency.as_millis() as u64,
            finish_reason = ?resp.finish_reason,
            "completion received"
        );
        // Truncated completions are still written.
        if resp.finish_reason == FinishReason::Length {
            tracing::warn!(
                line = task.line_number,
                "completion stopped at the token limit and may be cut off"
            );
        }
    }
    match CompletionOutcome::from(result) {
        CompletionOutcome::Success(completion) => {
            let record = OutputRecord::build(
                settings.system_prompt.as_deref(),
                settings.store_system,
                &task.text,
                &completion,
            );
            sink.append_json(&record).await?;
            Ok(TaskOutcome::Success {
                usage: completion.usage,
            })
        }
        CompletionOutcome::Failure { message } => Ok(TaskOutcome::Failure { message }),
    }
}

/// Generate a dataset: every prompt from `source` becomes at most one row in
/// `sink`. Returns the final counters, or the first fatal source/sink error.
pub async fn generate_dataset<G, S>(
    gateway: &G,
    settings: &GenerationSettings,
    source: &mut S,
    sink: &JsonlSink,
    options: RunOptions,
    observer: &dyn ProgressObserver,
) -> Result<RunStats, PipelineError>
where
    G: ChatGateway + ?Sized,
    S: PromptSource + ?Sized,
{
    let mut cost = CostAccumulator::new(options.pricing);
    let mut reporter = StatsReporter::new(options.total, cost.is_tracking(), observer);
    let scheduler = Scheduler::new(options.max_concurrent);

    tracing::info!(
        model = %settings.model,
        concurrency = scheduler.max_concurrent(),
        cost_tracking = cost.is_tracking(),
        "starting generation"
    );

    let stats = scheduler
        .run(
            source,
            |task| process_prompt(gateway, settings, sink, task),
            &mut cost,
            &mut reporter,
        )
        .await?;

    tracing::info!(
        completed = stats.completed,
        ok = stats.ok,
        err = stats.err,
        spend_usd = stats.spend_usd,
        "generation finished"
    );
    Ok(stats)
}
