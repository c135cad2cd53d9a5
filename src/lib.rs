#![forbid(unsafe_code)]

//! # chatset
//!
//! Turn a file of prompts into a JSONL dataset of chat transcripts.
//!
//! Each non-blank line of the input is sent to an OpenRouter model under a
//! concurrency bound. Successful completions become one
//! `{"messages": [...]}` row each, written as they finish; failed requests
//! are counted and reported but never stop the run. When the model's pricing
//! is fully known, a running spend estimate is kept alongside the counts.

pub mod config;
pub mod gateway;
pub mod generate;
pub mod progress;

pub use config::{ConfigError, FileConfig, RunConfig};
pub use gateway::{ChatGateway, OpenRouterAdapter, PricingInfo, PricingLookup, ProviderError};
pub use generate::{
    generate_dataset, GenerationSettings, JsonlSink, LinePromptSource, PipelineError,
    ProgressObserver, ProgressSnapshot, RunOptions, RunStats, Scheduler,
};
