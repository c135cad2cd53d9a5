#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatset::config::{FileConfig, RunConfig};
use chatset::gateway::{
    resolve_pricing, OpenRouterAdapter, PricingResolution, ProviderPreferences, ReasoningEffort,
};
use chatset::generate::{
    count_prompts, generate_dataset, JsonlSink, LinePromptSource, ProgressObserver, RunOptions,
};
use chatset::progress::{summary_line, BarObserver, LogObserver};

#[derive(Parser)]
#[command(
    name = "chatset",
    version,
    about = "Turn a prompt file into a JSONL dataset of chat transcripts"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Complete every prompt in a file and write one JSONL row per success
    ///
    /// Rows are written as requests finish, so their order can differ from
    /// the input order.
    Generate(GenerateArgs),
    /// Show the pricing that cost tracking would use for a model
    Pricing {
        /// OpenRouter model ID
        #[arg(long)]
        model: String,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// YAML or JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// OpenRouter model ID
    #[arg(long)]
    model: Option<String>,

    /// Prompt file, one prompt per line
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Output JSONL file (truncated at start)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// System prompt sent with every request
    #[arg(long)]
    system_prompt: Option<String>,

    /// Also write the system prompt into each row
    #[arg(long, conflicts_with = "no_store_system")]
    store_system: bool,

    /// Keep the system prompt out of rows even if the config file stores it
    #[arg(long)]
    no_store_system: bool,

    /// Maximum concurrent requests
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,

    #[arg(long, value_enum)]
    reasoning_effort: Option<ReasoningEffort>,

    /// Comma-separated provider order for OpenRouter routing
    #[arg(long, value_delimiter = ',')]
    provider_order: Option<Vec<String>>,

    /// Disallow fallback to providers outside --provider-order
    #[arg(long)]
    no_fallbacks: bool,

    /// Provider sort: price, throughput, or latency
    #[arg(long)]
    provider_sort: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

impl GenerateArgs {
    fn overrides(&self) -> FileConfig {
        let provider = ProviderPreferences {
            order: self.provider_order.clone(),
            allow_fallbacks: self.no_fallbacks.then_some(false),
            sort: self.provider_sort.clone(),
            ..Default::default()
        };
        FileConfig {
            model: self.model.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            system_prompt: self.system_prompt.clone(),
            store_system: match (self.store_system, self.no_store_system) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            concurrency: self.concurrency,
            reasoning_effort: self.reasoning_effort,
            provider: (!provider.is_empty()).then_some(provider),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            pricing: None,
        }
    }
}

fn init_tracing(verbose: u8, interactive: bool) {
    let default = match verbose {
        // Keep the progress bar readable; warnings go through the bar instead.
        0 if interactive => "chatset=warn",
        0 => "chatset=info",
        1 => "chatset=debug",
        _ => "chatset=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => {
            let interactive = !args.no_progress && std::io::stderr().is_terminal();
            init_tracing(cli.verbose, interactive);
            run_generate(args, interactive).await?;
        }
        Commands::Pricing { model } => {
            init_tracing(cli.verbose, false);
            let adapter = OpenRouterAdapter::from_env()?;
            match resolve_pricing(&adapter, &model, None).await {
                PricingResolution::Tracked(p) => {
                    println!("model:      {model}");
                    println!("prompt:     ${:.10}/token", p.prompt_per_token_usd);
                    println!("completion: ${:.10}/token", p.completion_per_token_usd);
                    println!("request:    ${:.6}", p.per_request_usd);
                }
                PricingResolution::Disabled { reason } => println!("{reason}"),
            }
        }
    }

    Ok(())
}

async fn run_generate(
    args: GenerateArgs,
    interactive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = RunConfig::resolve(file.merge(args.overrides()))?;
    let adapter = OpenRouterAdapter::from_env()?;

    let total = count_prompts(&config.input).await?;

    // Before the bar starts drawing.
    eprintln!(
        "[generate] {} prompts from {} -> {} ({} concurrent, model {})",
        total,
        config.input.display(),
        config.output.display(),
        config.concurrency,
        config.generation.model,
    );

    let bar = interactive.then(|| BarObserver::new(Some(total)));
    let observer: &dyn ProgressObserver = match &bar {
        Some(bar) => bar,
        None => &LogObserver,
    };

    let explicit = config.pricing.map(|p| p.resolve());
    let resolution = resolve_pricing(&adapter, &config.generation.model, explicit).await;
    if let PricingResolution::Disabled { reason } = &resolution {
        observer.on_warning(reason);
    }

    let mut source = LinePromptSource::open(&config.input).await?;
    let (sink, worker) = JsonlSink::create(&config.output).await?;

    let options = RunOptions {
        max_concurrent: config.concurrency,
        pricing: resolution.pricing(),
        total: Some(total),
    };
    let result = generate_dataset(
        &adapter,
        &config.generation,
        &mut source,
        &sink,
        options,
        observer,
    )
    .await;

    drop(sink);
    let joined = worker.join().await;

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            return Err(e.into());
        }
    };
    let written = joined?;

    match &bar {
        Some(bar) => bar.finish(&stats),
        None => eprintln!("[generate] {}", summary_line(&stats)),
    }
    eprintln!(
        "[generate] {} rows written to {}",
        written,
        config.output.display()
    );

    Ok(())
}
