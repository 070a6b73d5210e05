//! Command-line front end for the signalforge pipeline.

#[macro_use]
extern crate tracing;

mod stores;

use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use signalforge_core::conversation::MemoryPolicy;
use signalforge_core::intake::{self, IntakeConfig};
use signalforge_core::pipeline::{self, BatchConfig, Language};
use signalforge_core::store::PipelineTrigger;
use signalforge_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

use crate::stores::{FsObjectStore, JsonRecordStore, NoopTrigger, WebhookTrigger};

#[derive(Parser)]
#[command(name = "signalforge", version, about = "Generate signal-data artifacts and their deployment script")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the model for a list of items and seed a ready work record.
    Request(RequestArgs),
    /// Run the batch for the first ready work record.
    Build(BuildArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// Model name. Overrides `OPENAI_MODEL`.
    #[arg(long)]
    model: Option<String>,

    /// API base URL. Overrides `OPENAI_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Stream responses instead of waiting for the full completion.
    #[arg(long)]
    streaming: bool,
}

#[derive(Args)]
struct RequestArgs {
    /// Owner the work record is filed under.
    #[arg(long)]
    owner: String,

    /// Industry the items should belong to.
    #[arg(long)]
    industry: String,

    /// How many items to ask for.
    #[arg(long, default_value_t = 10)]
    count: u32,

    /// Name of the downstream pipeline to trigger.
    #[arg(long, default_value = "artifact-batch")]
    pipeline: String,

    /// Path of the work record file.
    #[arg(long)]
    records: PathBuf,

    /// URL to POST the pipeline trigger to. Logs instead when absent.
    #[arg(long)]
    trigger_url: Option<String>,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct BuildArgs {
    /// Path of the work record file.
    #[arg(long)]
    records: PathBuf,

    /// Local directory artifacts and the deploy script are written to.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Root directory of the published artifact tree.
    #[arg(long)]
    artifact_root: PathBuf,

    /// Locator of the data sink the deploy script uploads to.
    #[arg(long)]
    data_sink: String,

    /// Target language of the generated artifacts.
    #[arg(long, default_value = "python")]
    language: String,

    /// Expertise qualifier for the code prompt.
    #[arg(long, default_value = "very skilled")]
    context: String,

    /// Filter for artifact output files worth uploading.
    #[arg(long, default_value = "*.csv")]
    data_glob: String,

    /// Token budget per code call.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature for the code calls.
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling probability mass for the code calls.
    #[arg(long)]
    top_p: Option<f32>,

    /// Keep only the most recent N dialogue turns between items.
    #[arg(long)]
    memory_window: Option<usize>,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Request(args) => run_request(args).await,
        Command::Build(args) => run_build(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_request(args: RequestArgs) -> Result<(), Box<dyn Error>> {
    let provider = model_provider(&args.model)?;
    let records = JsonRecordStore::open(&args.records).await?;
    let trigger: Box<dyn PipelineTrigger> = match &args.trigger_url {
        Some(url) => Box::new(WebhookTrigger::new(url.clone())),
        None => Box::new(NoopTrigger),
    };

    let config = IntakeConfig::new(args.count, &args.industry, &args.pipeline);
    let items = intake::request_items(
        provider,
        &args.owner,
        &config,
        &records,
        trigger.as_ref(),
    )
    .await?;

    println!("Recorded {} items for {}:", items.len(), args.owner);
    for item in &items {
        println!("  {item}");
    }
    Ok(())
}

async fn run_build(args: BuildArgs) -> Result<(), Box<dyn Error>> {
    let provider = model_provider(&args.model)?;
    let records = JsonRecordStore::open(&args.records).await?;
    let Some(record) = pipeline::find_ready(&records).await? else {
        println!("No work record is ready");
        return Ok(());
    };

    let mut config = BatchConfig::new(&args.workdir, args.data_sink);
    config.language = Language::from_name(&args.language);
    config.context = args.context;
    config.data_glob = args.data_glob;
    if let Some(max_tokens) = args.max_tokens {
        config.params.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        config.params.temperature = temperature;
    }
    if let Some(top_p) = args.top_p {
        config.params.top_p = top_p;
    }
    if let Some(window) = args.memory_window {
        config.memory = MemoryPolicy::Window(window);
    }
    tokio::fs::create_dir_all(&args.workdir).await?;

    let objects = FsObjectStore::new(&args.artifact_root);
    let outcomes =
        pipeline::run_batch(provider, &record, &config, &objects, &records)
            .await?;

    println!(
        "Processed record for {} ({} items):",
        record.owner_id,
        outcomes.len()
    );
    for outcome in &outcomes {
        match &outcome.error {
            None => println!("  ok    {} ({})", outcome.name, outcome.slug),
            Some(err) => println!("  fail  {}: {err}", outcome.name),
        }
    }
    Ok(())
}

fn model_provider(args: &ModelArgs) -> Result<OpenAIProvider, Box<dyn Error>> {
    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        return Err("OPENAI_API_KEY environment variable is not set".into());
    };

    let mut builder = OpenAIConfigBuilder::with_api_key(api_key)
        .with_streaming(args.streaming);
    if let Some(model) =
        args.model.clone().or_else(|| env::var("OPENAI_MODEL").ok())
    {
        builder = builder.with_model(model);
    }
    if let Some(base_url) = args
        .base_url
        .clone()
        .or_else(|| env::var("OPENAI_BASE_URL").ok())
    {
        builder = builder.with_base_url(base_url);
    }
    Ok(OpenAIProvider::new(builder.build()))
}
