use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::{debug, error};

use llm_compare::client::await_reply;
use llm_compare::{render, CompareBackend, CompareConfig, HttpService};

/// Send one prompt to several models and show the answers side by side
#[derive(Parser, Debug)]
#[command(name = "llm-compare")]
#[command(about = "Compare answers from several LLMs", long_about = None)]
struct Args
{   /// Prompt to send
    #[arg(required_unless_present = "list_models")]
    prompt: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Comparison server base URL
    #[arg(long, env = "LLM_COMPARE_API")]
    api_base: Option<String>,

    /// Comma-separated model ids (defaults to the first few listed)
    #[arg(short, long, value_delimiter = ',')]
    models: Vec<String>,

    /// Show token usage and rate-limit details
    #[arg(long)]
    metadata: bool,

    /// Print records as JSON instead of cards
    #[arg(long)]
    json: bool,

    /// Only list the available models
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main()
{   env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await
    {   error!("{}", e);
        eprintln!("llm-compare: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), llm_compare::Error>
{   let mut config = match &args.config
    {   Some(path) => CompareConfig::from_json_file(path)?
      , None => CompareConfig::default()
    };
    if let Some(base) = args.api_base
    {   config.api_base = base;
    }
    // A one-shot run only needs the probe tied to the query itself
    config.health_interval_secs = None;
    debug!("Effective config: {:?}", config);

    let service = Arc::new(HttpService::new(&config)?);
    let backend = CompareBackend::new(service, config);

    let available = await_reply(backend.load_models().await?).await?;
    if args.list_models
    {   for model in &available
        {   println!("{}\t{}", model.id, model.display_name);
        }
        return backend.shutdown().await;
    }

    if !args.models.is_empty()
    {   await_reply(backend.reselect(args.models).await?).await?;
    }

    let prompt = args.prompt.unwrap_or_default();
    let records = await_reply(backend.submit(prompt).await?).await?;
    let snapshot = await_reply(backend.snapshot().await?).await?;

    if args.json
    {   let out = serde_json::to_string_pretty(&records)
          .map_err(|e| llm_compare::Error::ParseError(e.to_string()))?;
        println!("{}", out);
    } else
    {   println!("{}", render::render_records(&records, args.metadata));
        println!("{}", render::health_label(snapshot.healthy));
    }

    backend.shutdown().await
}
