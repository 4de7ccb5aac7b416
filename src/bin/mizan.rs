//! mizan: cost estimation CLI
//!
//! Searches and prices a JSON catalog, and sends estimation prompts to the
//! configured service.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use mizan::{
    Config, FileBlobStore, MizanBuilder, PricedItem, PricingContext, ProjectSize, Quality, Region,
    ScheduleOptions, Season, Secrets, StaticCatalog, Urgency,
};

/// Mizan cost estimation CLI
#[derive(Parser)]
#[command(name = "mizan")]
#[command(version)]
#[command(about = "Contextual construction pricing and estimation")]
struct Args {
    /// Config file (default: ~/.mizan/config.toml, then /etc/mizan/config.toml)
    #[arg(short, long, env = "MIZAN_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog file: a JSON array of items
    #[arg(long, env = "MIZAN_CATALOG")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Clone)]
struct ContextArgs {
    #[arg(long, default_value = "riyadh")]
    region: String,
    #[arg(long, default_value = "standard")]
    quality: Quality,
    #[arg(long, default_value = "spring")]
    season: Season,
    #[arg(long, default_value = "medium")]
    size: ProjectSize,
    #[arg(long, default_value = "normal")]
    urgency: Urgency,
}

impl ContextArgs {
    fn context(&self) -> PricingContext {
        PricingContext::new()
            .region(Region::from(self.region.as_str()))
            .quality(self.quality)
            .season(self.season)
            .project_size(self.size)
            .urgency(self.urgency)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Search the catalog and print context-adjusted prices
    Search {
        query: String,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Price a single catalog item
    Price {
        /// Item id
        id: String,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Send an estimation prompt to the configured service
    Estimate {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Include the pricing context in the prompt
        #[arg(long)]
        with_context: bool,
        #[command(flatten)]
        context: ContextArgs,
    },

    /// Run a batch of searches and print usage statistics
    Stats {
        queries: Vec<String>,
        #[command(flatten)]
        context: ContextArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let catalog = StaticCatalog::from_json_file(&args.catalog).await?;
    let items = catalog.items().to_vec();

    let mut builder = MizanBuilder::from_config(&config, &secrets)?.catalog(catalog);
    if let Some(dir) = &config.storage.data_dir {
        builder = builder.store(Arc::new(FileBlobStore::open(dir).await?));
    }
    let estimator = builder.build()?;

    match args.command {
        Command::Search { query, context } => {
            let results = estimator
                .smart_search(&query, &context.context(), None)
                .await;
            if results.is_empty() {
                println!("no matches for {query:?}");
            }
            for hit in &results {
                print_priced(hit);
            }
        }

        Command::Price { id, context } => {
            let item = items
                .iter()
                .find(|item| item.id == id)
                .ok_or_else(|| format!("no catalog item with id {id:?}"))?;
            let record = estimator.adjusted_price(item, &context.context());
            println!("item:       {} ({})", item.name, item.id);
            println!("base:       {:.2} SAR", record.base_price);
            println!("adjusted:   {} SAR", record.adjusted_price);
            println!(
                "range:      {:.0} - {:.0} SAR",
                record.price_range.min, record.price_range.max
            );
            println!("confidence: {:.2}", record.confidence);
        }

        Command::Estimate {
            prompt,
            with_context,
            context,
        } => {
            let prompt = resolve_text(prompt, "estimate")?;
            let context = context.context();
            let estimate = estimator
                .estimate(
                    "cli",
                    &prompt,
                    with_context.then_some(&context),
                    ScheduleOptions::new().use_cache(false),
                )
                .await?;
            println!("{}", estimate.text);
            eprintln!(
                "score: quality={:.1} completeness={:.1} relevance={:.0}",
                estimate.score.quality, estimate.score.completeness, estimate.score.relevance
            );
        }

        Command::Stats { queries, context } => {
            let context = context.context();
            for query in &queries {
                estimator.smart_search(query, &context, None).await;
            }
            let stats = estimator.usage_statistics();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn print_priced(hit: &PricedItem) {
    let unit = hit
        .item
        .unit
        .as_deref()
        .map(|u| format!("/{u}"))
        .unwrap_or_default();
    println!(
        "{:<12} {:<40} {:>10} SAR{unit}",
        hit.item.id,
        hit.item.name,
        hit.adjusted_price()
    );
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
