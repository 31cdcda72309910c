//! warpscale — predictive autoscaling from the command line.
//!
//! Keeps resources, telemetry, scaling events, and configurations in a
//! redb file under `--data-dir`, and drives the forecasting, decision,
//! execution, and tuning pipeline against it.
//!
//! # Usage
//!
//! ```text
//! warpscale resource add --id vmss-1 --kind virtual-machine-scale-set --name web --instances 2
//! warpscale ingest --resource vmss-1 --metric cpu_percent --file cpu.json
//! warpscale predict --resource vmss-1 --hours 1
//! warpscale apply --resource vmss-1
//! warpscale analyze --resource vmss-1 --days 7
//! warpscale optimize --resource vmss-1 --save
//! warpscale run --interval 5m
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod engine;

#[derive(Parser)]
#[command(
    name = "warpscale",
    about = "WarpGrid predictive autoscaler",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data directory for persistent state.
    #[arg(long, global = true, default_value = "./warpscale-data")]
    data_dir: PathBuf,

    /// Engine configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage scalable resources.
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Import telemetry points from a JSON file.
    ///
    /// With --metric the file is an array of {"timestamp", "value"} objects;
    /// without it, each object also carries a "metric" name.
    Ingest {
        #[arg(long)]
        resource: String,
        #[arg(long)]
        metric: Option<String>,
        #[arg(long)]
        file: PathBuf,
    },
    /// Print a scaling recommendation as JSON without applying it.
    Predict {
        #[arg(long)]
        resource: String,
        /// Hours ahead the recommendation targets.
        #[arg(long, default_value = "1")]
        hours: u32,
    },
    /// Generate a recommendation and apply it.
    Apply {
        #[arg(long)]
        resource: String,
        #[arg(long, default_value = "1")]
        hours: u32,
    },
    /// Print the scaling performance scorecard for the last N days.
    Analyze {
        #[arg(long)]
        resource: String,
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Derive an optimized scaling configuration from usage patterns.
    Optimize {
        #[arg(long)]
        resource: String,
        /// Store the configuration so it takes effect.
        #[arg(long)]
        save: bool,
    },
    /// Evaluate every resource on an interval until Ctrl-C.
    Run {
        /// Evaluation interval, e.g. "30s" or "5m".
        #[arg(long, default_value = "5m")]
        interval: String,
    },
}

#[derive(Subcommand)]
enum ResourceAction {
    /// Register or update a resource.
    Add {
        #[arg(long)]
        id: String,
        /// e.g. virtual-machine-scale-set, platform-hosting-plan, managed-container-cluster
        #[arg(long)]
        kind: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "1")]
        instances: u32,
    },
    /// List registered resources as JSON.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let ctx = engine::Context::open(&cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Resource { action } => match action {
            ResourceAction::Add {
                id,
                kind,
                name,
                instances,
            } => commands::resource::add(&ctx, &id, &kind, name.as_deref(), instances),
            ResourceAction::List => commands::resource::list(&ctx),
        },
        Commands::Ingest {
            resource,
            metric,
            file,
        } => commands::ingest::ingest(&ctx, &resource, metric.as_deref(), &file),
        Commands::Predict { resource, hours } => commands::predict::predict(&ctx, &resource, hours).await,
        Commands::Apply { resource, hours } => commands::predict::apply(&ctx, &resource, hours).await,
        Commands::Analyze { resource, days } => commands::analyze::analyze(&ctx, &resource, days).await,
        Commands::Optimize { resource, save } => commands::optimize::optimize(&ctx, &resource, save).await,
        Commands::Run { interval } => commands::run::run(&ctx, &interval).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,warpscale=debug,warpgrid=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
